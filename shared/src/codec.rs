//! Manual binary codec for wire data.
//!
//! All multi-byte values are little-endian. Strings and arrays carry a `u16` length
//! prefix, booleans are a single `0`/`1` byte and enums are a single byte checked
//! against their known range. There is no padding or alignment: a decoder consumes
//! exactly the bytes its matching encoder wrote.
//!
//! The codec holds no shared state, so any number of threads may encode and decode
//! concurrently.

use crate::error::CodecError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A value with a fixed wire layout.
pub trait NetSerialize: Sized {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError>;
    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError>;
}

/// Growable output buffer for encoding.
#[derive(Debug, Default, Clone)]
pub struct NetWriter {
    buf: BytesMut,
}

impl NetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn put_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    /// Appends raw bytes with no length prefix.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn put_string(&mut self, value: &str) -> Result<(), CodecError> {
        let len = length_prefix(value.len())?;
        self.buf.put_u16_le(len);
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    pub fn put_option_u32(&mut self, value: Option<u32>) {
        self.put_bool(value.is_some());
        if let Some(value) = value {
            self.put_u32(value);
        }
    }

    pub fn put<T: NetSerialize>(&mut self, value: &T) -> Result<(), CodecError> {
        value.encode(self)
    }

    pub fn put_list<T: NetSerialize>(&mut self, items: &[T]) -> Result<(), CodecError> {
        let count = length_prefix(items.len())?;
        self.buf.put_u16_le(count);
        for item in items {
            item.encode(self)?;
        }
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

fn length_prefix(len: usize) -> Result<u16, CodecError> {
    u16::try_from(len).map_err(|_| CodecError::LengthOverflow { len })
}

/// Cursor over received bytes. Every read is bounds-checked and fails with
/// [`CodecError::MalformedPacket`] instead of reading past the end.
#[derive(Debug, Clone)]
pub struct NetReader<'a> {
    buf: &'a [u8],
}

impl<'a> NetReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < needed {
            return Err(CodecError::truncated());
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_bool(&mut self) -> Result<bool, CodecError> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(CodecError::MalformedPacket("boolean byte out of range")),
        }
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn get_f32(&mut self) -> Result<f32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32_le())
    }

    /// Reads a single byte and maps it onto an enum, rejecting unknown values.
    pub fn get_enum<E>(&mut self) -> Result<E, CodecError>
    where
        E: TryFrom<u8, Error = CodecError>,
    {
        E::try_from(self.get_u8()?)
    }

    pub fn get_string(&mut self) -> Result<String, CodecError> {
        let len = self.get_u16()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::MalformedPacket("string is not valid UTF-8"))
    }

    pub fn get_option_u32(&mut self) -> Result<Option<u32>, CodecError> {
        if self.get_bool()? {
            Ok(Some(self.get_u32()?))
        } else {
            Ok(None)
        }
    }

    pub fn get<T: NetSerialize>(&mut self) -> Result<T, CodecError> {
        T::decode(self)
    }

    pub fn get_list<T: NetSerialize>(&mut self) -> Result<Vec<T>, CodecError> {
        let count = self.get_u16()? as usize;
        // Every element is at least one byte, so a count larger than the remaining
        // input is already known to be truncated.
        if count > self.remaining() {
            return Err(CodecError::truncated());
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }

    /// Borrows the next `len` bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Borrows everything that has not been read yet.
    pub fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }

    /// Fails if any input is left over.
    pub fn finish(&self) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::MalformedPacket("trailing bytes after value"))
        }
    }
}

/// Encodes a single value into a fresh buffer.
pub fn encode_to_vec<T: NetSerialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut writer = NetWriter::new();
    value.encode(&mut writer)?;
    Ok(writer.data().to_vec())
}

/// Decodes a value that must occupy the whole input.
pub fn decode_exact<T: NetSerialize>(bytes: &[u8]) -> Result<T, CodecError> {
    let mut reader = NetReader::new(bytes);
    let value = T::decode(&mut reader)?;
    reader.finish()?;
    Ok(value)
}
