//! Error types shared by the codec, transport and session layers.

use std::io;
use thiserror::Error;

/// Failures produced while encoding or decoding wire data.
///
/// Decode errors never leave a partially-populated value behind: the caller gets
/// either a complete structure or one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    #[error("invalid {type_name} value {value}")]
    InvalidEnumValue { type_name: &'static str, value: u8 },

    #[error("length {len} exceeds the u16 length prefix")]
    LengthOverflow { len: usize },
}

impl CodecError {
    pub(crate) fn truncated() -> Self {
        CodecError::MalformedPacket("unexpected end of data")
    }
}

/// Errors surfaced by the networking layers above the codec.
#[derive(Debug, Error)]
pub enum NetError {
    /// A join was attempted while every session identifier is taken.
    #[error("session pool exhausted ({capacity} slots in use)")]
    PoolExhausted { capacity: u32 },

    /// An identifier outside `[0, capacity)` was released. This is a defect in the caller.
    #[error("session id {id} is outside the pool range 0..{capacity}")]
    InvalidId { id: u32, capacity: u32 },

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The connection behind a peer is gone; treated as an implicit disconnect.
    #[error("peer {peer} is unreachable")]
    PeerUnreachable { peer: u64 },

    #[error("byte range {start}+{len} is outside a buffer of {available} bytes")]
    InvalidRange {
        start: usize,
        len: usize,
        available: usize,
    },

    #[error("protocol version mismatch (local {local}, remote {remote})")]
    ProtocolMismatch { local: u32, remote: u32 },

    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("connection refused: {0}")]
    ConnectRefused(String),

    #[error("timed out waiting for the join response")]
    JoinTimeout,

    #[error("join rejected: {0}")]
    JoinRejected(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = NetError> = std::result::Result<T, E>;
