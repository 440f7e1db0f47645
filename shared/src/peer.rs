//! Uniform handle over a remote endpoint.
//!
//! Game logic only ever holds an `Arc<dyn Peer>`. Whether the bytes go straight out of
//! a UDP socket ([`crate::transport::DirectPeer`]), through an intermediary
//! ([`crate::relay::RelayPeer`]) or into an in-process channel ([`LocalPeer`]) is
//! invisible to the caller.

use crate::codec::NetWriter;
use crate::error::{NetError, Result};
use crate::packets::Packet;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type PeerId = u64;

/// Placeholder returned when an endpoint has no printable address.
pub const UNKNOWN_ADDRESS: &str = "<unknown>";

/// Transport-level guarantee attached to a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeliveryMethod {
    /// Sent once; may be lost or arrive out of order.
    Unreliable = 0,
    /// Retransmitted until acknowledged and delivered in send order.
    ReliableOrdered = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    ShutdownRequested,
    Disconnected,
}

pub trait Peer: Send + Sync + fmt::Debug {
    fn id(&self) -> PeerId;

    fn connection_state(&self) -> ConnectionState;

    /// Last measured round-trip time in milliseconds.
    fn ping(&self) -> u32;

    /// Queues `data` for delivery. Never blocks; fails with
    /// [`NetError::PeerUnreachable`] once the connection is gone.
    fn send(&self, data: &[u8], method: DeliveryMethod) -> Result<()>;

    fn send_writer(&self, writer: &NetWriter, method: DeliveryMethod) -> Result<()> {
        self.send(writer.data(), method)
    }

    fn send_range(
        &self,
        data: &[u8],
        start: usize,
        len: usize,
        method: DeliveryMethod,
    ) -> Result<()> {
        let end = start
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or(NetError::InvalidRange {
                start,
                len,
                available: data.len(),
            })?;
        self.send(&data[start..end], method)
    }

    /// Terminates the connection, notifying the far end if possible.
    fn disconnect(&self, reason: Option<&[u8]>);

    fn address_string(&self) -> String {
        UNKNOWN_ADDRESS.to_string()
    }

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }
}

/// Encodes `packet` and sends it with the delivery method fixed for its kind.
pub fn send_packet(peer: &dyn Peer, packet: &Packet) -> Result<()> {
    let writer = packet.to_writer()?;
    peer.send_writer(&writer, packet.delivery_method())
}

/// What a [`LocalPeer`] hands to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalDelivery {
    Data {
        payload: Vec<u8>,
        method: DeliveryMethod,
    },
    Disconnected {
        reason: Option<Vec<u8>>,
    },
}

/// In-process peer: every send lands in an unbounded channel.
///
/// Used for a listen-server's own player and by test harnesses that need to observe
/// exactly what was sent.
#[derive(Debug)]
pub struct LocalPeer {
    id: PeerId,
    state: Mutex<ConnectionState>,
    ping: AtomicU32,
    sends: AtomicUsize,
    tx: mpsc::UnboundedSender<LocalDelivery>,
}

impl LocalPeer {
    pub fn new(id: PeerId) -> (Arc<LocalPeer>, mpsc::UnboundedReceiver<LocalDelivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Arc::new(LocalPeer {
            id,
            state: Mutex::new(ConnectionState::Connected),
            ping: AtomicU32::new(0),
            sends: AtomicUsize::new(0),
            tx,
        });
        (peer, rx)
    }

    pub fn set_ping(&self, ping_ms: u32) {
        self.ping.store(ping_ms, Ordering::Relaxed);
    }

    /// Number of successful sends so far.
    pub fn sent_count(&self) -> usize {
        self.sends.load(Ordering::Relaxed)
    }
}

impl Peer for LocalPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn ping(&self) -> u32 {
        self.ping.load(Ordering::Relaxed)
    }

    fn send(&self, data: &[u8], method: DeliveryMethod) -> Result<()> {
        let mut state = self.state.lock();
        if *state != ConnectionState::Connected {
            return Err(NetError::PeerUnreachable { peer: self.id });
        }
        let delivery = LocalDelivery::Data {
            payload: data.to_vec(),
            method,
        };
        if self.tx.send(delivery).is_err() {
            *state = ConnectionState::Disconnected;
            return Err(NetError::PeerUnreachable { peer: self.id });
        }
        self.sends.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn disconnect(&self, reason: Option<&[u8]>) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Disconnected {
            return;
        }
        *state = ConnectionState::Disconnected;
        let _ = self.tx.send(LocalDelivery::Disconnected {
            reason: reason.map(<[u8]>::to_vec),
        });
    }

    fn address_string(&self) -> String {
        format!("local#{}", self.id)
    }
}
