//! Sessions forwarded through an intermediary peer.
//!
//! A relay node holds one upstream connection to the game server and any number of
//! downstream client connections. Traffic between them is wrapped in an envelope:
//!
//! ```text
//! [0xFF marker][op: u8][origin: u32 LE][body...]
//! ```
//!
//! `op` is `0` for data (body is an application packet), `1` for disconnect (body is
//! the reason) or `2` for the relay node announcing itself (origin `0`, empty body).
//! `origin` names the downstream client on the relay node. The marker can
//! never start an application packet, so relayed and direct traffic share one stream.

use crate::codec::{NetReader, NetWriter};
use crate::error::{CodecError, NetError, Result};
use crate::peer::{ConnectionState, DeliveryMethod, Peer, PeerId};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const RELAY_MARKER: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelayOp {
    Data = 0,
    Disconnect = 1,
    Announce = 2,
}

impl TryFrom<u8> for RelayOp {
    type Error = CodecError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(RelayOp::Data),
            1 => Ok(RelayOp::Disconnect),
            2 => Ok(RelayOp::Announce),
            _ => Err(CodecError::InvalidEnumValue {
                type_name: "RelayOp",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayEnvelope<'a> {
    pub op: RelayOp,
    pub origin: u32,
    pub body: &'a [u8],
}

impl<'a> RelayEnvelope<'a> {
    pub fn is_envelope(bytes: &[u8]) -> bool {
        bytes.first() == Some(&RELAY_MARKER)
    }

    pub fn encode(&self) -> NetWriter {
        let mut writer = NetWriter::with_capacity(6 + self.body.len());
        writer.put_u8(RELAY_MARKER);
        writer.put_u8(self.op as u8);
        writer.put_u32(self.origin);
        writer.put_bytes(self.body);
        writer
    }

    pub fn decode(bytes: &'a [u8]) -> std::result::Result<Self, CodecError> {
        let mut reader = NetReader::new(bytes);
        if reader.get_u8()? != RELAY_MARKER {
            return Err(CodecError::MalformedPacket("missing relay marker"));
        }
        Ok(RelayEnvelope {
            op: reader.get_enum()?,
            origin: reader.get_u32()?,
            body: reader.rest(),
        })
    }
}

/// A remote endpoint reached through `upstream`.
#[derive(Debug)]
pub struct RelayPeer {
    id: PeerId,
    origin: u32,
    upstream: Arc<dyn Peer>,
    closed: AtomicBool,
}

impl RelayPeer {
    pub fn new(upstream: Arc<dyn Peer>, origin: u32) -> Arc<RelayPeer> {
        Arc::new(RelayPeer {
            id: Self::peer_id(upstream.id(), origin),
            origin,
            upstream,
            closed: AtomicBool::new(false),
        })
    }

    /// Relayed ids live above `u32::MAX` so they never collide with direct
    /// connection ids, which start at 1.
    pub fn peer_id(upstream: PeerId, origin: u32) -> PeerId {
        (upstream.max(1) << 32) | origin as PeerId
    }

    pub fn origin(&self) -> u32 {
        self.origin
    }

    pub fn upstream_id(&self) -> PeerId {
        self.upstream.id()
    }

    /// Marks the session closed without telling the intermediary.
    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

impl Peer for RelayPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn connection_state(&self) -> ConnectionState {
        if self.closed.load(Ordering::Acquire) {
            ConnectionState::Disconnected
        } else {
            self.upstream.connection_state()
        }
    }

    fn ping(&self) -> u32 {
        self.upstream.ping()
    }

    fn send(&self, data: &[u8], method: DeliveryMethod) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NetError::PeerUnreachable { peer: self.id });
        }
        let envelope = RelayEnvelope {
            op: RelayOp::Data,
            origin: self.origin,
            body: data,
        };
        match self.upstream.send_writer(&envelope.encode(), method) {
            Err(NetError::PeerUnreachable { .. }) => {
                Err(NetError::PeerUnreachable { peer: self.id })
            }
            other => other,
        }
    }

    fn disconnect(&self, reason: Option<&[u8]>) {
        if !self.mark_closed() {
            return;
        }
        let envelope = RelayEnvelope {
            op: RelayOp::Disconnect,
            origin: self.origin,
            body: reason.unwrap_or_default(),
        };
        if let Err(e) = self
            .upstream
            .send_writer(&envelope.encode(), DeliveryMethod::ReliableOrdered)
        {
            debug!("Relay disconnect for {} not delivered: {}", self.id, e);
        }
    }

    fn address_string(&self) -> String {
        format!("relay:{}/{}", self.upstream.address_string(), self.origin)
    }
}

/// Outcome of routing one inbound payload.
#[derive(Debug)]
pub enum Routed<'a> {
    /// Not an envelope; the payload belongs to the sending peer itself.
    Direct(&'a [u8]),
    Relayed {
        peer: Arc<RelayPeer>,
        payload: &'a [u8],
        /// First traffic seen from this relayed session.
        opened: bool,
    },
    /// The intermediary reported that a relayed session ended.
    Closed(PeerId),
    /// The sending peer is a relay node rather than a player.
    Announced,
    /// Disconnect for a session that was never opened.
    Ignored,
}

/// Receiving side: turns envelopes arriving from intermediaries into relayed peers.
///
/// Only peers that announced themselves may open or close relayed sessions.
#[derive(Debug, Default)]
pub struct RelayRouter {
    peers: HashMap<PeerId, Arc<RelayPeer>>,
    relays: HashSet<PeerId>,
}

impl RelayRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<'a>(
        &mut self,
        from: &Arc<dyn Peer>,
        payload: &'a [u8],
    ) -> std::result::Result<Routed<'a>, CodecError> {
        if !RelayEnvelope::is_envelope(payload) {
            return Ok(Routed::Direct(payload));
        }
        let envelope = RelayEnvelope::decode(payload)?;
        if envelope.op != RelayOp::Announce && !self.relays.contains(&from.id()) {
            return Err(CodecError::MalformedPacket(
                "relay envelope from a peer that never announced",
            ));
        }
        let id = RelayPeer::peer_id(from.id(), envelope.origin);

        match envelope.op {
            RelayOp::Data => {
                let mut opened = false;
                let peer = self
                    .peers
                    .entry(id)
                    .or_insert_with(|| {
                        opened = true;
                        RelayPeer::new(Arc::clone(from), envelope.origin)
                    })
                    .clone();
                if opened {
                    debug!("Opened relayed session {}", peer.address_string());
                }
                Ok(Routed::Relayed {
                    peer,
                    payload: envelope.body,
                    opened,
                })
            }
            RelayOp::Disconnect => match self.peers.remove(&id) {
                Some(peer) => {
                    peer.mark_closed();
                    Ok(Routed::Closed(id))
                }
                None => Ok(Routed::Ignored),
            },
            RelayOp::Announce => {
                if self.relays.insert(from.id()) {
                    info!("Peer {} is a relay node", from.address_string());
                }
                Ok(Routed::Announced)
            }
        }
    }

    /// Drops the entry for a relayed session closed locally, or a relay node's right
    /// to carry sessions.
    pub fn forget(&mut self, id: PeerId) -> bool {
        let relay = self.relays.remove(&id);
        self.peers.remove(&id).is_some() || relay
    }

    pub fn is_relay(&self, id: PeerId) -> bool {
        self.relays.contains(&id)
    }

    /// Closes every session relayed through `upstream` and returns their ids.
    pub fn close_upstream(&mut self, upstream: PeerId) -> Vec<PeerId> {
        self.relays.remove(&upstream);
        let ids: Vec<PeerId> = self
            .peers
            .values()
            .filter(|peer| peer.upstream_id() == upstream)
            .map(|peer| peer.id())
            .collect();
        for id in &ids {
            if let Some(peer) = self.peers.remove(id) {
                peer.mark_closed();
            }
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Intermediary side: multiplexes downstream clients over one upstream peer.
#[derive(Debug)]
pub struct RelayHub {
    upstream: Arc<dyn Peer>,
    downstream: HashMap<u32, Arc<dyn Peer>>,
    origins: HashMap<PeerId, u32>,
    next_origin: u32,
}

impl RelayHub {
    pub fn new(upstream: Arc<dyn Peer>) -> Self {
        Self {
            upstream,
            downstream: HashMap::new(),
            origins: HashMap::new(),
            next_origin: 1,
        }
    }

    pub fn upstream(&self) -> &Arc<dyn Peer> {
        &self.upstream
    }

    /// Tells the server this connection carries relayed sessions.
    pub fn announce(&self) -> Result<()> {
        let envelope = RelayEnvelope {
            op: RelayOp::Announce,
            origin: 0,
            body: &[],
        };
        self.upstream
            .send_writer(&envelope.encode(), DeliveryMethod::ReliableOrdered)
    }

    /// Registers a downstream client and returns its origin id.
    pub fn attach(&mut self, client: Arc<dyn Peer>) -> u32 {
        let origin = self.next_origin;
        self.next_origin = self.next_origin.wrapping_add(1).max(1);
        info!(
            "Relaying client {} as origin {}",
            client.address_string(),
            origin
        );
        self.origins.insert(client.id(), origin);
        self.downstream.insert(origin, client);
        origin
    }

    /// Wraps a client payload and forwards it upstream with the same delivery method.
    pub fn forward_up(&self, client: PeerId, payload: &[u8], method: DeliveryMethod) -> Result<()> {
        let Some(&origin) = self.origins.get(&client) else {
            warn!("Dropping payload from unattached client {}", client);
            return Ok(());
        };
        let envelope = RelayEnvelope {
            op: RelayOp::Data,
            origin,
            body: payload,
        };
        self.upstream.send_writer(&envelope.encode(), method)
    }

    /// Unwraps an upstream envelope and delivers it to the addressed client.
    pub fn forward_down(&mut self, payload: &[u8], method: DeliveryMethod) -> Result<()> {
        let envelope = RelayEnvelope::decode(payload)?;
        match envelope.op {
            RelayOp::Data => match self.downstream.get(&envelope.origin) {
                Some(client) => client.send(envelope.body, method),
                None => {
                    debug!("No downstream client for origin {}", envelope.origin);
                    Ok(())
                }
            },
            RelayOp::Disconnect => {
                if let Some(client) = self.downstream.remove(&envelope.origin) {
                    self.origins.remove(&client.id());
                    client.disconnect(Some(envelope.body));
                }
                Ok(())
            }
            RelayOp::Announce => Ok(()),
        }
    }

    /// Forgets a downstream client and tells the server its session ended.
    pub fn detach(&mut self, client: PeerId, reason: Option<&[u8]>) {
        let Some(origin) = self.origins.remove(&client) else {
            return;
        };
        self.downstream.remove(&origin);
        let envelope = RelayEnvelope {
            op: RelayOp::Disconnect,
            origin,
            body: reason.unwrap_or_default(),
        };
        if let Err(e) = self
            .upstream
            .send_writer(&envelope.encode(), DeliveryMethod::ReliableOrdered)
        {
            warn!("Failed to report relay disconnect upstream: {}", e);
        }
    }

    /// Disconnects every downstream client after the upstream link died.
    pub fn upstream_lost(&mut self) {
        for (_, client) in self.downstream.drain() {
            client.disconnect(Some(b"relay lost its upstream"));
        }
        self.origins.clear();
    }

    pub fn len(&self) -> usize {
        self.downstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downstream.is_empty()
    }
}
