//! UDP transport with an unreliable and a reliable-ordered channel.
//!
//! Each datagram is a one-byte frame kind followed by its fields:
//!
//! | kind | frame            | body                           |
//! |------|------------------|--------------------------------|
//! | 0    | `ConnectRequest` | `protocol_version: u32`        |
//! | 1    | `ConnectAccept`  | `connection_id: u32`           |
//! | 2    | `Unreliable`     | payload                        |
//! | 3    | `Reliable`       | `seq: u32`, payload            |
//! | 4    | `Ack`            | `seq: u32`                     |
//! | 5    | `Ping`           | `timestamp_ms: u64`            |
//! | 6    | `Pong`           | `timestamp_ms: u64` (echoed)   |
//! | 7    | `Disconnect`     | reason bytes                   |
//!
//! Reliable frames are retransmitted until acknowledged and handed to the owner in
//! sequence order. Unreliable frames are sent once. The endpoint reports connection
//! lifecycle and payloads as [`TransportEvent`]s over an unbounded channel; dropping
//! the receiver stops the endpoint's background tasks.

use crate::codec::{NetReader, NetWriter};
use crate::error::{CodecError, NetError, Result};
use crate::peer::{ConnectionState, DeliveryMethod, Peer, PeerId};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Bumped whenever the frame layout changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload accepted by [`Peer::send`].
pub const MAX_PAYLOAD: usize = 60_000;

const RECV_BUFFER: usize = 65_536;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a client keeps retrying the handshake.
    pub connect_timeout: Duration,
    pub connect_retry_interval: Duration,
    /// Silence after which a connection is dropped.
    pub connection_timeout: Duration,
    pub ping_interval: Duration,
    /// Floor for the retransmission delay; the effective delay is `max(2 * rtt, floor)`.
    pub min_resend_delay: Duration,
    pub max_resend_attempts: u32,
    /// Out-of-order reliable frames buffered beyond the next expected sequence.
    pub reorder_window: u32,
    /// Probability in `[0, 1)` of dropping an outgoing data frame, for testing.
    pub simulated_loss: f32,
    pub maintenance_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            connect_retry_interval: Duration::from_millis(250),
            connection_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(1),
            min_resend_delay: Duration::from_millis(100),
            max_resend_attempts: 30,
            reorder_window: 512,
            simulated_loss: 0.0,
            maintenance_interval: Duration::from_millis(20),
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.simulated_loss) {
            return Err(NetError::Config(format!(
                "simulated_loss must be in [0, 1), got {}",
                self.simulated_loss
            )));
        }
        if self.max_resend_attempts == 0 {
            return Err(NetError::Config(
                "max_resend_attempts must be at least 1".to_string(),
            ));
        }
        if self.maintenance_interval.is_zero() {
            return Err(NetError::Config(
                "maintenance_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called on this side.
    Local,
    /// The far end sent a disconnect frame.
    Remote(Vec<u8>),
    TimedOut,
    /// A reliable frame exhausted its retransmissions.
    Unreachable,
}

#[derive(Debug)]
pub enum TransportEvent {
    Connected(Arc<dyn Peer>),
    Received {
        peer: Arc<dyn Peer>,
        payload: Vec<u8>,
        method: DeliveryMethod,
    },
    /// Emitted exactly once per connection.
    Disconnected {
        peer_id: PeerId,
        reason: DisconnectReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame<'a> {
    ConnectRequest { protocol_version: u32 },
    ConnectAccept { connection_id: u32 },
    Unreliable(&'a [u8]),
    Reliable { seq: u32, payload: &'a [u8] },
    Ack { seq: u32 },
    Ping { timestamp_ms: u64 },
    Pong { timestamp_ms: u64 },
    Disconnect(&'a [u8]),
}

impl<'a> Frame<'a> {
    fn encode(&self) -> NetWriter {
        let mut writer = NetWriter::with_capacity(16);
        match *self {
            Frame::ConnectRequest { protocol_version } => {
                writer.put_u8(0);
                writer.put_u32(protocol_version);
            }
            Frame::ConnectAccept { connection_id } => {
                writer.put_u8(1);
                writer.put_u32(connection_id);
            }
            Frame::Unreliable(payload) => {
                writer.put_u8(2);
                writer.put_bytes(payload);
            }
            Frame::Reliable { seq, payload } => {
                writer.put_u8(3);
                writer.put_u32(seq);
                writer.put_bytes(payload);
            }
            Frame::Ack { seq } => {
                writer.put_u8(4);
                writer.put_u32(seq);
            }
            Frame::Ping { timestamp_ms } => {
                writer.put_u8(5);
                writer.put_u64(timestamp_ms);
            }
            Frame::Pong { timestamp_ms } => {
                writer.put_u8(6);
                writer.put_u64(timestamp_ms);
            }
            Frame::Disconnect(reason) => {
                writer.put_u8(7);
                writer.put_bytes(reason);
            }
        }
        writer
    }

    fn decode(bytes: &'a [u8]) -> std::result::Result<Frame<'a>, CodecError> {
        let mut reader = NetReader::new(bytes);
        let frame = match reader.get_u8()? {
            0 => Frame::ConnectRequest {
                protocol_version: reader.get_u32()?,
            },
            1 => Frame::ConnectAccept {
                connection_id: reader.get_u32()?,
            },
            2 => Frame::Unreliable(reader.rest()),
            3 => Frame::Reliable {
                seq: reader.get_u32()?,
                payload: reader.rest(),
            },
            4 => Frame::Ack {
                seq: reader.get_u32()?,
            },
            5 => Frame::Ping {
                timestamp_ms: reader.get_u64()?,
            },
            6 => Frame::Pong {
                timestamp_ms: reader.get_u64()?,
            },
            7 => Frame::Disconnect(reader.rest()),
            value => {
                return Err(CodecError::InvalidEnumValue {
                    type_name: "Frame",
                    value,
                })
            }
        };
        reader.finish()?;
        Ok(frame)
    }
}

/// State shared by an endpoint's tasks and all of its connections.
#[derive(Debug)]
struct EndpointShared {
    socket: UdpSocket,
    config: TransportConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
    epoch: Instant,
    next_connection_id: AtomicU32,
}

impl EndpointShared {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn send_raw(&self, bytes: &[u8], addr: SocketAddr) {
        if let Err(e) = self.socket.try_send_to(bytes, addr) {
            if e.kind() != io::ErrorKind::WouldBlock {
                debug!("Failed to send {} bytes to {}: {}", bytes.len(), addr, e);
            }
        }
    }

    fn emit(&self, event: TransportEvent) {
        // A closed channel means the owner is gone and the tasks are winding down.
        let _ = self.events.send(event);
    }
}

#[derive(Debug)]
struct Unacked {
    frame: Vec<u8>,
    last_sent: Instant,
    attempts: u32,
}

#[derive(Debug)]
struct ConnectionInner {
    state: ConnectionState,
    rtt_ms: u32,
    last_received: Instant,
    last_ping_sent: Instant,
    next_send_seq: u32,
    unacked: BTreeMap<u32, Unacked>,
    next_recv_seq: u32,
    reorder: BTreeMap<u32, Vec<u8>>,
}

/// A UDP connection to one remote address.
#[derive(Debug)]
pub struct DirectPeer {
    id: u32,
    addr: SocketAddr,
    shared: Arc<EndpointShared>,
    inner: Mutex<ConnectionInner>,
}

enum Maintenance {
    Alive,
    Close(DisconnectReason),
}

impl DirectPeer {
    fn new(id: u32, addr: SocketAddr, shared: Arc<EndpointShared>) -> Arc<DirectPeer> {
        let now = Instant::now();
        Arc::new(DirectPeer {
            id,
            addr,
            shared,
            inner: Mutex::new(ConnectionInner {
                state: ConnectionState::Connected,
                rtt_ms: 0,
                last_received: now,
                last_ping_sent: now,
                next_send_seq: 0,
                unacked: BTreeMap::new(),
                next_recv_seq: 0,
                reorder: BTreeMap::new(),
            }),
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.addr
    }

    fn send_frame(&self, frame: Frame<'_>) {
        self.shared.send_raw(frame.encode().data(), self.addr);
    }

    /// Sends a data frame, subject to simulated loss.
    fn transmit(&self, bytes: &[u8]) {
        let loss = self.shared.config.simulated_loss;
        if loss > 0.0 && rand::thread_rng().gen::<f32>() < loss {
            return;
        }
        self.shared.send_raw(bytes, self.addr);
    }

    fn handle_frame(self: &Arc<Self>, frame: Frame<'_>) {
        let mut delivered: Vec<(Vec<u8>, DeliveryMethod)> = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Connected {
                return;
            }
            inner.last_received = Instant::now();

            match frame {
                Frame::Unreliable(payload) => {
                    delivered.push((payload.to_vec(), DeliveryMethod::Unreliable));
                }
                Frame::Reliable { seq, payload } => {
                    self.send_frame(Frame::Ack { seq });
                    if seq == inner.next_recv_seq {
                        delivered.push((payload.to_vec(), DeliveryMethod::ReliableOrdered));
                        inner.next_recv_seq = inner.next_recv_seq.wrapping_add(1);
                        loop {
                            let next = inner.next_recv_seq;
                            let Some(buffered) = inner.reorder.remove(&next) else {
                                break;
                            };
                            delivered.push((buffered, DeliveryMethod::ReliableOrdered));
                            inner.next_recv_seq = next.wrapping_add(1);
                        }
                    } else if ahead_within(
                        seq,
                        inner.next_recv_seq,
                        self.shared.config.reorder_window,
                    ) {
                        inner.reorder.entry(seq).or_insert_with(|| payload.to_vec());
                    }
                }
                Frame::Ack { seq } => {
                    if let Some(acked) = inner.unacked.remove(&seq) {
                        // Only first transmissions give an unambiguous sample.
                        if acked.attempts == 1 {
                            inner.rtt_ms = acked.last_sent.elapsed().as_millis() as u32;
                        }
                    }
                }
                Frame::Ping { timestamp_ms } => {
                    self.send_frame(Frame::Pong { timestamp_ms });
                }
                Frame::Pong { timestamp_ms } => {
                    inner.rtt_ms = self.shared.now_ms().saturating_sub(timestamp_ms) as u32;
                }
                Frame::Disconnect(reason) => {
                    drop(inner);
                    self.close(DisconnectReason::Remote(reason.to_vec()), false);
                    return;
                }
                Frame::ConnectAccept { .. } | Frame::ConnectRequest { .. } => {}
            }
        }

        for (payload, method) in delivered {
            self.shared.emit(TransportEvent::Received {
                peer: self.clone(),
                payload,
                method,
            });
        }
    }

    /// Moves to `Disconnected` and reports it, once.
    fn close(&self, reason: DisconnectReason, notify_remote: bool) {
        {
            let mut inner = self.inner.lock();
            if inner.state == ConnectionState::Disconnected {
                return;
            }
            inner.state = ConnectionState::Disconnected;
            inner.unacked.clear();
            inner.reorder.clear();
        }
        if notify_remote {
            self.send_frame(Frame::Disconnect(b""));
        }
        info!("Connection {} ({}) closed: {:?}", self.id, self.addr, reason);
        self.shared.emit(TransportEvent::Disconnected {
            peer_id: self.id as PeerId,
            reason,
        });
    }

    fn maintain(&self, now: Instant) -> bool {
        let config = &self.shared.config;
        let verdict = {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Connected {
                return false;
            }
            if now.duration_since(inner.last_received) > config.connection_timeout {
                Maintenance::Close(DisconnectReason::TimedOut)
            } else {
                let resend_delay = config
                    .min_resend_delay
                    .max(Duration::from_millis(inner.rtt_ms as u64 * 2));
                let mut verdict = Maintenance::Alive;
                for pending in inner.unacked.values_mut() {
                    if now.duration_since(pending.last_sent) < resend_delay {
                        continue;
                    }
                    if pending.attempts >= config.max_resend_attempts {
                        verdict = Maintenance::Close(DisconnectReason::Unreachable);
                        break;
                    }
                    pending.attempts += 1;
                    pending.last_sent = now;
                    self.transmit(&pending.frame);
                }
                if now.duration_since(inner.last_ping_sent) >= config.ping_interval {
                    inner.last_ping_sent = now;
                    self.send_frame(Frame::Ping {
                        timestamp_ms: self.shared.now_ms(),
                    });
                }
                verdict
            }
        };

        match verdict {
            Maintenance::Alive => true,
            Maintenance::Close(reason) => {
                warn!("Dropping connection {} ({}): {:?}", self.id, self.addr, reason);
                self.close(reason, true);
                false
            }
        }
    }
}

impl Peer for DirectPeer {
    fn id(&self) -> PeerId {
        self.id as PeerId
    }

    fn connection_state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    fn ping(&self) -> u32 {
        self.inner.lock().rtt_ms
    }

    fn send(&self, data: &[u8], method: DeliveryMethod) -> Result<()> {
        if data.len() > MAX_PAYLOAD {
            return Err(CodecError::LengthOverflow { len: data.len() }.into());
        }
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Connected {
            return Err(NetError::PeerUnreachable { peer: self.id() });
        }
        match method {
            DeliveryMethod::Unreliable => {
                self.transmit(Frame::Unreliable(data).encode().data());
            }
            DeliveryMethod::ReliableOrdered => {
                let seq = inner.next_send_seq;
                inner.next_send_seq = seq.wrapping_add(1);
                let frame = Frame::Reliable { seq, payload: data }.encode().data().to_vec();
                self.transmit(&frame);
                inner.unacked.insert(
                    seq,
                    Unacked {
                        frame,
                        last_sent: Instant::now(),
                        attempts: 1,
                    },
                );
            }
        }
        Ok(())
    }

    fn disconnect(&self, reason: Option<&[u8]>) {
        {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Connected {
                return;
            }
            inner.state = ConnectionState::ShutdownRequested;
        }
        self.send_frame(Frame::Disconnect(reason.unwrap_or_default()));
        self.close(DisconnectReason::Local, false);
    }

    fn address_string(&self) -> String {
        self.addr.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Listener,
    Connector,
}

type ConnectionTable = Arc<Mutex<HashMap<SocketAddr, Arc<DirectPeer>>>>;

/// Handle to a bound UDP socket and its connections.
#[derive(Debug, Clone)]
pub struct UdpEndpoint {
    shared: Arc<EndpointShared>,
    connections: ConnectionTable,
}

impl UdpEndpoint {
    /// Binds a listening endpoint that accepts incoming connections.
    pub async fn bind(
        addr: &str,
        config: TransportConfig,
    ) -> Result<(UdpEndpoint, mpsc::UnboundedReceiver<TransportEvent>)> {
        config.validate()?;
        let socket = UdpSocket::bind(addr).await?;
        info!("Listening on {}", socket.local_addr()?);

        let (events, rx) = mpsc::unbounded_channel();
        let endpoint = UdpEndpoint::start(socket, config, events, Role::Listener);
        Ok((endpoint, rx))
    }

    /// Connects to a listening endpoint and completes the handshake.
    pub async fn connect(
        server: &str,
        config: TransportConfig,
    ) -> Result<(
        UdpEndpoint,
        Arc<DirectPeer>,
        mpsc::UnboundedReceiver<TransportEvent>,
    )> {
        config.validate()?;
        let server_addr = tokio::net::lookup_host(server)
            .await?
            .next()
            .ok_or_else(|| NetError::ConnectRefused(format!("cannot resolve {}", server)))?;
        let local = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(local).await?;
        let connection_id = handshake(&socket, server_addr, &config).await?;
        info!(
            "Connected to {} as connection {}",
            server_addr, connection_id
        );

        let (events, rx) = mpsc::unbounded_channel();
        let endpoint = UdpEndpoint::start(socket, config, events, Role::Connector);
        let peer = DirectPeer::new(connection_id, server_addr, endpoint.shared.clone());
        endpoint.connections.lock().insert(server_addr, peer.clone());
        Ok((endpoint, peer, rx))
    }

    fn start(
        socket: UdpSocket,
        config: TransportConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
        role: Role,
    ) -> UdpEndpoint {
        let endpoint = UdpEndpoint {
            shared: Arc::new(EndpointShared {
                socket,
                config,
                events,
                epoch: Instant::now(),
                next_connection_id: AtomicU32::new(1),
            }),
            connections: Arc::new(Mutex::new(HashMap::new())),
        };
        tokio::spawn(receive_loop(
            endpoint.shared.clone(),
            endpoint.connections.clone(),
            role,
        ));
        tokio::spawn(maintenance_loop(
            endpoint.shared.clone(),
            endpoint.connections.clone(),
        ));
        endpoint
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.shared.socket.local_addr()?)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Disconnects every live connection.
    pub fn shutdown(&self, reason: &[u8]) {
        let peers: Vec<Arc<DirectPeer>> = self.connections.lock().drain().map(|(_, p)| p).collect();
        for peer in peers {
            peer.disconnect(Some(reason));
        }
    }
}

async fn handshake(socket: &UdpSocket, server: SocketAddr, config: &TransportConfig) -> Result<u32> {
    let request = Frame::ConnectRequest {
        protocol_version: PROTOCOL_VERSION,
    }
    .encode();
    let deadline = Instant::now() + config.connect_timeout;
    let mut buf = vec![0u8; RECV_BUFFER];

    while Instant::now() < deadline {
        socket.send_to(request.data(), server).await?;
        let attempt_end = (Instant::now() + config.connect_retry_interval).min(deadline);

        while let Some(remaining) = attempt_end.checked_duration_since(Instant::now()) {
            let (len, from) = match timeout(remaining, socket.recv_from(&mut buf)).await {
                Ok(Ok(received)) => received,
                Ok(Err(e)) => {
                    debug!("Handshake receive error: {}", e);
                    continue;
                }
                Err(_) => break,
            };
            if from != server {
                continue;
            }
            match Frame::decode(&buf[..len]) {
                Ok(Frame::ConnectAccept { connection_id }) => return Ok(connection_id),
                Ok(Frame::Disconnect(reason)) => {
                    return Err(NetError::ConnectRefused(
                        String::from_utf8_lossy(reason).into_owned(),
                    ))
                }
                _ => {}
            }
        }
    }
    Err(NetError::ConnectTimeout(server.to_string()))
}

async fn receive_loop(shared: Arc<EndpointShared>, connections: ConnectionTable, role: Role) {
    let mut buffer = vec![0u8; RECV_BUFFER];

    loop {
        let received = tokio::select! {
            _ = shared.events.closed() => break,
            received = shared.socket.recv_from(&mut buffer) => received,
        };
        let (len, addr) = match received {
            Ok(received) => received,
            Err(e) => {
                debug!("Error receiving datagram: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
                continue;
            }
        };

        let frame = match Frame::decode(&buffer[..len]) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Dropping undecodable datagram from {}: {}", addr, e);
                continue;
            }
        };

        let existing = connections.lock().get(&addr).cloned();
        match (frame, existing) {
            (Frame::ConnectRequest { protocol_version }, existing) => {
                if role != Role::Listener {
                    continue;
                }
                if protocol_version != PROTOCOL_VERSION {
                    warn!(
                        "Refusing {}: protocol version {} (expected {})",
                        addr, protocol_version, PROTOCOL_VERSION
                    );
                    shared.send_raw(
                        Frame::Disconnect(b"protocol version mismatch").encode().data(),
                        addr,
                    );
                    continue;
                }
                match existing {
                    // Our accept was lost; repeat it.
                    Some(peer) if peer.is_connected() => {
                        peer.send_frame(Frame::ConnectAccept {
                            connection_id: peer.id,
                        });
                    }
                    _ => {
                        let id = shared.next_connection_id.fetch_add(1, Ordering::Relaxed);
                        let peer = DirectPeer::new(id, addr, shared.clone());
                        connections.lock().insert(addr, peer.clone());
                        peer.send_frame(Frame::ConnectAccept { connection_id: id });
                        info!("Accepted connection {} from {}", id, addr);
                        shared.emit(TransportEvent::Connected(peer));
                    }
                }
            }
            (frame, Some(peer)) => peer.handle_frame(frame),
            (_, None) => debug!("Dropping frame from unknown address {}", addr),
        }
    }
    debug!("Receive loop stopped");
}

async fn maintenance_loop(shared: Arc<EndpointShared>, connections: ConnectionTable) {
    let mut ticker = interval(shared.config.maintenance_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shared.events.closed() => break,
            _ = ticker.tick() => {}
        }

        let now = Instant::now();
        let peers: Vec<Arc<DirectPeer>> = connections.lock().values().cloned().collect();
        let dead: Vec<SocketAddr> = peers
            .iter()
            .filter(|peer| !peer.maintain(now))
            .map(|peer| peer.addr)
            .collect();

        if !dead.is_empty() {
            let mut table = connections.lock();
            for addr in dead {
                if table.get(&addr).is_some_and(|peer| !peer.is_connected()) {
                    table.remove(&addr);
                }
            }
        }
    }
    debug!("Maintenance loop stopped");
}

/// True if `seq` is past `next` by at most `window`, counting across the u32 wrap.
fn ahead_within(seq: u32, next: u32, window: u32) -> bool {
    let ahead = seq.wrapping_sub(next);
    ahead != 0 && ahead <= window
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_config() -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(2),
            connect_retry_interval: Duration::from_millis(50),
            min_resend_delay: Duration::from_millis(30),
            maintenance_interval: Duration::from_millis(10),
            ..TransportConfig::default()
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn next_payload(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> (Vec<u8>, DeliveryMethod) {
        loop {
            if let TransportEvent::Received { payload, method, .. } = next_event(rx).await {
                return (payload, method);
            }
        }
    }

    #[test]
    fn test_frame_round_trip() {
        let frames = [
            Frame::ConnectRequest { protocol_version: 1 },
            Frame::ConnectAccept { connection_id: 9 },
            Frame::Unreliable(&[1, 2, 3]),
            Frame::Reliable {
                seq: u32::MAX,
                payload: &[4],
            },
            Frame::Ack { seq: 12 },
            Frame::Ping { timestamp_ms: 77 },
            Frame::Pong { timestamp_ms: 77 },
            Frame::Disconnect(b"bye"),
        ];
        for frame in frames {
            let writer = frame.encode();
            assert_eq!(Frame::decode(writer.data()).unwrap(), frame);
        }
    }

    #[test]
    fn test_reorder_window_across_wrap() {
        assert!(ahead_within(5, 3, 512));
        assert!(ahead_within(1, u32::MAX - 1, 512));
        assert!(ahead_within(u32::MAX, u32::MAX - 10, 512));
        // Duplicates and old frames are not buffered.
        assert!(!ahead_within(3, 3, 512));
        assert!(!ahead_within(u32::MAX, 2, 512));
        assert!(!ahead_within(600, 0, 512));
    }

    #[test]
    fn test_frame_rejects_garbage() {
        assert!(Frame::decode(&[]).is_err());
        assert!(Frame::decode(&[99]).is_err());
        assert!(Frame::decode(&[4, 1, 0]).is_err());
        assert!(Frame::decode(&[0, 1, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(TransportConfig::default().validate().is_ok());
        let lossy = TransportConfig {
            simulated_loss: 1.0,
            ..TransportConfig::default()
        };
        assert!(lossy.validate().is_err());
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let (server, mut server_rx) = UdpEndpoint::bind("127.0.0.1:0", fast_config()).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let (_client, peer, mut client_rx) = UdpEndpoint::connect(&addr, fast_config()).await.unwrap();

        let server_peer = match next_event(&mut server_rx).await {
            TransportEvent::Connected(peer) => peer,
            other => panic!("expected connect, got {:?}", other),
        };
        assert_eq!(server_peer.id(), peer.id());
        assert_eq!(server.connection_count(), 1);

        peer.send(b"hello", DeliveryMethod::ReliableOrdered).unwrap();
        assert_eq!(
            next_payload(&mut server_rx).await,
            (b"hello".to_vec(), DeliveryMethod::ReliableOrdered)
        );

        server_peer.send(b"state", DeliveryMethod::Unreliable).unwrap();
        assert_eq!(
            next_payload(&mut client_rx).await,
            (b"state".to_vec(), DeliveryMethod::Unreliable)
        );
    }

    #[tokio::test]
    async fn test_reliable_order_survives_loss() {
        let lossy = TransportConfig {
            simulated_loss: 0.3,
            ..fast_config()
        };
        let (server, mut server_rx) = UdpEndpoint::bind("127.0.0.1:0", fast_config()).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let (_client, peer, _client_rx) = UdpEndpoint::connect(&addr, lossy).await.unwrap();

        for i in 0u8..40 {
            peer.send(&[i], DeliveryMethod::ReliableOrdered).unwrap();
        }
        for i in 0u8..40 {
            assert_eq!(
                next_payload(&mut server_rx).await,
                (vec![i], DeliveryMethod::ReliableOrdered)
            );
        }
    }

    #[tokio::test]
    async fn test_remote_disconnect_reported_once() {
        let (server, mut server_rx) = UdpEndpoint::bind("127.0.0.1:0", fast_config()).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let (_client, peer, _client_rx) = UdpEndpoint::connect(&addr, fast_config()).await.unwrap();

        let server_peer_id = match next_event(&mut server_rx).await {
            TransportEvent::Connected(peer) => peer.id(),
            other => panic!("expected connect, got {:?}", other),
        };

        peer.disconnect(Some(b"quit"));
        peer.disconnect(Some(b"quit again"));
        assert_eq!(peer.connection_state(), ConnectionState::Disconnected);
        assert!(peer.send(b"late", DeliveryMethod::Unreliable).is_err());

        match next_event(&mut server_rx).await {
            TransportEvent::Disconnected { peer_id, reason } => {
                assert_eq!(peer_id, server_peer_id);
                assert_eq!(reason, DisconnectReason::Remote(b"quit".to_vec()));
            }
            other => panic!("expected disconnect, got {:?}", other),
        }
        assert!(timeout(Duration::from_millis(200), server_rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        // Bound but never answers.
        let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = silent.local_addr().unwrap().to_string();
        let config = TransportConfig {
            connect_timeout: Duration::from_millis(200),
            ..fast_config()
        };
        let result = UdpEndpoint::connect(&addr, config).await;
        assert!(matches!(result, Err(NetError::ConnectTimeout(_))));
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let config = TransportConfig {
            connection_timeout: Duration::from_millis(150),
            ..fast_config()
        };
        let (server, mut server_rx) = UdpEndpoint::bind("127.0.0.1:0", config).await.unwrap();
        let addr = server.local_addr().unwrap();

        // Hand-rolled client that completes the handshake and then goes quiet.
        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let request = Frame::ConnectRequest {
            protocol_version: PROTOCOL_VERSION,
        }
        .encode();
        raw.send_to(request.data(), addr).await.unwrap();

        assert!(matches!(
            next_event(&mut server_rx).await,
            TransportEvent::Connected(_)
        ));
        match next_event(&mut server_rx).await {
            TransportEvent::Disconnected { reason, .. } => {
                assert_eq!(reason, DisconnectReason::TimedOut)
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
