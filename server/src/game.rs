//! Authoritative game session logic.
//!
//! [`GameServer`] consumes transport happenings (a peer connected, a payload arrived,
//! a peer went away) and answers by sending packets through the peers involved. It
//! owns the session registry and the world and does no I/O of its own, so the whole
//! join/update/leave protocol can be driven in tests with in-process peers.

use crate::config::ServerConfig;
use crate::session::SessionRegistry;
use crate::world::World;
use log::{debug, error, info, warn};
use shared::packets::{
    Join, JoinAccept, JoinRejected, PlayerJoinedGame, PlayerLeftGame, PlayerReceiveUpdate,
    PlayerSendUpdate,
};
use shared::relay::{RelayRouter, Routed};
use shared::{send_packet, CodecError, NetError, Packet, Peer, PeerId, MAX_USERNAME_LEN};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of sending one packet to a set of peers.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub sent: usize,
    /// Peers whose send failed; they are treated as disconnected.
    pub unreachable: Vec<PeerId>,
}

/// Encodes `packet` once and sends the same bytes to every peer.
pub fn broadcast<'a, I>(peers: I, packet: &Packet) -> Result<BroadcastOutcome, CodecError>
where
    I: IntoIterator<Item = &'a Arc<dyn Peer>>,
{
    let writer = packet.to_writer()?;
    let method = packet.delivery_method();
    let mut outcome = BroadcastOutcome::default();
    for peer in peers {
        match peer.send_writer(&writer, method) {
            Ok(()) => outcome.sent += 1,
            Err(e) => {
                debug!("Broadcast to {} failed: {}", peer.address_string(), e);
                outcome.unreachable.push(peer.id());
            }
        }
    }
    Ok(outcome)
}

/// Trims surrounding whitespace and caps the length in characters.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().chars().take(MAX_USERNAME_LEN).collect()
}

pub struct GameServer {
    sessions: SessionRegistry,
    world: World,
    router: RelayRouter,
    join_timeout: Duration,
    disconnect_on_malformed: bool,
}

impl GameServer {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            sessions: SessionRegistry::new(config.max_players),
            world: World::new(&config.world),
            router: RelayRouter::new(),
            join_timeout: config.join_timeout(),
            disconnect_on_malformed: config.disconnect_on_malformed,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn player_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn handle_connected(&mut self, peer: Arc<dyn Peer>, now: Instant) {
        debug!("Peer {} connected, awaiting join", peer.address_string());
        self.sessions.await_join(peer, now);
    }

    /// Entry point for every payload a transport peer delivers.
    pub fn handle_payload(&mut self, from: &Arc<dyn Peer>, payload: &[u8], now: Instant) {
        let routed = match self.router.route(from, payload) {
            Ok(routed) => routed,
            Err(e) => {
                self.reject_malformed(from, e);
                return;
            }
        };

        match routed {
            Routed::Direct(bytes) => self.handle_packet(from, bytes),
            Routed::Relayed {
                peer,
                payload,
                opened,
            } => {
                let peer: Arc<dyn Peer> = peer;
                // An intermediary never joins itself.
                self.sessions.cancel_join(from.id());
                if opened {
                    self.handle_connected(peer.clone(), now);
                }
                self.handle_packet(&peer, payload);
            }
            Routed::Closed(peer_id) => self.handle_disconnected(peer_id),
            Routed::Announced => {
                if self.sessions.pid_of(from.id()).is_some() {
                    self.router.forget(from.id());
                    self.reject_malformed(
                        from,
                        CodecError::MalformedPacket("relay announce from a joined player"),
                    );
                    return;
                }
                self.sessions.cancel_join(from.id());
            }
            Routed::Ignored => {}
        }
    }

    fn handle_packet(&mut self, peer: &Arc<dyn Peer>, bytes: &[u8]) {
        let packet = match Packet::from_bytes(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.reject_malformed(peer, e);
                return;
            }
        };

        match packet {
            Packet::Join(join) => self.handle_join(peer, join),
            Packet::PlayerSendUpdate(update) => self.handle_update(peer, &update),
            other => warn!(
                "Dropping server-only {:?} packet from {}",
                other.kind(),
                peer.address_string()
            ),
        }
    }

    fn reject_malformed(&mut self, peer: &Arc<dyn Peer>, error: CodecError) {
        warn!("Malformed packet from {}: {}", peer.address_string(), error);
        if self.disconnect_on_malformed {
            peer.disconnect(Some(b"malformed packet"));
            self.handle_disconnected(peer.id());
        }
    }

    fn handle_join(&mut self, peer: &Arc<dyn Peer>, join: Join) {
        if let Some(pid) = self.sessions.pid_of(peer.id()) {
            warn!(
                "Ignoring repeated join from {} (already player {})",
                peer.address_string(),
                pid
            );
            return;
        }

        let username = normalize_username(&join.username);
        let world = &self.world;
        let joined = self.sessions.join(peer.clone(), world.player_hitbox(), |pid| {
            let name = if username.is_empty() {
                format!("player{}", pid)
            } else {
                username.clone()
            };
            world.spawn_player(pid, &name)
        });

        let pid = match joined {
            Ok(pid) => pid,
            Err(NetError::PoolExhausted { capacity }) => {
                info!(
                    "Rejecting {}: server full ({} players)",
                    peer.address_string(),
                    capacity
                );
                let rejected = Packet::JoinRejected(JoinRejected {
                    reason: "server full".to_string(),
                });
                if let Err(e) = send_packet(peer.as_ref(), &rejected) {
                    debug!("Could not deliver rejection: {}", e);
                }
                peer.disconnect(Some(b"server full"));
                self.handle_disconnected(peer.id());
                return;
            }
            Err(e) => {
                error!("Join from {} failed: {}", peer.address_string(), e);
                return;
            }
        };

        let Some(player) = self.sessions.get(pid) else {
            return;
        };
        let player_state = player.state().clone();
        let hitbox = player.hitbox();
        info!(
            "Player {} ({}) joined from {}",
            pid,
            player_state.username,
            peer.address_string()
        );

        let accept = Packet::JoinAccept(JoinAccept {
            game_area: self.world.game_area(),
            player_hitbox: hitbox,
            player_velocity: player_state.entity_state.velocity,
            other_player_states: self
                .sessions
                .players()
                .filter(|other| other.pid() != pid)
                .map(|other| other.state().clone())
                .collect(),
            platform_states: self.world.platforms().to_vec(),
            casino_machine_states: self.world.machines().to_vec(),
            player_state: player_state.clone(),
        });
        if let Err(e) = send_packet(peer.as_ref(), &accept) {
            warn!("Failed to send JoinAccept to player {}: {}", pid, e);
            self.handle_disconnected(peer.id());
            return;
        }

        let announcement = Packet::PlayerJoinedGame(PlayerJoinedGame {
            username: player_state.username.clone(),
            player_state,
            hitbox,
        });
        self.broadcast_packet(&announcement, Some(peer.id()));
    }

    fn handle_update(&mut self, peer: &Arc<dyn Peer>, update: &PlayerSendUpdate) {
        let Some(pid) = self.sessions.pid_of(peer.id()) else {
            debug!("Dropping update from unjoined peer {}", peer.address_string());
            return;
        };
        let Some(player) = self.sessions.get_mut(pid) else {
            return;
        };

        let clamped = PlayerSendUpdate {
            coords: if update.coords.x.is_finite() && update.coords.y.is_finite() {
                self.world.clamp(update.coords)
            } else {
                update.coords
            },
            ..*update
        };
        if !player.apply_client_update(&clamped) {
            warn!("Discarding non-finite update from player {}", pid);
            return;
        }
        if self.world.update_occupancy(player.state()) {
            debug!("Machine occupancy changed by player {}", pid);
        }
    }

    /// Unwinds everything held for `peer_id`. Unknown ids are ignored.
    pub fn handle_disconnected(&mut self, peer_id: PeerId) {
        for relayed in self.router.close_upstream(peer_id) {
            self.remove_session(relayed);
        }
        self.router.forget(peer_id);
        self.remove_session(peer_id);
    }

    fn remove_session(&mut self, peer_id: PeerId) {
        let Some(player) = self.sessions.leave(peer_id) else {
            return;
        };
        let freed = self.world.release_machines(player.pid());
        if freed > 0 {
            debug!("Freed {} machine(s) held by player {}", freed, player.pid());
        }
        let left = Packet::PlayerLeftGame(PlayerLeftGame { pid: player.pid() });
        self.broadcast_packet(&left, None);
    }

    /// Sends `packet` to every joined player except `exclude`.
    ///
    /// Returns the number of successful sends. Unreachable peers are removed.
    pub fn broadcast_packet(&mut self, packet: &Packet, exclude: Option<PeerId>) -> usize {
        let peers: Vec<Arc<dyn Peer>> = self
            .sessions
            .players()
            .map(|player| player.peer().clone())
            .filter(|peer| Some(peer.id()) != exclude)
            .collect();

        let outcome = match broadcast(&peers, packet) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to encode {:?}: {}", packet.kind(), e);
                return 0;
            }
        };
        for peer_id in outcome.unreachable {
            warn!("Peer {} unreachable, removing", peer_id);
            self.handle_disconnected(peer_id);
        }
        outcome.sent
    }

    /// Broadcasts the current world state. Returns the number of recipients.
    pub fn tick(&mut self) -> usize {
        if self.sessions.is_empty() {
            return 0;
        }
        let update = Packet::PlayerReceiveUpdate(PlayerReceiveUpdate {
            player_states: self
                .sessions
                .players()
                .map(|player| player.state().clone())
                .collect(),
            casino_machine_states: self.world.machines().to_vec(),
        });
        self.broadcast_packet(&update, None)
    }

    /// Disconnects peers that connected but never joined.
    pub fn check_join_timeouts(&mut self, now: Instant) -> usize {
        let expired = self.sessions.expired_joins(now, self.join_timeout);
        for peer in &expired {
            info!("Peer {} did not join in time", peer.address_string());
            peer.disconnect(Some(b"join timeout"));
            self.handle_disconnected(peer.id());
        }
        expired.len()
    }

    /// Disconnects every known peer.
    pub fn shutdown(&mut self) {
        for peer in self.sessions.all_peers() {
            peer.disconnect(Some(b"server shutting down"));
            self.handle_disconnected(peer.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::peer::LocalDelivery;
    use shared::{DeliveryMethod, LocalPeer, PacketKind, Vector2};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct TestPeer {
        peer: Arc<LocalPeer>,
        rx: UnboundedReceiver<LocalDelivery>,
    }

    impl TestPeer {
        fn new(id: PeerId) -> Self {
            let (peer, rx) = LocalPeer::new(id);
            Self { peer, rx }
        }

        fn handle(&self) -> Arc<dyn Peer> {
            self.peer.clone()
        }

        fn packets(&mut self) -> Vec<Packet> {
            let mut packets = Vec::new();
            while let Ok(delivery) = self.rx.try_recv() {
                if let LocalDelivery::Data { payload, method } = delivery {
                    let packet = Packet::from_bytes(&payload).unwrap();
                    assert_eq!(packet.delivery_method(), method);
                    packets.push(packet);
                }
            }
            packets
        }

        fn was_disconnected(&mut self) -> bool {
            let mut disconnected = false;
            while let Ok(delivery) = self.rx.try_recv() {
                disconnected |= matches!(delivery, LocalDelivery::Disconnected { .. });
            }
            disconnected
        }
    }

    fn server(max_players: u32) -> GameServer {
        GameServer::new(&ServerConfig {
            max_players,
            ..ServerConfig::default()
        })
    }

    fn join_bytes(name: &str) -> Vec<u8> {
        Packet::Join(Join {
            username: name.to_string(),
        })
        .to_writer()
        .unwrap()
        .data()
        .to_vec()
    }

    fn join(game: &mut GameServer, peer: &TestPeer, name: &str) {
        let handle = peer.handle();
        game.handle_connected(handle.clone(), Instant::now());
        game.handle_payload(&handle, &join_bytes(name), Instant::now());
    }

    #[test]
    fn test_join_accept_snapshot() {
        let mut game = server(4);
        let mut ana = TestPeer::new(1);
        join(&mut game, &ana, "Ana");

        let packets = ana.packets();
        assert_eq!(packets.len(), 1);
        match &packets[0] {
            Packet::JoinAccept(accept) => {
                assert_eq!(accept.player_state.pid, 0);
                assert_eq!(accept.player_state.username, "Ana");
                assert!(accept.other_player_states.is_empty());
                assert_eq!(accept.platform_states.len(), 3);
                assert_eq!(accept.casino_machine_states.len(), 4);
                assert_eq!(accept.game_area, game.world().game_area());
            }
            other => panic!("expected JoinAccept, got {:?}", other),
        }
        assert_eq!(game.player_count(), 1);
        assert_eq!(game.sessions().pending_len(), 0);
    }

    #[test]
    fn test_capacity_scenario_reuses_lowest_pid() {
        let mut game = server(2);
        let mut a = TestPeer::new(1);
        let mut b = TestPeer::new(2);
        let mut c = TestPeer::new(3);
        join(&mut game, &a, "a");
        join(&mut game, &b, "b");
        assert_eq!(game.sessions().pid_of(1), Some(0));
        assert_eq!(game.sessions().pid_of(2), Some(1));

        // A learns about B joining.
        let a_packets = a.packets();
        assert!(matches!(
            a_packets.last(),
            Some(Packet::PlayerJoinedGame(joined)) if joined.player_state.pid == 1
        ));

        join(&mut game, &c, "c");
        let c_packets = c.packets();
        assert!(matches!(c_packets.as_slice(), [Packet::JoinRejected(_)]));
        assert!(!c.peer.is_connected());
        assert_eq!(game.player_count(), 2);

        game.handle_disconnected(1);
        assert!(matches!(
            b.packets().last(),
            Some(Packet::PlayerLeftGame(PlayerLeftGame { pid: 0 }))
        ));

        let mut d = TestPeer::new(4);
        join(&mut game, &d, "d");
        match d.packets().first() {
            Some(Packet::JoinAccept(accept)) => {
                assert_eq!(accept.player_state.pid, 0);
                assert_eq!(accept.other_player_states.len(), 1);
                assert_eq!(accept.other_player_states[0].pid, 1);
            }
            other => panic!("expected JoinAccept, got {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_sends_identical_bytes_once_per_peer() {
        let mut peers: Vec<TestPeer> = (0..5).map(TestPeer::new).collect();
        let handles: Vec<Arc<dyn Peer>> = peers.iter().map(TestPeer::handle).collect();
        let packet = Packet::PlayerLeftGame(PlayerLeftGame { pid: 3 });

        let outcome = broadcast(&handles, &packet).unwrap();
        assert_eq!(outcome.sent, 5);
        assert!(outcome.unreachable.is_empty());

        let expected = packet.to_writer().unwrap().data().to_vec();
        for peer in peers.iter_mut() {
            assert_eq!(peer.peer.sent_count(), 1);
            match peer.rx.try_recv().unwrap() {
                LocalDelivery::Data { payload, method } => {
                    assert_eq!(payload, expected);
                    assert_eq!(method, DeliveryMethod::ReliableOrdered);
                }
                other => panic!("unexpected delivery {:?}", other),
            }
        }
    }

    #[test]
    fn test_broadcast_reports_unreachable() {
        let alive = TestPeer::new(1);
        let dead = TestPeer::new(2);
        dead.peer.disconnect(None);
        let handles = vec![alive.handle(), dead.handle()];

        let outcome = broadcast(&handles, &Packet::PlayerLeftGame(PlayerLeftGame { pid: 0 })).unwrap();
        assert_eq!(outcome.sent, 1);
        assert_eq!(outcome.unreachable, vec![2]);
    }

    #[test]
    fn test_malformed_packet_disconnects() {
        let mut game = server(4);
        let mut peer = TestPeer::new(1);
        join(&mut game, &peer, "x");
        peer.packets();

        let handle = peer.handle();
        game.handle_payload(&handle, &[42, 0, 0], Instant::now());
        assert!(peer.was_disconnected());
        assert_eq!(game.player_count(), 0);
        assert_eq!(game.sessions().pid_of(1), None);
    }

    #[test]
    fn test_malformed_packet_dropped_when_configured() {
        let mut game = GameServer::new(&ServerConfig {
            disconnect_on_malformed: false,
            ..ServerConfig::default()
        });
        let peer = TestPeer::new(1);
        join(&mut game, &peer, "x");

        let handle = peer.handle();
        game.handle_payload(&handle, &[PacketKind::Join as u8, 9], Instant::now());
        assert!(peer.peer.is_connected());
        assert_eq!(game.player_count(), 1);
    }

    #[test]
    fn test_repeated_join_ignored() {
        let mut game = server(4);
        let mut peer = TestPeer::new(1);
        join(&mut game, &peer, "first");
        join(&mut game, &peer, "second");

        assert_eq!(peer.packets().len(), 1);
        assert_eq!(game.player_count(), 1);
        assert_eq!(game.sessions().get(0).unwrap().state().username, "first");
    }

    #[test]
    fn test_username_normalization() {
        let mut game = server(4);
        let long = TestPeer::new(1);
        let blank = TestPeer::new(2);
        join(&mut game, &long, &format!("  {}  ", "z".repeat(40)));
        join(&mut game, &blank, "   ");

        assert_eq!(game.sessions().get(0).unwrap().state().username, "z".repeat(32));
        assert_eq!(game.sessions().get(1).unwrap().state().username, "player1");
    }

    #[test]
    fn test_update_from_unjoined_peer_dropped() {
        let mut game = server(4);
        let peer = TestPeer::new(1);
        let handle = peer.handle();
        game.handle_connected(handle.clone(), Instant::now());

        let update = Packet::PlayerSendUpdate(PlayerSendUpdate {
            coords: Vector2::new(1.0, 1.0),
            velocity: Vector2::ZERO,
            dt: 0.1,
        });
        game.handle_payload(&handle, update.to_writer().unwrap().data(), Instant::now());
        assert_eq!(game.player_count(), 0);
        assert!(peer.peer.is_connected());
    }

    #[test]
    fn test_server_only_packet_dropped() {
        let mut game = server(4);
        let mut peer = TestPeer::new(1);
        join(&mut game, &peer, "x");
        peer.packets();

        let bogus = Packet::PlayerLeftGame(PlayerLeftGame { pid: 0 });
        let handle = peer.handle();
        game.handle_payload(&handle, bogus.to_writer().unwrap().data(), Instant::now());
        assert_eq!(game.player_count(), 1);
        assert!(peer.packets().is_empty());
    }

    #[test]
    fn test_tick_broadcasts_updates() {
        let mut game = server(4);
        let mut a = TestPeer::new(1);
        let mut b = TestPeer::new(2);
        join(&mut game, &a, "a");
        join(&mut game, &b, "b");
        a.packets();
        b.packets();

        let update = Packet::PlayerSendUpdate(PlayerSendUpdate {
            coords: Vector2::new(200.0, 300.0),
            velocity: Vector2::new(5.0, 0.0),
            dt: 0.033,
        });
        let handle = a.handle();
        game.handle_payload(&handle, update.to_writer().unwrap().data(), Instant::now());

        assert_eq!(game.tick(), 2);
        match b.packets().as_slice() {
            [Packet::PlayerReceiveUpdate(update)] => {
                assert_eq!(update.player_states.len(), 2);
                assert_eq!(update.player_states[0].entity_state.coords, Vector2::new(200.0, 300.0));
                assert_eq!(update.casino_machine_states.len(), 4);
            }
            other => panic!("unexpected packets {:?}", other),
        }
        assert_eq!(a.packets().len(), 1);
    }

    #[test]
    fn test_leave_frees_machines() {
        let mut game = server(4);
        let peer = TestPeer::new(1);
        join(&mut game, &peer, "gambler");

        let sit = Packet::PlayerSendUpdate(PlayerSendUpdate {
            coords: Vector2::new(425.0, 632.0),
            velocity: Vector2::ZERO,
            dt: 0.033,
        });
        let handle = peer.handle();
        game.handle_payload(&handle, sit.to_writer().unwrap().data(), Instant::now());
        assert_eq!(game.world().machines()[0].occupant, Some(0));

        game.handle_disconnected(1);
        assert_eq!(game.world().machines()[0].occupant, None);
    }

    #[test]
    fn test_join_timeout() {
        let mut game = server(4);
        let mut idle = TestPeer::new(1);
        let start = Instant::now();
        game.handle_connected(idle.handle(), start);

        assert_eq!(game.check_join_timeouts(start + Duration::from_secs(5)), 0);
        assert_eq!(game.check_join_timeouts(start + Duration::from_secs(11)), 1);
        assert!(idle.was_disconnected());
        assert_eq!(game.sessions().pending_len(), 0);
    }

    #[test]
    fn test_unreachable_player_removed_on_broadcast() {
        let mut game = server(4);
        let mut a = TestPeer::new(1);
        let b = TestPeer::new(2);
        join(&mut game, &a, "a");
        join(&mut game, &b, "b");
        a.packets();

        drop(b.rx);
        assert_eq!(game.tick(), 1);
        assert_eq!(game.player_count(), 1);
        assert!(a
            .packets()
            .iter()
            .any(|p| matches!(p, Packet::PlayerLeftGame(PlayerLeftGame { pid: 1 }))));
    }

    #[test]
    fn test_relayed_sessions() {
        use shared::relay::{RelayEnvelope, RelayOp};

        let mut game = server(4);
        let mut hub = TestPeer::new(50);
        let hub_handle = hub.handle();
        let start = Instant::now();
        game.handle_connected(hub_handle.clone(), start);

        let announce = RelayEnvelope {
            op: RelayOp::Announce,
            origin: 0,
            body: &[],
        }
        .encode();
        game.handle_payload(&hub_handle, announce.data(), start);
        assert!(!game.sessions().is_pending(50));
        assert_eq!(game.check_join_timeouts(start + Duration::from_secs(60)), 0);

        let join = join_bytes("relayed");
        let wrapped = RelayEnvelope {
            op: RelayOp::Data,
            origin: 7,
            body: &join,
        }
        .encode();
        game.handle_payload(&hub_handle, wrapped.data(), Instant::now());
        assert_eq!(game.player_count(), 1);

        // The JoinAccept goes back to the hub inside an envelope.
        let reply = match hub.rx.try_recv().unwrap() {
            LocalDelivery::Data { payload, .. } => payload,
            other => panic!("unexpected delivery {:?}", other),
        };
        let envelope = RelayEnvelope::decode(&reply).unwrap();
        assert_eq!(envelope.origin, 7);
        assert!(matches!(
            Packet::from_bytes(envelope.body).unwrap(),
            Packet::JoinAccept(_)
        ));

        // Losing the hub takes its relayed players with it.
        game.handle_disconnected(50);
        assert_eq!(game.player_count(), 0);
    }

    #[test]
    fn test_unannounced_peer_cannot_open_relayed_sessions() {
        use shared::relay::{RelayEnvelope, RelayOp};

        let mut game = server(4);
        let mut mallory = TestPeer::new(60);
        join(&mut game, &mallory, "mallory");
        assert_eq!(game.player_count(), 1);
        mallory.packets();

        let sock_join = join_bytes("sock");
        let wrapped = RelayEnvelope {
            op: RelayOp::Data,
            origin: 1,
            body: &sock_join,
        }
        .encode();
        game.handle_payload(&mallory.handle(), wrapped.data(), Instant::now());

        assert_eq!(game.player_count(), 0);
        assert!(mallory.was_disconnected());

        // A fresh player is still accepted afterwards.
        let bo = TestPeer::new(61);
        join(&mut game, &bo, "Bo");
        assert_eq!(game.player_count(), 1);
    }

    #[test]
    fn test_joined_player_cannot_announce() {
        use shared::relay::{RelayEnvelope, RelayOp};

        let mut game = GameServer::new(&ServerConfig {
            max_players: 4,
            disconnect_on_malformed: false,
            ..ServerConfig::default()
        });
        let ana = TestPeer::new(70);
        join(&mut game, &ana, "Ana");

        let announce = RelayEnvelope {
            op: RelayOp::Announce,
            origin: 0,
            body: &[],
        }
        .encode();
        game.handle_payload(&ana.handle(), announce.data(), Instant::now());

        for origin in 1..=5 {
            let sock_join = join_bytes("sock");
            let wrapped = RelayEnvelope {
                op: RelayOp::Data,
                origin,
                body: &sock_join,
            }
            .encode();
            game.handle_payload(&ana.handle(), wrapped.data(), Instant::now());
        }
        assert_eq!(game.player_count(), 1);
    }
}
