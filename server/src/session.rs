//! Player sessions bound to peers.
//!
//! A peer goes through two stages on the server:
//! - awaiting join: connected at the transport level but has not sent `Join` yet
//! - bound: owns a pid from the [`IdAllocator`] and an authoritative [`PlayerState`]
//!
//! The registry is the only owner of both, and removing a binding is the only way a
//! pid goes back to the pool.

use crate::id_pool::IdAllocator;
use log::{error, info};
use shared::packets::PlayerSendUpdate;
use shared::{Peer, PeerId, PlayerState, Rect, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The server's view of one joined player.
#[derive(Debug)]
pub struct NetworkPlayer {
    peer: Arc<dyn Peer>,
    pid: u32,
    state: PlayerState,
    hitbox: Rect,
}

impl NetworkPlayer {
    pub fn peer(&self) -> &Arc<dyn Peer> {
        &self.peer
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn hitbox(&self) -> Rect {
        self.hitbox
    }

    /// Adopts the physical state of `snapshot`. Identity fields stay as assigned at join.
    pub fn update_entity_state(&mut self, snapshot: &PlayerState) {
        self.state.entity_state = snapshot.entity_state;
    }

    /// Applies a client-reported position. Returns false if the update was discarded.
    pub fn apply_client_update(&mut self, update: &PlayerSendUpdate) -> bool {
        let values = [
            update.coords.x,
            update.coords.y,
            update.velocity.x,
            update.velocity.y,
            update.dt,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return false;
        }

        let mut snapshot = self.state.clone();
        snapshot.entity_state.awake = true;
        snapshot.entity_state.coords = update.coords;
        snapshot.entity_state.velocity = update.velocity;
        self.update_entity_state(&snapshot);
        true
    }
}

#[derive(Debug)]
struct PendingJoin {
    peer: Arc<dyn Peer>,
    since: Instant,
}

#[derive(Debug)]
pub struct SessionRegistry {
    ids: IdAllocator,
    players: BTreeMap<u32, NetworkPlayer>,
    by_peer: HashMap<PeerId, u32>,
    pending: HashMap<PeerId, PendingJoin>,
}

impl SessionRegistry {
    pub fn new(max_players: u32) -> Self {
        Self {
            ids: IdAllocator::new(max_players),
            players: BTreeMap::new(),
            by_peer: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Starts the join clock for a freshly connected peer.
    pub fn await_join(&mut self, peer: Arc<dyn Peer>, now: Instant) {
        if self.by_peer.contains_key(&peer.id()) {
            return;
        }
        self.pending
            .entry(peer.id())
            .or_insert(PendingJoin { peer, since: now });
    }

    /// Stops the join clock for `peer_id` without binding it.
    pub fn cancel_join(&mut self, peer_id: PeerId) -> bool {
        self.pending.remove(&peer_id).is_some()
    }

    pub fn is_pending(&self, peer_id: PeerId) -> bool {
        self.pending.contains_key(&peer_id)
    }

    pub fn has_capacity(&self) -> bool {
        self.ids.has_capacity()
    }

    /// Binds `peer` to the lowest free pid. `spawn` builds the initial state for that pid.
    ///
    /// A peer that is already bound keeps its pid.
    pub fn join<F>(&mut self, peer: Arc<dyn Peer>, hitbox: Rect, spawn: F) -> Result<u32>
    where
        F: FnOnce(u32) -> PlayerState,
    {
        let peer_id = peer.id();
        if let Some(&pid) = self.by_peer.get(&peer_id) {
            return Ok(pid);
        }
        let pid = self.ids.allocate()?;
        self.pending.remove(&peer_id);
        self.by_peer.insert(peer_id, pid);
        self.players.insert(
            pid,
            NetworkPlayer {
                peer,
                pid,
                state: spawn(pid),
                hitbox,
            },
        );
        Ok(pid)
    }

    /// Removes whatever the registry holds for `peer_id`, releasing its pid.
    ///
    /// Returns the removed player if the peer had joined. Calling this again for the
    /// same peer is a no-op.
    pub fn leave(&mut self, peer_id: PeerId) -> Option<NetworkPlayer> {
        self.pending.remove(&peer_id);
        let pid = self.by_peer.remove(&peer_id)?;
        let player = self.players.remove(&pid);
        if let Err(e) = self.ids.release(pid) {
            error!("Failed to release pid {}: {}", pid, e);
        }
        if let Some(player) = &player {
            info!(
                "Player {} ({}) left, {} remaining",
                player.pid,
                player.state.username,
                self.players.len()
            );
        }
        player
    }

    /// Removes and returns peers that have waited longer than `timeout` to join.
    pub fn expired_joins(&mut self, now: Instant, timeout: Duration) -> Vec<Arc<dyn Peer>> {
        let expired: Vec<PeerId> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.since) > timeout)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.pending.remove(&id))
            .map(|pending| pending.peer)
            .collect()
    }

    pub fn pid_of(&self, peer_id: PeerId) -> Option<u32> {
        self.by_peer.get(&peer_id).copied()
    }

    pub fn get(&self, pid: u32) -> Option<&NetworkPlayer> {
        self.players.get(&pid)
    }

    pub fn get_mut(&mut self, pid: u32) -> Option<&mut NetworkPlayer> {
        self.players.get_mut(&pid)
    }

    /// Joined players in pid order.
    pub fn players(&self) -> impl Iterator<Item = &NetworkPlayer> {
        self.players.values()
    }

    /// Every peer known to the registry, joined or not.
    pub fn all_peers(&self) -> Vec<Arc<dyn Peer>> {
        self.players
            .values()
            .map(|player| player.peer.clone())
            .chain(self.pending.values().map(|pending| pending.peer.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
