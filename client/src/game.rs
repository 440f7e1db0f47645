//! Client-side mirror of the casino floor.
//!
//! The local player is simulated here and pushed to the server; everyone else is
//! taken verbatim from server broadcasts.

use log::{debug, info};
use shared::packets::{JoinAccept, PlayerJoinedGame, PlayerSendUpdate};
use shared::{CasinoMachineState, Packet, PlatformState, PlayerState, Rect, Vector2};
use std::collections::BTreeMap;

/// What applying a server packet changed.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    PlayerJoined { pid: u32, username: String },
    PlayerLeft { pid: u32 },
    StateUpdated,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ClientWorld {
    game_area: Rect,
    player_hitbox: Rect,
    local: PlayerState,
    others: BTreeMap<u32, PlayerState>,
    platforms: Vec<PlatformState>,
    machines: Vec<CasinoMachineState>,
}

impl ClientWorld {
    pub fn from_accept(accept: JoinAccept) -> Self {
        let mut local = accept.player_state;
        local.entity_state.velocity = accept.player_velocity;
        Self {
            game_area: accept.game_area,
            player_hitbox: accept.player_hitbox,
            others: accept
                .other_player_states
                .into_iter()
                .map(|state| (state.pid, state))
                .collect(),
            local,
            platforms: accept.platform_states,
            machines: accept.casino_machine_states,
        }
    }

    pub fn pid(&self) -> u32 {
        self.local.pid
    }

    pub fn local(&self) -> &PlayerState {
        &self.local
    }

    pub fn others(&self) -> impl Iterator<Item = &PlayerState> {
        self.others.values()
    }

    pub fn other(&self, pid: u32) -> Option<&PlayerState> {
        self.others.get(&pid)
    }

    pub fn player_count(&self) -> usize {
        self.others.len() + 1
    }

    pub fn platforms(&self) -> &[PlatformState] {
        &self.platforms
    }

    pub fn machines(&self) -> &[CasinoMachineState] {
        &self.machines
    }

    pub fn apply(&mut self, packet: Packet) -> WorldEvent {
        match packet {
            Packet::PlayerJoinedGame(PlayerJoinedGame {
                username,
                player_state,
                ..
            }) => {
                let pid = player_state.pid;
                if pid == self.local.pid {
                    return WorldEvent::Ignored;
                }
                info!("{} joined as player {}", username, pid);
                self.others.insert(pid, player_state);
                WorldEvent::PlayerJoined { pid, username }
            }
            Packet::PlayerLeftGame(left) => {
                if self.others.remove(&left.pid).is_some() {
                    info!("Player {} left", left.pid);
                }
                WorldEvent::PlayerLeft { pid: left.pid }
            }
            Packet::PlayerReceiveUpdate(update) => {
                // Each broadcast is the full roster, so it replaces ours. The local
                // player is authoritative here.
                let local_pid = self.local.pid;
                let previous = std::mem::replace(
                    &mut self.others,
                    update
                        .player_states
                        .into_iter()
                        .filter(|state| state.pid != local_pid)
                        .map(|state| (state.pid, state))
                        .collect(),
                );
                for pid in previous.keys().filter(|pid| !self.others.contains_key(*pid)) {
                    debug!("Player {} missing from broadcast, dropped", pid);
                }
                self.machines = update.casino_machine_states;
                WorldEvent::StateUpdated
            }
            other => {
                debug!("Ignoring {:?} after join", other.kind());
                WorldEvent::Ignored
            }
        }
    }

    /// Moves the local player at `velocity` for `dt` seconds, staying inside the game area.
    pub fn step_local(&mut self, velocity: Vector2, dt: f32) {
        let max_speed = self.local.max_run_speed.abs();
        let velocity = if max_speed > 0.0 && velocity.magnitude() > max_speed {
            let scale = max_speed / velocity.magnitude();
            Vector2::new(velocity.x * scale, velocity.y * scale)
        } else {
            velocity
        };

        let entity = &mut self.local.entity_state;
        let area = self.game_area;
        let max_x = (area.x + area.w - self.player_hitbox.w).max(area.x) as f32;
        let max_y = (area.y + area.h - self.player_hitbox.h).max(area.y) as f32;
        entity.velocity = velocity;
        entity.coords = Vector2::new(
            (entity.coords.x + velocity.x * dt).clamp(area.x as f32, max_x),
            (entity.coords.y + velocity.y * dt).clamp(area.y as f32, max_y),
        );
        entity.awake = !velocity.is_zero();
    }

    /// The packet reporting the local player's current state.
    pub fn local_update(&self, dt: f32) -> PlayerSendUpdate {
        PlayerSendUpdate {
            coords: self.local.entity_state.coords,
            velocity: self.local.entity_state.velocity,
            dt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::packets::{PlayerLeftGame, PlayerReceiveUpdate};

    fn accept() -> JoinAccept {
        let mut local = PlayerState::new(1, "me");
        local.max_run_speed = 100.0;
        local.entity_state.coords = Vector2::new(50.0, 50.0);
        JoinAccept {
            game_area: Rect::new(0, 0, 200, 100),
            player_hitbox: Rect::new(0, 0, 10, 20),
            player_state: local,
            player_velocity: Vector2::ZERO,
            other_player_states: vec![PlayerState::new(0, "host")],
            platform_states: vec![],
            casino_machine_states: vec![],
        }
    }

    #[test]
    fn test_from_accept() {
        let world = ClientWorld::from_accept(accept());
        assert_eq!(world.pid(), 1);
        assert_eq!(world.player_count(), 2);
        assert_eq!(world.other(0).unwrap().username, "host");
    }

    #[test]
    fn test_roster_changes() {
        let mut world = ClientWorld::from_accept(accept());
        let joined = Packet::PlayerJoinedGame(PlayerJoinedGame {
            username: "Bo".to_string(),
            player_state: PlayerState::new(2, "Bo"),
            hitbox: Rect::new(0, 0, 10, 20),
        });
        assert_eq!(
            world.apply(joined),
            WorldEvent::PlayerJoined {
                pid: 2,
                username: "Bo".to_string()
            }
        );
        assert_eq!(world.player_count(), 3);

        world.apply(Packet::PlayerLeftGame(PlayerLeftGame { pid: 0 }));
        assert!(world.other(0).is_none());
        assert_eq!(world.player_count(), 2);
    }

    #[test]
    fn test_update_does_not_override_local_player() {
        let mut world = ClientWorld::from_accept(accept());
        let mut remote_me = PlayerState::new(1, "me");
        remote_me.entity_state.coords = Vector2::new(0.0, 0.0);
        let mut host = PlayerState::new(0, "host");
        host.entity_state.coords = Vector2::new(9.0, 9.0);

        let update = Packet::PlayerReceiveUpdate(PlayerReceiveUpdate {
            player_states: vec![remote_me, host],
            casino_machine_states: vec![],
        });
        assert_eq!(world.apply(update), WorldEvent::StateUpdated);
        assert_approx_eq!(world.local().entity_state.coords.x, 50.0);
        assert_approx_eq!(world.other(0).unwrap().entity_state.coords.x, 9.0);
    }

    fn full_update(states: Vec<PlayerState>) -> Packet {
        Packet::PlayerReceiveUpdate(PlayerReceiveUpdate {
            player_states: states,
            casino_machine_states: vec![],
        })
    }

    #[test]
    fn test_stale_update_after_leave_does_not_linger() {
        let mut world = ClientWorld::from_accept(accept());
        let me = PlayerState::new(1, "me");
        let host = PlayerState::new(0, "host");

        world.apply(Packet::PlayerLeftGame(PlayerLeftGame { pid: 0 }));
        assert!(world.other(0).is_none());

        // A broadcast sent before the leave arrives late.
        world.apply(full_update(vec![host, me.clone()]));
        assert!(world.other(0).is_some());

        for _ in 0..3 {
            assert_eq!(
                world.apply(full_update(vec![me.clone()])),
                WorldEvent::StateUpdated
            );
        }
        assert!(world.other(0).is_none());
        assert_eq!(world.player_count(), 1);
    }

    #[test]
    fn test_update_adds_players_missed_by_join_notice() {
        let mut world = ClientWorld::from_accept(accept());
        world.apply(full_update(vec![
            PlayerState::new(0, "host"),
            PlayerState::new(1, "me"),
            PlayerState::new(4, "late"),
        ]));
        assert_eq!(world.other(4).unwrap().username, "late");
        assert_eq!(world.player_count(), 3);
    }

    #[test]
    fn test_step_local_clamps_speed_and_area() {
        let mut world = ClientWorld::from_accept(accept());
        world.step_local(Vector2::new(1000.0, 0.0), 1.0);
        let entity = world.local().entity_state;
        assert_approx_eq!(entity.velocity.x, 100.0);
        assert_approx_eq!(entity.coords.x, 150.0);
        assert!(entity.awake);

        world.step_local(Vector2::new(0.0, 100.0), 1.0);
        assert_approx_eq!(world.local().entity_state.coords.y, 80.0);

        let update = world.local_update(0.5);
        assert_approx_eq!(update.dt, 0.5);
        assert_eq!(update.coords, world.local().entity_state.coords);
    }
}
