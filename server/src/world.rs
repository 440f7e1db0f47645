//! Static casino-floor layout and machine occupancy.

use serde::Deserialize;
use shared::{
    CasinoMachineState, Collidable, GameEntityState, ObjectType, PlatformState, PlayerState, Rect,
    Vector2,
};

/// Rectangles are written as `[x, y, w, h]` in the config file.
pub type RectBounds = [i32; 4];

/// Every coordinate and size in the layout must stay within this magnitude.
pub const WORLD_EXTENT_LIMIT: i32 = 1_000_000;

fn within_extent(bounds: &RectBounds) -> bool {
    bounds
        .iter()
        .all(|v| v.unsigned_abs() <= WORLD_EXTENT_LIMIT.unsigned_abs())
}

fn rect(bounds: &RectBounds) -> Rect {
    Rect::new(bounds[0], bounds[1], bounds[2], bounds[3])
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub game_area: RectBounds,
    /// Offset and size of a player's hitbox relative to its coordinates.
    pub player_hitbox: RectBounds,
    pub spawn: [f32; 2],
    pub player_mass: f32,
    pub initial_jump_velocity: f32,
    pub max_run_speed: f32,
    pub platforms: Vec<RectBounds>,
    pub casino_machines: Vec<RectBounds>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            game_area: [0, 0, 1280, 720],
            player_hitbox: [0, 0, 32, 48],
            spawn: [96.0, 600.0],
            player_mass: 1.0,
            initial_jump_velocity: -620.0,
            max_run_speed: 320.0,
            platforms: vec![
                [0, 680, 1280, 40],
                [180, 540, 260, 20],
                [820, 460, 260, 20],
            ],
            casino_machines: vec![
                [420, 632, 48, 48],
                [540, 632, 48, 48],
                [660, 632, 48, 48],
                [900, 412, 48, 48],
            ],
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), String> {
        let area = rect(&self.game_area);
        if area.w <= 0 || area.h <= 0 {
            return Err("world.game_area must have a positive size".to_string());
        }
        if self.player_hitbox[2] <= 0 || self.player_hitbox[3] <= 0 {
            return Err("world.player_hitbox must have a positive size".to_string());
        }
        if let Some(bad) = [&self.game_area, &self.player_hitbox]
            .into_iter()
            .chain(&self.platforms)
            .chain(&self.casino_machines)
            .find(|bounds| !within_extent(bounds))
        {
            return Err(format!(
                "world rectangle {:?} exceeds the extent limit of {}",
                bad, WORLD_EXTENT_LIMIT
            ));
        }
        if !self
            .spawn
            .iter()
            .all(|v| v.is_finite() && v.abs() <= WORLD_EXTENT_LIMIT as f32)
        {
            return Err(format!("world.spawn {:?} is out of range", self.spawn));
        }
        if let Some(bad) = self
            .platforms
            .iter()
            .chain(&self.casino_machines)
            .find(|bounds| bounds[2] <= 0 || bounds[3] <= 0)
        {
            return Err(format!("world object {:?} has a non-positive size", bad));
        }
        Ok(())
    }
}

/// A player's hitbox placed at its current coordinates.
struct PlayerBody(Rect);

impl Collidable for PlayerBody {
    fn hitbox(&self) -> Rect {
        self.0
    }
}

/// Authoritative world objects that are not players.
#[derive(Debug, Clone)]
pub struct World {
    game_area: Rect,
    player_hitbox: Rect,
    spawn: Vector2,
    player_mass: f32,
    initial_jump_velocity: f32,
    max_run_speed: f32,
    platforms: Vec<PlatformState>,
    machines: Vec<CasinoMachineState>,
}

impl World {
    pub fn new(config: &WorldConfig) -> Self {
        let platforms = config
            .platforms
            .iter()
            .zip(0u32..)
            .map(|(bounds, platform_id)| PlatformState {
                object_type: ObjectType::Platform,
                platform_id,
                hitbox: rect(bounds),
            })
            .collect();
        let machines = config
            .casino_machines
            .iter()
            .zip(0u32..)
            .map(|(bounds, machine_id)| CasinoMachineState {
                object_type: ObjectType::CasinoMachine,
                machine_id,
                hitbox: rect(bounds),
                occupant: None,
            })
            .collect();

        Self {
            game_area: rect(&config.game_area),
            player_hitbox: rect(&config.player_hitbox),
            spawn: Vector2::new(config.spawn[0], config.spawn[1]),
            player_mass: config.player_mass,
            initial_jump_velocity: config.initial_jump_velocity,
            max_run_speed: config.max_run_speed,
            platforms,
            machines,
        }
    }

    pub fn game_area(&self) -> Rect {
        self.game_area
    }

    pub fn player_hitbox(&self) -> Rect {
        self.player_hitbox
    }

    pub fn platforms(&self) -> &[PlatformState] {
        &self.platforms
    }

    pub fn machines(&self) -> &[CasinoMachineState] {
        &self.machines
    }

    /// Fresh state for a player entering at the spawn point.
    pub fn spawn_player(&self, pid: u32, username: &str) -> PlayerState {
        PlayerState {
            entity_state: GameEntityState {
                awake: true,
                coords: self.spawn,
                velocity: Vector2::ZERO,
                mass: self.player_mass,
            },
            initial_jump_velocity: self.initial_jump_velocity,
            max_run_speed: self.max_run_speed,
            ..PlayerState::new(pid, username)
        }
    }

    /// Keeps `coords` inside the game area.
    pub fn clamp(&self, coords: Vector2) -> Vector2 {
        let area = self.game_area;
        let max_x = (area.x + area.w - self.player_hitbox.w) as f32;
        let max_y = (area.y + area.h - self.player_hitbox.h) as f32;
        Vector2::new(
            coords.x.clamp(area.x as f32, max_x.max(area.x as f32)),
            coords.y.clamp(area.y as f32, max_y.max(area.y as f32)),
        )
    }

    fn body_at(&self, coords: Vector2) -> PlayerBody {
        PlayerBody(Rect::new(
            coords.x as i32 + self.player_hitbox.x,
            coords.y as i32 + self.player_hitbox.y,
            self.player_hitbox.w,
            self.player_hitbox.h,
        ))
    }

    /// A player standing still in front of a free machine takes it; moving off frees it.
    ///
    /// Returns true if any occupancy changed.
    pub fn update_occupancy(&mut self, player: &PlayerState) -> bool {
        let entity = &player.entity_state;
        let body = self.body_at(entity.coords);
        let resting = entity.velocity.is_zero();
        let mut changed = false;

        let holding = self
            .machines
            .iter()
            .position(|machine| machine.occupant == Some(player.pid));
        if let Some(index) = holding {
            if resting && self.machines[index].overlaps(&body) {
                return false;
            }
            self.machines[index].occupant = None;
            changed = true;
        }

        if resting {
            if let Some(machine) = self
                .machines
                .iter_mut()
                .find(|machine| machine.occupant.is_none() && machine.overlaps(&body))
            {
                machine.occupant = Some(player.pid);
                changed = true;
            }
        }
        changed
    }

    /// Frees every machine held by `pid` and returns how many were freed.
    pub fn release_machines(&mut self, pid: u32) -> usize {
        let mut freed = 0;
        for machine in self.machines.iter_mut() {
            if machine.occupant == Some(pid) {
                machine.occupant = None;
                freed += 1;
            }
        }
        freed
    }
}
