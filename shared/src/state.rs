//! Plain state records exchanged between processes.
//!
//! The physics layer produces [`GameEntityState`] values and the renderer consumes
//! them; this module only defines their shape and wire layout.

use crate::codec::{NetReader, NetSerialize, NetWriter};
use crate::error::CodecError;

/// Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Integer rectangle used for the game area and hitboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Far edges, saturating at the `i32` range.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        let (x2, y2) = (self.right(), self.bottom());
        let (ox2, oy2) = (other.right(), other.bottom());
        !(x2 <= other.x || ox2 <= self.x || y2 <= other.y || oy2 <= self.y)
    }
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl TryFrom<u8> for $name {
            type Error = CodecError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err(CodecError::InvalidEnumValue {
                        type_name: stringify!($name),
                        value,
                    }),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }
    };
}

wire_enum!(
    /// Kind of world object a record describes.
    ObjectType {
        Entity = 0,
        Player = 1,
        Item = 2,
        Platform = 3,
        CasinoMachine = 4,
    }
);

wire_enum!(
    ItemType {
        Chip = 0,
        Dice = 1,
        Card = 2,
        Cocktail = 3,
    }
);

/// A single capability a world object may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Drawable,
    Collidable,
    Dynamic,
    Interactable,
}

impl ObjectType {
    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            ObjectType::Entity => &[Drawable, Dynamic],
            ObjectType::Player => &[Drawable, Collidable, Dynamic],
            ObjectType::Item => &[Drawable, Collidable, Dynamic, Interactable],
            ObjectType::Platform => &[Drawable, Collidable],
            ObjectType::CasinoMachine => &[Drawable, Collidable, Interactable],
        }
    }

    pub fn has(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Objects with a fixed hitbox in world space.
pub trait Collidable {
    fn hitbox(&self) -> Rect;

    fn overlaps(&self, other: &dyn Collidable) -> bool {
        self.hitbox().intersects(&other.hitbox())
    }
}

/// Minimal physical state of a simulated body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GameEntityState {
    pub awake: bool,
    pub coords: Vector2,
    pub velocity: Vector2,
    pub mass: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub object_type: ObjectType,
    pub pid: u32,
    pub username: String,
    pub entity_state: GameEntityState,
    pub initial_jump_velocity: f32,
    pub max_run_speed: f32,
}

impl PlayerState {
    pub fn new(pid: u32, username: impl Into<String>) -> Self {
        Self {
            object_type: ObjectType::Player,
            pid,
            username: username.into(),
            entity_state: GameEntityState::default(),
            initial_jump_velocity: 0.0,
            max_run_speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemState {
    pub object_type: ObjectType,
    pub item_id: u32,
    pub item_type: ItemType,
    pub entity_state: GameEntityState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformState {
    pub object_type: ObjectType,
    pub platform_id: u32,
    pub hitbox: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasinoMachineState {
    pub object_type: ObjectType,
    pub machine_id: u32,
    pub hitbox: Rect,
    /// Pid of the player currently using the machine.
    pub occupant: Option<u32>,
}

impl Collidable for PlatformState {
    fn hitbox(&self) -> Rect {
        self.hitbox
    }
}

impl Collidable for CasinoMachineState {
    fn hitbox(&self) -> Rect {
        self.hitbox
    }
}

impl NetSerialize for Vector2 {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError> {
        writer.put_f32(self.x);
        writer.put_f32(self.y);
        Ok(())
    }

    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError> {
        Ok(Vector2 {
            x: reader.get_f32()?,
            y: reader.get_f32()?,
        })
    }
}

impl NetSerialize for Rect {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError> {
        writer.put_i32(self.x);
        writer.put_i32(self.y);
        writer.put_i32(self.w);
        writer.put_i32(self.h);
        Ok(())
    }

    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError> {
        Ok(Rect {
            x: reader.get_i32()?,
            y: reader.get_i32()?,
            w: reader.get_i32()?,
            h: reader.get_i32()?,
        })
    }
}

impl NetSerialize for GameEntityState {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError> {
        writer.put_bool(self.awake);
        writer.put(&self.coords)?;
        writer.put(&self.velocity)?;
        writer.put_f32(self.mass);
        Ok(())
    }

    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError> {
        Ok(GameEntityState {
            awake: reader.get_bool()?,
            coords: reader.get()?,
            velocity: reader.get()?,
            mass: reader.get_f32()?,
        })
    }
}

impl NetSerialize for PlayerState {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError> {
        writer.put_u8(self.object_type.into());
        writer.put_u32(self.pid);
        writer.put_string(&self.username)?;
        writer.put(&self.entity_state)?;
        writer.put_f32(self.initial_jump_velocity);
        writer.put_f32(self.max_run_speed);
        Ok(())
    }

    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError> {
        Ok(PlayerState {
            object_type: reader.get_enum()?,
            pid: reader.get_u32()?,
            username: reader.get_string()?,
            entity_state: reader.get()?,
            initial_jump_velocity: reader.get_f32()?,
            max_run_speed: reader.get_f32()?,
        })
    }
}

impl NetSerialize for ItemState {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError> {
        writer.put_u8(self.object_type.into());
        writer.put_u32(self.item_id);
        writer.put_u8(self.item_type.into());
        writer.put(&self.entity_state)
    }

    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError> {
        Ok(ItemState {
            object_type: reader.get_enum()?,
            item_id: reader.get_u32()?,
            item_type: reader.get_enum()?,
            entity_state: reader.get()?,
        })
    }
}

impl NetSerialize for PlatformState {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError> {
        writer.put_u8(self.object_type.into());
        writer.put_u32(self.platform_id);
        writer.put(&self.hitbox)
    }

    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError> {
        Ok(PlatformState {
            object_type: reader.get_enum()?,
            platform_id: reader.get_u32()?,
            hitbox: reader.get()?,
        })
    }
}

impl NetSerialize for CasinoMachineState {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError> {
        writer.put_u8(self.object_type.into());
        writer.put_u32(self.machine_id);
        writer.put(&self.hitbox)?;
        writer.put_option_u32(self.occupant);
        Ok(())
    }

    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError> {
        Ok(CasinoMachineState {
            object_type: reader.get_enum()?,
            machine_id: reader.get_u32()?,
            hitbox: reader.get()?,
            occupant: reader.get_option_u32()?,
        })
    }
}
