//! Application packets exchanged between client and server.
//!
//! Every packet is a one-byte [`PacketKind`] followed by its body. The delivery method
//! is a property of the kind, not of the call site: roster changes travel
//! reliable-ordered so every client converges on the same player list, while per-tick
//! position traffic is unreliable and the latest value wins.

use crate::codec::{NetReader, NetSerialize, NetWriter};
use crate::error::CodecError;
use crate::peer::DeliveryMethod;
use crate::state::{CasinoMachineState, PlatformState, PlayerState, Rect, Vector2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Join = 0,
    JoinAccept = 1,
    JoinRejected = 2,
    PlayerSendUpdate = 3,
    PlayerReceiveUpdate = 4,
    PlayerJoinedGame = 5,
    PlayerLeftGame = 6,
}

impl TryFrom<u8> for PacketKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => PacketKind::Join,
            1 => PacketKind::JoinAccept,
            2 => PacketKind::JoinRejected,
            3 => PacketKind::PlayerSendUpdate,
            4 => PacketKind::PlayerReceiveUpdate,
            5 => PacketKind::PlayerJoinedGame,
            6 => PacketKind::PlayerLeftGame,
            _ => {
                return Err(CodecError::InvalidEnumValue {
                    type_name: "PacketKind",
                    value,
                })
            }
        })
    }
}

impl PacketKind {
    pub fn delivery_method(self) -> DeliveryMethod {
        match self {
            PacketKind::PlayerSendUpdate | PacketKind::PlayerReceiveUpdate => {
                DeliveryMethod::Unreliable
            }
            PacketKind::Join
            | PacketKind::JoinAccept
            | PacketKind::JoinRejected
            | PacketKind::PlayerJoinedGame
            | PacketKind::PlayerLeftGame => DeliveryMethod::ReliableOrdered,
        }
    }

    /// True for packets only a client may send.
    pub fn is_client_to_server(self) -> bool {
        matches!(self, PacketKind::Join | PacketKind::PlayerSendUpdate)
    }
}

/// Client asks to enter the game.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub username: String,
}

/// Full world snapshot sent to a newly joined client.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinAccept {
    pub game_area: Rect,
    pub player_hitbox: Rect,
    pub player_state: PlayerState,
    pub player_velocity: Vector2,
    pub other_player_states: Vec<PlayerState>,
    pub platform_states: Vec<PlatformState>,
    pub casino_machine_states: Vec<CasinoMachineState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinRejected {
    pub reason: String,
}

/// Client's own state, pushed periodically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSendUpdate {
    pub coords: Vector2,
    pub velocity: Vector2,
    pub dt: f32,
}

/// Per-tick broadcast of every bound player and every casino machine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerReceiveUpdate {
    pub player_states: Vec<PlayerState>,
    pub casino_machine_states: Vec<CasinoMachineState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerJoinedGame {
    pub username: String,
    pub player_state: PlayerState,
    pub hitbox: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerLeftGame {
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Join(Join),
    JoinAccept(JoinAccept),
    JoinRejected(JoinRejected),
    PlayerSendUpdate(PlayerSendUpdate),
    PlayerReceiveUpdate(PlayerReceiveUpdate),
    PlayerJoinedGame(PlayerJoinedGame),
    PlayerLeftGame(PlayerLeftGame),
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Join(_) => PacketKind::Join,
            Packet::JoinAccept(_) => PacketKind::JoinAccept,
            Packet::JoinRejected(_) => PacketKind::JoinRejected,
            Packet::PlayerSendUpdate(_) => PacketKind::PlayerSendUpdate,
            Packet::PlayerReceiveUpdate(_) => PacketKind::PlayerReceiveUpdate,
            Packet::PlayerJoinedGame(_) => PacketKind::PlayerJoinedGame,
            Packet::PlayerLeftGame(_) => PacketKind::PlayerLeftGame,
        }
    }

    pub fn delivery_method(&self) -> DeliveryMethod {
        self.kind().delivery_method()
    }

    /// Encodes the packet, kind byte included, into a fresh writer.
    pub fn to_writer(&self) -> Result<NetWriter, CodecError> {
        let mut writer = NetWriter::with_capacity(64);
        self.encode(&mut writer)?;
        Ok(writer)
    }

    /// Decodes one whole datagram payload. Trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Packet, CodecError> {
        let mut reader = NetReader::new(bytes);
        let packet = Packet::decode(&mut reader)?;
        reader.finish()?;
        Ok(packet)
    }
}

impl NetSerialize for Packet {
    fn encode(&self, writer: &mut NetWriter) -> Result<(), CodecError> {
        writer.put_u8(self.kind() as u8);
        match self {
            Packet::Join(join) => writer.put_string(&join.username),
            Packet::JoinAccept(accept) => {
                writer.put(&accept.game_area)?;
                writer.put(&accept.player_hitbox)?;
                writer.put(&accept.player_state)?;
                writer.put(&accept.player_velocity)?;
                writer.put_list(&accept.other_player_states)?;
                writer.put_list(&accept.platform_states)?;
                writer.put_list(&accept.casino_machine_states)
            }
            Packet::JoinRejected(rejected) => writer.put_string(&rejected.reason),
            Packet::PlayerSendUpdate(update) => {
                writer.put(&update.coords)?;
                writer.put(&update.velocity)?;
                writer.put_f32(update.dt);
                Ok(())
            }
            Packet::PlayerReceiveUpdate(update) => {
                writer.put_list(&update.player_states)?;
                writer.put_list(&update.casino_machine_states)
            }
            Packet::PlayerJoinedGame(joined) => {
                writer.put_string(&joined.username)?;
                writer.put(&joined.player_state)?;
                writer.put(&joined.hitbox)
            }
            Packet::PlayerLeftGame(left) => {
                writer.put_u32(left.pid);
                Ok(())
            }
        }
    }

    fn decode(reader: &mut NetReader<'_>) -> Result<Self, CodecError> {
        let kind: PacketKind = reader.get_enum()?;
        Ok(match kind {
            PacketKind::Join => Packet::Join(Join {
                username: reader.get_string()?,
            }),
            PacketKind::JoinAccept => Packet::JoinAccept(JoinAccept {
                game_area: reader.get()?,
                player_hitbox: reader.get()?,
                player_state: reader.get()?,
                player_velocity: reader.get()?,
                other_player_states: reader.get_list()?,
                platform_states: reader.get_list()?,
                casino_machine_states: reader.get_list()?,
            }),
            PacketKind::JoinRejected => Packet::JoinRejected(JoinRejected {
                reason: reader.get_string()?,
            }),
            PacketKind::PlayerSendUpdate => Packet::PlayerSendUpdate(PlayerSendUpdate {
                coords: reader.get()?,
                velocity: reader.get()?,
                dt: reader.get_f32()?,
            }),
            PacketKind::PlayerReceiveUpdate => Packet::PlayerReceiveUpdate(PlayerReceiveUpdate {
                player_states: reader.get_list()?,
                casino_machine_states: reader.get_list()?,
            }),
            PacketKind::PlayerJoinedGame => Packet::PlayerJoinedGame(PlayerJoinedGame {
                username: reader.get_string()?,
                player_state: reader.get()?,
                hitbox: reader.get()?,
            }),
            PacketKind::PlayerLeftGame => Packet::PlayerLeftGame(PlayerLeftGame {
                pid: reader.get_u32()?,
            }),
        })
    }
}
