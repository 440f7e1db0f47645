//! Protocol layer shared by the game server, the relay and clients.
//!
//! - [`state`]: world object records and their wire layout
//! - [`packets`]: the application packets built from those records
//! - [`codec`]: little-endian primitive encoders the above are composed from
//! - [`peer`]: the `Peer` abstraction game logic sends through
//! - [`transport`]: UDP connections with unreliable and reliable-ordered channels
//! - [`relay`]: forwarding sessions through an intermediary peer

pub mod codec;
pub mod error;
pub mod packets;
pub mod peer;
pub mod relay;
pub mod state;
pub mod transport;

pub use codec::{NetReader, NetSerialize, NetWriter};
pub use error::{CodecError, NetError, Result};
pub use packets::{Packet, PacketKind};
pub use peer::{send_packet, ConnectionState, DeliveryMethod, LocalPeer, Peer, PeerId};
pub use state::{
    CasinoMachineState, Collidable, GameEntityState, ItemState, ItemType, ObjectType, PlatformState,
    PlayerState, Rect, Vector2,
};
pub use transport::{DisconnectReason, TransportConfig, TransportEvent, UdpEndpoint};

/// Longest username kept after trimming, in characters.
pub const MAX_USERNAME_LEN: usize = 32;
