//! # Casino Game Server
//!
//! Authoritative server for the multiplayer casino floor. Clients connect over UDP,
//! send `Join`, and from then on push their own position while the server
//! broadcasts everyone's state at a fixed tick rate.
//!
//! ## Module Organization
//!
//! - `config`: TOML and command-line configuration
//! - `id_pool`: fixed-capacity player id allocation
//! - `session`: peer to player bindings and the join clock
//! - `world`: platforms, casino machines and their occupancy
//! - `game`: the join/update/leave protocol, free of I/O
//! - `network`: the event loop tying the transport to `game`
//! - `relay`: a relay node forwarding client sessions to an upstream server
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 9000,
//!         max_players: 4,
//!         ..ServerConfig::default()
//!     };
//!     let server = Server::new(config).await?;
//!     server.run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod id_pool;
pub mod network;
pub mod relay;
pub mod session;
pub mod world;
