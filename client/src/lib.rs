//! # Casino Game Client Library
//!
//! Headless client for the casino game server. It connects over the shared UDP
//! transport, joins with a username, keeps a mirror of the floor up to date from
//! server broadcasts and pushes its own player's state at a fixed rate.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The client's view of the world: the locally simulated player, every other
//! player as last reported by the server, platforms and casino machines.
//!
//! ### Input Module (`input`)
//! Where the local player's movement comes from. The headless client either idles
//! or random-walks to generate traffic.
//!
//! ### Network Module (`network`)
//! Connection and join handshake, event processing and the update loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::{InputSource, Wanderer};
//! use client::network::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::join("127.0.0.1:8080", "Ana", ClientConfig::default()).await?;
//!     println!("joined as player {}", client.pid());
//!     client
//!         .run(InputSource::Wander(Wanderer::new()), async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
