//! # Hearth Core
//!
//! Connection acceptance and player lifecycle for a multiplayer game server.
//!
//! The crate owns the listener's lifecycle, turns logged-in connections into
//! players, keeps the authoritative registry of connected players and shuts
//! everything down in order. The wire protocol, world storage and per-player
//! game logic are collaborators reached through the traits in [`network`],
//! [`world`] and [`session`].
//!
//! ## Flow
//!
//! ```text
//! Listener::accept -> negotiation task per connection -> single-slot mailbox
//!                  -> Server::accept -> PlayerRegistry
//! ```
//!
//! Shutdown runs the other way: notify registered players, close the world,
//! close the listener.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth_core::{
//!     BasicSessions, BasicWorld, Collaborators, Config, JsonLoader, Server, TcpNetwork,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), hearth_core::ServerError> {
//! let server = Server::new(
//!     Config::default(),
//!     Collaborators {
//!         network: Arc::new(TcpNetwork),
//!         world: Arc::new(BasicWorld::new()),
//!         providers: Arc::new(JsonLoader),
//!         sessions: Arc::new(BasicSessions),
//!         blocks: Vec::new(),
//!     },
//! );
//! server.start().await?;
//! while let Ok(player) = server.accept().await {
//!     println!("{} joined", player.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handshake;
pub mod latch;
pub mod mailbox;
pub mod network;
pub mod player;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod skin;
pub mod transport;
pub mod types;
pub mod world;

pub use config::Config;
pub use error::{HandshakeError, NetworkError, ServerError, WorldError};
pub use player::Player;
pub use registry::PlayerRegistry;
pub use server::{Collaborators, Server};
pub use session::{BasicSessions, Session, SessionFactory};
pub use transport::{MemoryNetwork, TcpNetwork};
pub use world::{BasicWorld, JsonLoader, World};
