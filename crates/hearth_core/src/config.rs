//! Read-only server configuration.
//!
//! The broker takes a snapshot of [`Config`] at construction and never
//! mutates it. Loading it from disk is the job of the embedding binary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete configuration snapshot consumed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkSettings,
    pub server: ServerSettings,
    pub world: WorldSettings,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Transport name handed to the [`Network`](crate::network::Network) when binding
    pub transport: String,
    /// Address to bind the listener to (e.g. "0.0.0.0:19132")
    pub address: String,
}

/// Advertised server identity and shutdown behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Name shown to players in the server list
    pub name: String,
    /// Maximum player count. Zero means unbounded; the server then always
    /// reports room for exactly one more player.
    pub maximum_players: usize,
    /// Text sent to every connected player when the server closes
    pub shutdown_message: String,
}

/// World settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// World name advertised during game-start negotiation
    pub name: String,
    /// Folder the world provider is opened from
    pub folder: PathBuf,
    /// Largest chunk radius a session may request
    pub maximum_chunk_radius: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            transport: "tcp".to_string(),
            address: "0.0.0.0:19132".to_string(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "Hearth Server".to_string(),
            maximum_players: 0,
            shutdown_message: "Server closed.".to_string(),
        }
    }
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            name: "World".to_string(),
            folder: PathBuf::from("world"),
            maximum_chunk_radius: 32,
        }
    }
}
