//! World collaborator contracts and a basic in-memory world.
//!
//! The broker only needs a handful of facts from the world (name, spawn
//! point, time) and a way to flush and close it on shutdown. Terrain, chunks
//! and entities live elsewhere.

mod json;

pub use json::{JsonLoader, JsonProvider};

use crate::error::WorldError;
use crate::types::BlockPos;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

/// Persisted level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelData {
    pub name: String,
    pub spawn: BlockPos,
    pub time: i64,
}

impl Default for LevelData {
    fn default() -> Self {
        Self {
            name: "World".to_string(),
            spawn: BlockPos::new(0, 64, 0),
            time: 0,
        }
    }
}

/// Persistence backend for a world.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Level settings as they were loaded.
    fn level(&self) -> LevelData;

    async fn save(&self, level: &LevelData) -> Result<(), WorldError>;

    async fn close(&self) -> Result<(), WorldError>;
}

/// Opens a [`Provider`] for a world folder.
#[async_trait]
pub trait ProviderLoader: Send + Sync {
    async fn open(&self, folder: &Path) -> Result<Box<dyn Provider>, WorldError>;
}

/// The world as seen by the broker.
#[async_trait]
pub trait World: Send + Sync {
    async fn name(&self) -> String;

    async fn spawn(&self) -> BlockPos;

    async fn time(&self) -> i64;

    /// Installs a persistence backend, replacing the current level settings
    /// with the ones it holds.
    async fn set_provider(&self, provider: Box<dyn Provider>);

    /// Flushes level settings to the provider and closes it.
    async fn close(&self) -> Result<(), WorldError>;
}

struct WorldState {
    level: LevelData,
    provider: Option<Box<dyn Provider>>,
    closed: bool,
}

/// A world that only tracks level settings.
pub struct BasicWorld {
    state: RwLock<WorldState>,
}

impl BasicWorld {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(WorldState {
                level: LevelData::default(),
                provider: None,
                closed: false,
            }),
        }
    }

    pub async fn set_time(&self, time: i64) {
        self.state.write().await.level.time = time;
    }

    pub async fn set_spawn(&self, spawn: BlockPos) {
        self.state.write().await.level.spawn = spawn;
    }
}

impl Default for BasicWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl World for BasicWorld {
    async fn name(&self) -> String {
        self.state.read().await.level.name.clone()
    }

    async fn spawn(&self) -> BlockPos {
        self.state.read().await.level.spawn
    }

    async fn time(&self) -> i64 {
        self.state.read().await.level.time
    }

    async fn set_provider(&self, provider: Box<dyn Provider>) {
        let mut state = self.state.write().await;
        state.level = provider.level();
        state.provider = Some(provider);
    }

    async fn close(&self) -> Result<(), WorldError> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(WorldError::Closed);
        }
        state.closed = true;

        if let Some(provider) = state.provider.take() {
            debug!("Saving level '{}'...", state.level.name);
            provider.save(&state.level).await?;
            provider.close().await?;
        }
        Ok(())
    }
}
