//! Level settings stored as `level.json` inside the world folder.

use super::{LevelData, Provider, ProviderLoader};
use crate::error::WorldError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LEVEL_FILE: &str = "level.json";

/// Opens [`JsonProvider`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLoader;

#[async_trait]
impl ProviderLoader for JsonLoader {
    async fn open(&self, folder: &Path) -> Result<Box<dyn Provider>, WorldError> {
        let provider = JsonProvider::open(folder).await?;
        debug!("Opened level file {}", provider.path().display());
        Ok(Box::new(provider))
    }
}

/// Provider backed by a single JSON file.
#[derive(Debug)]
pub struct JsonProvider {
    path: PathBuf,
    level: LevelData,
}

impl JsonProvider {
    /// Opens the level in `folder`, creating the folder and a default level
    /// file if they don't exist.
    pub async fn open(folder: &Path) -> Result<Self, WorldError> {
        tokio::fs::create_dir_all(folder).await?;
        let path = folder.join(LEVEL_FILE);

        let level = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str(&content)?
        } else {
            let level = LevelData::default();
            write_level(&path, &level).await?;
            info!("Created default level file: {}", path.display());
            level
        };

        Ok(Self { path, level })
    }

    /// Location of the level file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn write_level(path: &Path, level: &LevelData) -> Result<(), WorldError> {
    let content = serde_json::to_string_pretty(level)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}

#[async_trait]
impl Provider for JsonProvider {
    fn level(&self) -> LevelData {
        self.level.clone()
    }

    async fn save(&self, level: &LevelData) -> Result<(), WorldError> {
        write_level(&self.path, level).await
    }

    async fn close(&self) -> Result<(), WorldError> {
        Ok(())
    }
}
