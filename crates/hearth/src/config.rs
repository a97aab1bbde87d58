//! Configuration management for the Hearth server.
//!
//! Loads the TOML configuration file, validates it and converts it into the
//! [`Config`] snapshot the server core consumes.

use anyhow::Context;
use hearth_core::config::{Config, NetworkSettings, ServerSettings, WorldSettings};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkSettings,
    pub server: ServerSettings,
    pub world: WorldSettings,
    pub logging: LoggingSettings,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if tokio::fs::try_exists(path).await? {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// The configuration snapshot handed to the server core.
    pub fn to_server_config(&self) -> Config {
        Config {
            network: self.network.clone(),
            server: self.server.clone(),
            world: self.world.clone(),
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.network.transport != "tcp" {
            return Err(format!(
                "Unsupported transport: {}. Only tcp is available",
                &self.network.transport
            ));
        }

        if self.network.address.parse::<SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", &self.network.address));
        }

        if self.world.folder.as_os_str().is_empty() {
            return Err("World folder cannot be empty".to_string());
        }

        if self.world.maximum_chunk_radius == 0 {
            return Err("Maximum chunk radius must be at least 1".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.network.address, "0.0.0.0:19132");
        assert_eq!(config.server.name, "Hearth Server");
        assert_eq!(config.server.maximum_players, 0);
        assert_eq!(config.server.shutdown_message, "Server closed.");
        assert_eq!(config.world.folder, PathBuf::from("world"));
        assert_eq!(config.world.maximum_chunk_radius, 32);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        // The written file loads back to the same configuration.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded, config);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[network]
address = "127.0.0.1:25565"

[server]
name = "Creative Lobby"
maximum_players = 40
shutdown_message = "Back in five."

[world]
name = "Lobby"
folder = "worlds/lobby"
maximum_chunk_radius = 12

[logging]
level = "debug"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.network.address, "127.0.0.1:25565");
        assert_eq!(config.network.transport, "tcp");
        assert_eq!(config.server.name, "Creative Lobby");
        assert_eq!(config.server.maximum_players, 40);
        assert_eq!(config.server.shutdown_message, "Back in five.");
        assert_eq!(config.world.name, "Lobby");
        assert_eq!(config.world.folder, PathBuf::from("worlds/lobby"));
        assert_eq!(config.world.maximum_chunk_radius, 12);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);

        let server_config = config.to_server_config();
        assert_eq!(server_config.server.maximum_players, 40);
        assert_eq!(server_config.world.name, "Lobby");
    }

    #[tokio::test]
    async fn test_load_from_invalid_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "[server\nname = ").await.unwrap();

        assert!(AppConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.network.address = "not an address".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid bind address"));

        let mut config = AppConfig::default();
        config.network.transport = "raknet".to_string();
        assert!(config.validate().unwrap_err().contains("Unsupported transport"));

        let mut config = AppConfig::default();
        config.world.folder = PathBuf::new();
        assert!(config.validate().unwrap_err().contains("World folder"));

        let mut config = AppConfig::default();
        config.world.maximum_chunk_radius = 0;
        assert!(config.validate().unwrap_err().contains("chunk radius"));

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));
    }
}
