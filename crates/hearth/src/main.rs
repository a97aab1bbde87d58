//! Main application entry point for the Hearth server
//!
//! Loads configuration, sets up logging, wires the server core to its TCP
//! transport, JSON world storage and basic sessions, then runs it until a
//! termination signal arrives.

mod cli;
mod config;
mod logging;
mod signals;

use cli::CliArgs;
use config::AppConfig;
use hearth_core::{BasicSessions, BasicWorld, Collaborators, JsonLoader, Server, TcpNetwork};
use std::sync::Arc;
use tracing::{error, info};

/// Main application struct
pub struct Application {
    config: AppConfig,
    server: Arc<Server>,
}

impl Application {
    /// Loads and validates configuration and builds the server.
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.network.address = bind_address;
        }
        if let Some(world_folder) = args.world_folder {
            config.world.folder = world_folder;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            anyhow::bail!("Configuration validation failed: {e}");
        }

        logging::setup_logging(&config.logging)?;
        info!(
            "Hearth Server v{} | Config: {}",
            env!("CARGO_PKG_VERSION"),
            args.config_path.display()
        );

        let server = Server::new(
            config.to_server_config(),
            Collaborators {
                network: Arc::new(TcpNetwork),
                world: Arc::new(BasicWorld::new()),
                providers: Arc::new(JsonLoader),
                sessions: Arc::new(BasicSessions),
                blocks: Vec::new(),
            },
        );

        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    /// Runs the server until it is closed.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Bind address: {}", self.config.network.address);
        info!("World folder: {}", self.config.world.folder.display());
        match self.config.server.maximum_players {
            0 => info!("Max players: unlimited"),
            max => info!("Max players: {max}"),
        }

        signals::close_on_program_end(self.server.clone());

        // Admit every player as soon as it finishes negotiating.
        let admission = {
            let server = self.server.clone();
            tokio::spawn(async move {
                while let Ok(player) = server.accept().await {
                    info!(
                        "{} joined from {}",
                        player.name(),
                        player.connection().remote_addr()
                    );
                }
            })
        };

        self.server.run().await?;

        // The listener may have stopped without a close, e.g. on a transport failure.
        self.server.close().await?;
        self.server.wait_closed().await;
        admission.await?;

        info!("Uptime: {:.0?}", self.server.uptime());
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("Application error: {e:#}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Failed to start application: {e:#}");
            std::process::exit(1);
        }
    }
}
