//! Core server implementation.
//!
//! Startup loads the world, binds the listener and runs the accept loop.
//! Every raw connection gets its own negotiation task; negotiated players
//! wait in a single-slot mailbox until [`Server::accept`] takes them.

use crate::config::Config;
use crate::error::{NetworkError, ServerError};
use crate::handshake::Negotiator;
use crate::mailbox::Mailbox;
use crate::network::{Listener, ListenerSettings, Network};
use crate::player::Player;
use crate::registry::PlayerRegistry;
use crate::session::SessionFactory;
use crate::shutdown::{shutdown_notice, Lifecycle, Teardown};
use crate::types::BlockEntry;
use crate::world::{ProviderLoader, World};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// External collaborators the server is built from.
pub struct Collaborators {
    /// Binds the listener on start
    pub network: Arc<dyn Network>,
    pub world: Arc<dyn World>,
    /// Opens the world's persistence backend from the configured folder
    pub providers: Arc<dyn ProviderLoader>,
    pub sessions: Arc<dyn SessionFactory>,
    /// Block-state table advertised to joining players
    pub blocks: Vec<BlockEntry>,
}

/// A game server accepting players.
///
/// # Lifecycle
///
/// * [`start`](Server::start) or [`run`](Server::run) exactly once
/// * [`accept`](Server::accept) players while running
/// * [`close`](Server::close) to notify players, close the world and stop listening
///
/// Starting twice, or closing a server that was never started, panics.
pub struct Server {
    config: Arc<Config>,
    network: Arc<dyn Network>,
    world: Arc<dyn World>,
    providers: Arc<dyn ProviderLoader>,
    sessions: Arc<dyn SessionFactory>,
    blocks: Arc<[BlockEntry]>,
    registry: PlayerRegistry,
    mailbox: Arc<Mailbox<Arc<Player>>>,
    lifecycle: Lifecycle,
    listener: OnceLock<Arc<dyn Listener>>,
}

impl Server {
    /// Creates a server that is not running yet.
    ///
    /// Nothing is opened or bound until [`start`](Server::start) or
    /// [`run`](Server::run) is called.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hearth_core::{BasicSessions, BasicWorld, Collaborators, Config, JsonLoader, Server, TcpNetwork};
    /// use std::sync::Arc;
    ///
    /// let server = Server::new(
    ///     Config::default(),
    ///     Collaborators {
    ///         network: Arc::new(TcpNetwork),
    ///         world: Arc::new(BasicWorld::new()),
    ///         providers: Arc::new(JsonLoader),
    ///         sessions: Arc::new(BasicSessions),
    ///         blocks: Vec::new(),
    ///     },
    /// );
    /// assert!(server.address().is_none());
    /// ```
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            config: Arc::new(config),
            network: collaborators.network,
            world: collaborators.world,
            providers: collaborators.providers,
            sessions: collaborators.sessions,
            blocks: collaborators.blocks.into(),
            registry: PlayerRegistry::new(),
            mailbox: Arc::new(Mailbox::new()),
            lifecycle: Lifecycle::new(),
            listener: OnceLock::new(),
        }
    }

    /// Starts the server and runs the accept loop in a background task.
    ///
    /// Returns once the listener is bound. Exits the process if the world
    /// cannot be opened.
    ///
    /// # Panics
    ///
    /// If the server was already started.
    pub async fn start(&self) -> Result<(), ServerError> {
        let acceptor = self.prepare().await?;
        tokio::spawn(acceptor.run());
        Ok(())
    }

    /// Starts the server and runs the accept loop until the listener closes.
    ///
    /// # Panics
    ///
    /// If the server was already started.
    pub async fn run(&self) -> Result<(), ServerError> {
        let acceptor = self.prepare().await?;
        acceptor.run().await;
        Ok(())
    }

    async fn prepare(&self) -> Result<Acceptor, ServerError> {
        self.lifecycle.begin_start();
        info!("Starting server...");

        self.load_world().await;
        let listener = match self.listen().await {
            Ok(listener) => listener,
            Err(e) => {
                self.lifecycle.abort_start();
                return Err(ServerError::Listen(e));
            }
        };
        let listener = self.listener.get_or_init(|| listener).clone();
        self.lifecycle.finish_start();
        info!("Server running on {}.", listener.local_addr());

        let negotiator = Negotiator::new(
            self.config.clone(),
            self.world.clone(),
            self.blocks.clone(),
            self.sessions.clone(),
            self.registry.clone(),
            listener.clone(),
        );
        Ok(Acceptor {
            listener,
            negotiator: Arc::new(negotiator),
            mailbox: self.mailbox.clone(),
        })
    }

    async fn load_world(&self) {
        debug!("Loading world...");
        match self.providers.open(&self.config.world.folder).await {
            Ok(provider) => {
                self.world.set_provider(provider).await;
                debug!("Loaded world '{}'.", self.world.name().await);
            }
            Err(e) => {
                error!(
                    "error loading world from {}: {e}",
                    self.config.world.folder.display()
                );
                std::process::exit(1);
            }
        }
    }

    async fn listen(&self) -> Result<Arc<dyn Listener>, NetworkError> {
        self.network
            .listen(ListenerSettings {
                transport: self.config.network.transport.clone(),
                address: self.config.network.address.clone(),
                server_name: self.config.server.name.clone(),
                maximum_players: self.config.server.maximum_players,
            })
            .await
    }

    /// Waits for the next player to finish negotiating and registers it.
    ///
    /// Players are returned in the order their negotiation completed. Until
    /// someone calls this, negotiated players wait and are not admitted.
    /// Players whose session ended while they waited are dropped and the
    /// next one is taken instead.
    ///
    /// # Returns
    ///
    /// The registered player, or [`ServerError::Closed`] once the server is
    /// shutting down. A player received while the close was starting is
    /// sent the shutdown notice instead of being returned.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn admit(server: &hearth_core::Server) {
    /// while let Ok(player) = server.accept().await {
    ///     println!("{} joined", player.name());
    /// }
    /// # }
    /// ```
    pub async fn accept(&self) -> Result<Arc<Player>, ServerError> {
        loop {
            let player = self.mailbox.recv().await.map_err(|_| ServerError::Closed)?;
            self.registry.insert(player.clone()).await;

            // The session's close callback may have run before the insert.
            if !player.is_connected() {
                self.registry.remove(&player.uuid()).await;
                debug!("{} left before being accepted", player.name());
                continue;
            }

            // Teardown may have listed the players before the insert.
            if self.mailbox.is_closed() {
                let notice = shutdown_notice(&self.config.server.shutdown_message);
                if let Err(e) = player.disconnect(&notice).await {
                    debug!("failed to turn away {}: {e}", player.name());
                }
                return Err(ServerError::Closed);
            }

            return Ok(player);
        }
    }

    /// Number of registered players.
    ///
    /// Players that finished negotiating but were not accepted yet are not
    /// counted.
    pub async fn player_count(&self) -> usize {
        self.registry.len().await
    }

    /// The advertised maximum player count.
    ///
    /// # Returns
    ///
    /// The configured maximum, or `player_count() + 1` when the configured
    /// maximum is zero, so an unbounded server never reports itself full.
    pub async fn max_player_count(&self) -> usize {
        match self.config.server.maximum_players {
            0 => self.player_count().await + 1,
            max => max,
        }
    }

    /// Snapshot of the connected players.
    pub async fn players(&self) -> Vec<Arc<Player>> {
        self.registry.list().await
    }

    /// Looks up a registered player.
    ///
    /// # Returns
    ///
    /// The player with `uuid`, or `None` if no such player is registered.
    pub async fn player(&self, uuid: &Uuid) -> Option<Arc<Player>> {
        self.registry.get(uuid).await
    }

    /// The world players are spawned into.
    pub fn world(&self) -> &Arc<dyn World> {
        &self.world
    }

    /// Configuration snapshot taken at construction.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Address the listener is bound to, once started.
    pub fn address(&self) -> Option<String> {
        self.listener.get().map(|listener| listener.local_addr())
    }

    /// Time since the server started, or zero if it has not.
    pub fn uptime(&self) -> Duration {
        if self.lifecycle.is_running() {
            self.lifecycle.uptime()
        } else {
            Duration::ZERO
        }
    }

    /// Shuts the server down.
    ///
    /// Stops admitting players and notifies every connected player with the
    /// configured shutdown message, then closes the world, then the listener.
    /// A failure to notify a player is only logged. The listener is closed
    /// even if the world fails to close. Calling this again while or after
    /// closing does nothing.
    ///
    /// # Returns
    ///
    /// The first world or listener close error, if any.
    ///
    /// # Panics
    ///
    /// If the server was never started.
    pub async fn close(&self) -> Result<(), ServerError> {
        if !self.lifecycle.begin_close() {
            if self.lifecycle.is_closed() {
                debug!("Server already closed.");
            } else {
                debug!("Server already closing.");
            }
            return Ok(());
        }
        info!("Server shutting down...");

        let result = Teardown {
            mailbox: &self.mailbox,
            registry: &self.registry,
            message: &self.config.server.shutdown_message,
            world: self.world.as_ref(),
            listener: self.listener.get(),
        }
        .run()
        .await;

        self.lifecycle.finish_close();
        info!("Server stopped.");
        result
    }

    /// Resolves once a [`close`](Server::close) has finished.
    pub async fn wait_closed(&self) {
        self.lifecycle.stopped().await
    }
}

/// The accept loop: one negotiation task per raw connection.
struct Acceptor {
    listener: Arc<dyn Listener>,
    negotiator: Arc<Negotiator>,
    mailbox: Arc<Mailbox<Arc<Player>>>,
}

impl Acceptor {
    async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let negotiator = self.negotiator.clone();
                    let mailbox = self.mailbox.clone();
                    tokio::spawn(async move {
                        negotiator.handle(conn, &mailbox).await;
                    });
                }
                Err(e) => {
                    debug!("listener stopped accepting: {e}");
                    self.mailbox.close();
                    return;
                }
            }
        }
    }
}
