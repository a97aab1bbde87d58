//! Turns raw connections into players.
//!
//! Each accepted connection is negotiated in its own task. A failure only
//! affects that connection: the peer is disconnected, the failure is logged
//! and nothing is registered.

use crate::config::Config;
use crate::error::HandshakeError;
use crate::mailbox::Mailbox;
use crate::network::{Connection, GameData, Listener};
use crate::player::{self, Player, PlayerInit};
use crate::registry::PlayerRegistry;
use crate::session::SessionFactory;
use crate::shutdown::shutdown_notice;
use crate::types::{BlockEntry, BlockPos};
use crate::world::World;
use std::sync::Arc;
use tracing::{debug, warn};

/// Game mode advertised to joining players.
pub const PLAYER_GAME_MODE: i32 = 1;
/// Entity identifiers a player uses to refer to itself.
pub const SELF_ENTITY_UNIQUE_ID: i64 = 1;
pub const SELF_ENTITY_RUNTIME_ID: u64 = 1;

const NEGOTIATION_FAILED_REASON: &str = "Connection timeout.";

/// Negotiates game start for new connections and builds their players.
pub struct Negotiator {
    config: Arc<Config>,
    world: Arc<dyn World>,
    blocks: Arc<[BlockEntry]>,
    sessions: Arc<dyn SessionFactory>,
    registry: PlayerRegistry,
    listener: Arc<dyn Listener>,
}

impl Negotiator {
    /// Creates a negotiator for connections accepted by `listener`.
    ///
    /// Negotiated players get a session from `sessions` whose close removes
    /// them from `registry`. `blocks` and the world's spawn and time are
    /// advertised to every peer.
    pub fn new(
        config: Arc<Config>,
        world: Arc<dyn World>,
        blocks: Arc<[BlockEntry]>,
        sessions: Arc<dyn SessionFactory>,
        registry: PlayerRegistry,
        listener: Arc<dyn Listener>,
    ) -> Self {
        Self {
            config,
            world,
            blocks,
            sessions,
            registry,
            listener,
        }
    }

    /// Server state advertised to a peer standing at `spawn`.
    pub async fn game_data(&self, spawn: BlockPos) -> GameData {
        GameData {
            world_name: self.config.world.name.clone(),
            blocks: self.blocks.to_vec(),
            player_position: spawn.center(),
            player_game_mode: PLAYER_GAME_MODE,
            entity_unique_id: SELF_ENTITY_UNIQUE_ID,
            entity_runtime_id: SELF_ENTITY_RUNTIME_ID,
            time: self.world.time().await,
        }
    }

    /// Runs game-start negotiation on `conn` and builds the player.
    ///
    /// On success the player's session is already running and will remove
    /// the player from the registry when it ends.
    ///
    /// # Returns
    ///
    /// The player, [`HandshakeError::StartGame`] if the peer did not finish
    /// negotiating, or [`HandshakeError::MalformedIdentity`] if its declared
    /// UUID does not parse. Nothing is started on failure.
    pub async fn negotiate(&self, conn: Arc<dyn Connection>) -> Result<Arc<Player>, HandshakeError> {
        let spawn = self.world.spawn().await;
        conn.start_game(self.game_data(spawn).await)
            .await
            .map_err(HandshakeError::StartGame)?;

        let init = PlayerInit::from_connection(conn.clone())?;
        let session = self
            .sessions
            .create(conn, self.config.world.maximum_chunk_radius);
        let player = Arc::new(player::create(init, spawn, session.clone()));
        session.start(&player, self.world.clone(), self.registry.remove_on_close());
        Ok(player)
    }

    /// Negotiates `conn` and hands the player to the next `Accept` caller.
    ///
    /// Waits until the player is taken. If the mailbox closes first the
    /// player is kicked with the shutdown notice.
    pub async fn handle(&self, conn: Arc<dyn Connection>, mailbox: &Mailbox<Arc<Player>>) {
        let addr = conn.remote_addr();
        match self.negotiate(conn.clone()).await {
            Ok(player) => {
                if mailbox.send(player.clone()).await.is_err() {
                    let notice = shutdown_notice(&self.config.server.shutdown_message);
                    if let Err(e) = player.disconnect(&notice).await {
                        debug!("failed to turn away {}: {e}", player.name());
                    }
                }
            }
            Err(HandshakeError::StartGame(e)) => {
                if let Err(err) = self
                    .listener
                    .disconnect(conn.as_ref(), NEGOTIATION_FAILED_REASON)
                    .await
                {
                    debug!("failed to disconnect {addr}: {err}");
                }
                debug!("connection {addr} failed spawning: {e}");
            }
            Err(HandshakeError::MalformedIdentity { raw, .. }) => {
                if let Err(e) = conn.close().await {
                    debug!("failed to close {addr}: {e}");
                }
                warn!("connection {addr} has a malformed UUID ('{raw}')");
            }
        }
    }
}
