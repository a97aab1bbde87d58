//! Admitted players.

mod factory;

pub use factory::{create, PlayerInit};

use crate::error::NetworkError;
use crate::network::Connection;
use crate::session::Session;
use crate::skin::Skin;
use crate::types::Vec3;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A player that completed negotiation.
///
/// Players are shared as `Arc<Player>` between the registry, the session and
/// whoever called `Accept`.
pub struct Player {
    uuid: Uuid,
    name: String,
    xuid: String,
    skin: Skin,
    position: Vec3,
    conn: Arc<dyn Connection>,
    session: Arc<dyn Session>,
}

impl Player {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Secondary account identifier.
    pub fn xuid(&self) -> &str {
        &self.xuid
    }

    pub fn skin(&self) -> &Skin {
        &self.skin
    }

    /// Position the player was spawned at.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// False once the player's session has ended.
    pub fn is_connected(&self) -> bool {
        !self.session.is_closed()
    }

    /// Kicks the player, showing them `message`.
    pub async fn disconnect(&self, message: &str) -> Result<(), NetworkError> {
        self.session.disconnect(message).await
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .field("xuid", &self.xuid)
            .field("position", &self.position)
            .field("remote_addr", &self.conn.remote_addr())
            .finish_non_exhaustive()
    }
}
