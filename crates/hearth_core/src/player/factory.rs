use super::Player;
use crate::error::HandshakeError;
use crate::network::{ClientData, Connection};
use crate::session::Session;
use crate::skin::Skin;
use crate::types::BlockPos;
use std::sync::Arc;
use uuid::Uuid;

/// Everything known about a connection once negotiation succeeded.
///
/// Produced once per connection attempt and consumed right away by [`create`].
pub struct PlayerInit {
    pub conn: Arc<dyn Connection>,
    pub uuid: Uuid,
    pub name: String,
    pub xuid: String,
    /// Raw skin payloads, still base64-encoded
    pub client: ClientData,
}

impl PlayerInit {
    /// Reads the identity the connection logged in with. Fails if the
    /// declared identifier is not a UUID.
    pub fn from_connection(conn: Arc<dyn Connection>) -> Result<Self, HandshakeError> {
        let identity = conn.identity_data().clone();
        let uuid = Uuid::parse_str(&identity.identity).map_err(|source| {
            HandshakeError::MalformedIdentity {
                raw: identity.identity.clone(),
                source,
            }
        })?;

        Ok(Self {
            client: conn.client_data().clone(),
            conn,
            uuid,
            name: identity.display_name,
            xuid: identity.xuid,
        })
    }
}

/// Builds the player for `init`, standing in the middle of the `spawn` block.
pub fn create(init: PlayerInit, spawn: BlockPos, session: Arc<dyn Session>) -> Player {
    Player {
        uuid: init.uuid,
        name: init.name,
        xuid: init.xuid,
        skin: Skin::from_client_data(&init.client),
        position: spawn.center(),
        conn: init.conn,
        session,
    }
}
