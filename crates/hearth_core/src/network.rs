//! Contracts for the transport layer the broker sits on.
//!
//! The byte-level game protocol lives behind these traits. The broker only
//! needs to bind, accept, negotiate game start, read the identity a peer
//! logged in with, exchange a handful of control packets and close.

use crate::error::NetworkError;
use crate::types::{BlockEntry, Vec3};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identity a peer presented when logging in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityData {
    /// Declared 128-bit identifier, still in its textual form
    pub identity: String,
    pub display_name: String,
    /// Secondary account identifier
    #[serde(default)]
    pub xuid: String,
}

/// One animated skin layer as sent by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinAnimation {
    /// Base64-encoded frame pixels
    pub image: String,
    pub image_width: u32,
    pub image_height: u32,
    pub frames: f32,
    /// Protocol tag: 1 head, 2 body 32x32, 3 body 128x128
    pub animation_type: u32,
}

/// Client-side data sent with the login, mostly skin payloads.
///
/// Every byte field is base64-encoded on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientData {
    pub skin_data: String,
    pub skin_geometry: String,
    pub skin_resource_patch: String,
    pub skin_image_width: u32,
    pub skin_image_height: u32,
    pub animated_image_data: Vec<SkinAnimation>,
}

/// Server state advertised to a peer during game-start negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameData {
    pub world_name: String,
    pub blocks: Vec<BlockEntry>,
    pub player_position: Vec3,
    pub player_game_mode: i32,
    pub entity_unique_id: i64,
    pub entity_runtime_id: u64,
    pub time: i64,
}

/// Control packets exchanged by the bundled transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    Login {
        identity: IdentityData,
        #[serde(default)]
        client: ClientData,
    },
    StartGame(GameData),
    Ready,
    Text { message: String },
    Disconnect { message: String },
}

/// Construction parameters for a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerSettings {
    pub transport: String,
    pub address: String,
    pub server_name: String,
    pub maximum_players: usize,
}

/// A logged-in peer connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Address of the peer, for logging.
    fn remote_addr(&self) -> String;

    /// Identity the peer logged in with. Not validated by the transport.
    fn identity_data(&self) -> &IdentityData;

    fn client_data(&self) -> &ClientData;

    /// Sends the game data and waits until the peer reports it is ready.
    ///
    /// # Returns
    ///
    /// `Ok(())` once the peer is ready, or [`NetworkError::Negotiation`] if
    /// it left or misbehaved first.
    async fn start_game(&self, data: GameData) -> Result<(), NetworkError>;

    /// Reads the next packet from the peer.
    async fn read_packet(&self) -> Result<Packet, NetworkError>;

    async fn write_packet(&self, packet: Packet) -> Result<(), NetworkError>;

    /// Closes the connection. Pending reads fail with [`NetworkError::Closed`].
    async fn close(&self) -> Result<(), NetworkError>;
}

/// A bound listener producing logged-in connections.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Waits for the next connection. Once the listener is closed this keeps
    /// failing and never yields a connection again.
    async fn accept(&self) -> Result<Arc<dyn Connection>, NetworkError>;

    /// Sends `reason` to the peer and closes the connection.
    async fn disconnect(&self, conn: &dyn Connection, reason: &str) -> Result<(), NetworkError> {
        // The peer may already be gone; closing is what matters.
        let _ = conn
            .write_packet(Packet::Disconnect {
                message: reason.to_string(),
            })
            .await;
        conn.close().await
    }

    /// Stops accepting. Pending and later [`accept`](Listener::accept) calls
    /// fail. Closing twice fails with [`NetworkError::Closed`].
    async fn close(&self) -> Result<(), NetworkError>;

    /// Address the listener is bound to.
    fn local_addr(&self) -> String;
}

/// Binds listeners.
#[async_trait]
pub trait Network: Send + Sync {
    /// Binds a listener as described by `settings`.
    ///
    /// # Returns
    ///
    /// The bound listener, [`NetworkError::UnsupportedTransport`] if this
    /// network does not speak `settings.transport`, or
    /// [`NetworkError::Bind`] if the address cannot be bound.
    async fn listen(&self, settings: ListenerSettings) -> Result<Arc<dyn Listener>, NetworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_wire_shape() {
        let json = serde_json::to_value(Packet::Text {
            message: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "message": "hi"}));

        let ready: Packet = serde_json::from_str(r#"{"type":"ready"}"#).unwrap();
        assert_eq!(ready, Packet::Ready);
    }

    #[test]
    fn test_login_without_client_data() {
        let packet: Packet = serde_json::from_str(
            r#"{"type":"login","identity":{"identity":"abc","display_name":"Steve"}}"#,
        )
        .unwrap();

        match packet {
            Packet::Login { identity, client } => {
                assert_eq!(identity.display_name, "Steve");
                assert!(identity.xuid.is_empty());
                assert_eq!(client, ClientData::default());
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }
}
