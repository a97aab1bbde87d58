//! In-process transport.
//!
//! A [`MemoryNetwork`] keeps a table of bound addresses. Dialing an address
//! creates a connected pair: the server half is delivered to the listener,
//! the [`MemoryClient`] half is returned to the caller to drive the login.

use crate::error::NetworkError;
use crate::latch::CloseLatch;
use crate::network::{
    ClientData, Connection, GameData, IdentityData, Listener, ListenerSettings, Network, Packet,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

type Backlog = mpsc::UnboundedSender<Arc<MemoryConnection>>;

/// A table of in-process listeners keyed by address.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    listeners: Arc<Mutex<HashMap<String, Backlog>>>,
    next_peer: Arc<AtomicU64>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to the listener bound at `address`, logging in with the given
    /// identity. The listener yields the server half from its next `accept`.
    pub async fn dial(
        &self,
        address: &str,
        identity: IdentityData,
        client: ClientData,
    ) -> Result<MemoryClient, NetworkError> {
        let listeners = self.listeners.lock().await;
        let backlog = listeners
            .get(address)
            .ok_or_else(|| NetworkError::Unreachable(address.to_string()))?;

        let peer = self.next_peer.fetch_add(1, Ordering::Relaxed);
        let (conn, client) = pair(format!("memory:{peer}"), identity, client);
        backlog
            .send(conn)
            .map_err(|_| NetworkError::Unreachable(address.to_string()))?;
        Ok(client)
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn listen(&self, settings: ListenerSettings) -> Result<Arc<dyn Listener>, NetworkError> {
        let mut listeners = self.listeners.lock().await;
        if listeners.contains_key(&settings.address) {
            return Err(NetworkError::Bind {
                address: settings.address,
                source: io::Error::from(io::ErrorKind::AddrInUse),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(settings.address.clone(), tx);
        debug!(
            "memory listener for '{}' bound to {}",
            settings.server_name, settings.address
        );

        Ok(Arc::new(MemoryListener {
            address: settings.address,
            incoming: Mutex::new(rx),
            latch: CloseLatch::new(),
            listeners: self.listeners.clone(),
        }))
    }
}

struct MemoryListener {
    address: String,
    incoming: Mutex<mpsc::UnboundedReceiver<Arc<MemoryConnection>>>,
    latch: CloseLatch,
    listeners: Arc<Mutex<HashMap<String, Backlog>>>,
}

#[async_trait]
impl Listener for MemoryListener {
    async fn accept(&self) -> Result<Arc<dyn Connection>, NetworkError> {
        if self.latch.is_closed() {
            return Err(NetworkError::Closed);
        }
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            biased;
            _ = self.latch.closed() => Err(NetworkError::Closed),
            conn = incoming.recv() => match conn {
                Some(conn) => Ok(conn as Arc<dyn Connection>),
                None => Err(NetworkError::Closed),
            },
        }
    }

    async fn close(&self) -> Result<(), NetworkError> {
        if !self.latch.close() {
            return Err(NetworkError::Closed);
        }
        self.listeners.lock().await.remove(&self.address);
        Ok(())
    }

    fn local_addr(&self) -> String {
        self.address.clone()
    }
}

/// Creates a connected server/client pair without going through a listener.
pub fn pair(
    remote_addr: impl Into<String>,
    identity: IdentityData,
    client: ClientData,
) -> (Arc<MemoryConnection>, MemoryClient) {
    let (to_server, from_client) = mpsc::unbounded_channel();
    let (to_client, from_server) = mpsc::unbounded_channel();
    let latch = CloseLatch::new();

    let conn = MemoryConnection {
        remote_addr: remote_addr.into(),
        identity,
        client,
        pipe: Pipe::new(from_client, to_client, latch.clone()),
    };
    let client = MemoryClient {
        pipe: Pipe::new(from_server, to_server, latch),
    };
    (Arc::new(conn), client)
}

/// One direction-pair of packet channels sharing a close flag with its peer.
struct Pipe {
    incoming: Mutex<mpsc::UnboundedReceiver<Packet>>,
    outgoing: mpsc::UnboundedSender<Packet>,
    latch: CloseLatch,
}

impl Pipe {
    fn new(
        incoming: mpsc::UnboundedReceiver<Packet>,
        outgoing: mpsc::UnboundedSender<Packet>,
        latch: CloseLatch,
    ) -> Self {
        Self {
            incoming: Mutex::new(incoming),
            outgoing,
            latch,
        }
    }

    // Packets queued before a close are still delivered.
    async fn read(&self) -> Result<Packet, NetworkError> {
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            biased;
            packet = incoming.recv() => packet.ok_or(NetworkError::Closed),
            _ = self.latch.closed() => Err(NetworkError::Closed),
        }
    }

    fn write(&self, packet: Packet) -> Result<(), NetworkError> {
        if self.latch.is_closed() {
            return Err(NetworkError::Closed);
        }
        self.outgoing.send(packet).map_err(|_| NetworkError::Closed)
    }

    fn close(&self) {
        self.latch.close();
    }
}

/// Server half of an in-process connection.
pub struct MemoryConnection {
    remote_addr: String,
    identity: IdentityData,
    client: ClientData,
    pipe: Pipe,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn remote_addr(&self) -> String {
        self.remote_addr.clone()
    }

    fn identity_data(&self) -> &IdentityData {
        &self.identity
    }

    fn client_data(&self) -> &ClientData {
        &self.client
    }

    async fn start_game(&self, data: GameData) -> Result<(), NetworkError> {
        let left = || NetworkError::Negotiation("peer left during negotiation".to_string());
        self.pipe.write(Packet::StartGame(data)).map_err(|_| left())?;
        match self.pipe.read().await {
            Ok(Packet::Ready) => Ok(()),
            Ok(_) => Err(NetworkError::Negotiation(
                "expected ready packet".to_string(),
            )),
            Err(_) => Err(left()),
        }
    }

    async fn read_packet(&self) -> Result<Packet, NetworkError> {
        self.pipe.read().await
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), NetworkError> {
        self.pipe.write(packet)
    }

    async fn close(&self) -> Result<(), NetworkError> {
        self.pipe.close();
        Ok(())
    }
}

/// Client half of an in-process connection.
pub struct MemoryClient {
    pipe: Pipe,
}

impl MemoryClient {
    /// Completes game-start negotiation: waits for the game data and replies
    /// that the client is ready.
    pub async fn join(&self) -> Result<GameData, NetworkError> {
        match self.pipe.read().await? {
            Packet::StartGame(data) => {
                self.pipe.write(Packet::Ready)?;
                Ok(data)
            }
            _ => Err(NetworkError::Negotiation(
                "expected start game packet".to_string(),
            )),
        }
    }

    pub async fn read_packet(&self) -> Result<Packet, NetworkError> {
        self.pipe.read().await
    }

    pub fn write_packet(&self, packet: Packet) -> Result<(), NetworkError> {
        self.pipe.write(packet)
    }

    /// Reads until the server sends a disconnect, returning its message.
    /// Returns `None` if the connection ends without one.
    pub async fn disconnected(&self) -> Option<String> {
        loop {
            match self.pipe.read().await {
                Ok(Packet::Disconnect { message }) => return Some(message),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn close(&self) {
        self.pipe.close();
    }

    pub fn is_closed(&self) -> bool {
        self.pipe.latch.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;
    use std::time::Duration;
    use tokio::time::timeout;

    fn settings(address: &str) -> ListenerSettings {
        ListenerSettings {
            transport: "memory".to_string(),
            address: address.to_string(),
            server_name: "test".to_string(),
            maximum_players: 0,
        }
    }

    fn identity(name: &str) -> IdentityData {
        IdentityData {
            identity: uuid::Uuid::new_v4().to_string(),
            display_name: name.to_string(),
            xuid: String::new(),
        }
    }

    fn game_data() -> GameData {
        GameData {
            world_name: "World".to_string(),
            blocks: Vec::new(),
            player_position: Vec3::new(0.5, 64.0, 0.5),
            player_game_mode: 1,
            entity_unique_id: 1,
            entity_runtime_id: 1,
            time: 0,
        }
    }

    #[tokio::test]
    async fn test_dial_delivers_connection_to_listener() {
        let network = MemoryNetwork::new();
        let listener = network.listen(settings("lobby")).await.unwrap();

        let client = network
            .dial("lobby", identity("Alex"), ClientData::default())
            .await
            .unwrap();
        let conn = listener.accept().await.unwrap();
        assert_eq!(conn.identity_data().display_name, "Alex");

        let (started, joined) = tokio::join!(conn.start_game(game_data()), client.join());
        started.unwrap();
        assert_eq!(joined.unwrap(), game_data());
    }

    #[tokio::test]
    async fn test_bind_same_address_twice_fails() {
        let network = MemoryNetwork::new();
        let first = network.listen(settings("lobby")).await.unwrap();

        let second = network.listen(settings("lobby")).await;
        assert!(matches!(second, Err(NetworkError::Bind { .. })));

        first.close().await.unwrap();
        network.listen(settings("lobby")).await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_listener_keeps_failing() {
        let network = MemoryNetwork::new();
        let listener = network.listen(settings("lobby")).await.unwrap();
        listener.close().await.unwrap();

        for _ in 0..3 {
            let result = timeout(Duration::from_millis(50), listener.accept())
                .await
                .expect("accept on a closed listener must not block");
            assert!(matches!(result, Err(NetworkError::Closed)));
        }
        assert!(matches!(listener.close().await, Err(NetworkError::Closed)));
        assert!(matches!(
            network.dial("lobby", identity("Late"), ClientData::default()).await,
            Err(NetworkError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_start_game_fails_when_peer_leaves() {
        let (conn, client) = pair("memory:test", identity("Gone"), ClientData::default());
        drop(client);

        let result = conn.start_game(game_data()).await;
        assert!(matches!(result, Err(NetworkError::Negotiation(_))));
    }

    #[tokio::test]
    async fn test_disconnect_message_survives_close() {
        let network = MemoryNetwork::new();
        let listener = network.listen(settings("lobby")).await.unwrap();
        let client = network
            .dial("lobby", identity("Kicked"), ClientData::default())
            .await
            .unwrap();
        let conn = listener.accept().await.unwrap();

        listener.disconnect(conn.as_ref(), "Connection timeout.").await.unwrap();

        assert_eq!(client.disconnected().await.as_deref(), Some("Connection timeout."));
        assert!(client.is_closed());
    }
}
