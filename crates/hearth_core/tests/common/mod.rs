//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use hearth_core::config::Config;
use hearth_core::error::{NetworkError, WorldError};
use hearth_core::network::{ClientData, Connection, IdentityData};
use hearth_core::session::{BasicSession, CloseCallback, Session, SessionFactory};
use hearth_core::transport::{MemoryClient, MemoryNetwork};
use hearth_core::types::BlockPos;
use hearth_core::world::{Provider, World};
use hearth_core::{BasicSessions, BasicWorld, Collaborators, JsonLoader, Player, Server};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Ordered record of collaborator calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub const ADDRESS: &str = "memory:19132";

/// Helper to create a test configuration
pub fn test_config(dir: &TempDir, maximum_players: usize) -> Config {
    let mut config = Config::default();
    config.network.transport = "memory".to_string();
    config.network.address = ADDRESS.to_string();
    config.server.maximum_players = maximum_players;
    config.world.folder = dir.path().join("world");
    config
}

/// A server on an in-process network with a throwaway world folder.
pub struct Harness {
    pub server: Arc<Server>,
    pub network: MemoryNetwork,
    _dir: TempDir,
}

impl Harness {
    pub fn new(maximum_players: usize) -> Self {
        Self::with(maximum_players, Arc::new(BasicWorld::new()), Arc::new(BasicSessions))
    }

    pub fn with(
        maximum_players: usize,
        world: Arc<dyn World>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        Self::on_network(MemoryNetwork::new(), maximum_players, world, sessions)
    }

    /// Another server configured for the same network and address.
    pub fn sibling(&self) -> Self {
        Self::on_network(
            self.network.clone(),
            self.server.config().server.maximum_players,
            Arc::new(BasicWorld::new()),
            Arc::new(BasicSessions),
        )
    }

    fn on_network(
        network: MemoryNetwork,
        maximum_players: usize,
        world: Arc<dyn World>,
        sessions: Arc<dyn SessionFactory>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let server = Server::new(
            test_config(&dir, maximum_players),
            Collaborators {
                network: Arc::new(network.clone()),
                world,
                providers: Arc::new(JsonLoader),
                sessions,
                blocks: Vec::new(),
            },
        );
        Self {
            server: Arc::new(server),
            network,
            _dir: dir,
        }
    }

    /// Dials the server and completes game-start negotiation.
    pub async fn join(&self, name: &str) -> MemoryClient {
        let client = self.dial(identity(name)).await;
        tokio::time::timeout(Duration::from_secs(5), client.join())
            .await
            .expect("negotiation timed out")
            .expect("negotiation failed");
        client
    }

    pub async fn dial(&self, identity: IdentityData) -> MemoryClient {
        self.network
            .dial(ADDRESS, identity, ClientData::default())
            .await
            .expect("dial failed")
    }

    pub async fn accept(&self) -> Arc<Player> {
        tokio::time::timeout(Duration::from_secs(5), self.server.accept())
            .await
            .expect("accept timed out")
            .expect("accept failed")
    }
}

pub fn identity(name: &str) -> IdentityData {
    IdentityData {
        identity: Uuid::new_v4().to_string(),
        display_name: name.to_string(),
        xuid: String::new(),
    }
}

/// Polls `check` until it holds or a second passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// World stub that records its calls.
pub struct RecordingWorld {
    log: CallLog,
    fail_close: bool,
}

impl RecordingWorld {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_close: false,
        }
    }

    pub fn failing_close(log: CallLog) -> Self {
        Self {
            log,
            fail_close: true,
        }
    }
}

#[async_trait]
impl World for RecordingWorld {
    async fn name(&self) -> String {
        "Recorded".to_string()
    }

    async fn spawn(&self) -> BlockPos {
        BlockPos::new(4, 70, -8)
    }

    async fn time(&self) -> i64 {
        1000
    }

    async fn set_provider(&self, _provider: Box<dyn Provider>) {
        self.log.lock().unwrap().push("provider".to_string());
    }

    async fn close(&self) -> Result<(), WorldError> {
        self.log.lock().unwrap().push("world closed".to_string());
        if self.fail_close {
            Err(WorldError::Io(std::io::Error::other("disk full")))
        } else {
            Ok(())
        }
    }
}

/// Session factory whose sessions record every disconnect notice.
pub struct RecordingSessions {
    pub log: CallLog,
}

impl SessionFactory for RecordingSessions {
    fn create(&self, conn: Arc<dyn Connection>, chunk_radius: u32) -> Arc<dyn Session> {
        Arc::new(RecordingSession {
            inner: Arc::new(BasicSession::new(conn, chunk_radius)),
            log: self.log.clone(),
            name: Mutex::new(String::new()),
        })
    }
}

struct RecordingSession {
    inner: Arc<BasicSession>,
    log: CallLog,
    name: Mutex<String>,
}

#[async_trait]
impl Session for RecordingSession {
    fn start(self: Arc<Self>, player: &Arc<Player>, world: Arc<dyn World>, on_close: CloseCallback) {
        *self.name.lock().unwrap() = player.name().to_string();
        self.inner.clone().start(player, world, on_close);
    }

    async fn disconnect(&self, message: &str) -> Result<(), NetworkError> {
        let name = self.name.lock().unwrap().clone();
        self.log
            .lock()
            .unwrap()
            .push(format!("notify {name}: {message}"));
        self.inner.disconnect(message).await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
