//! Per-player session contracts and a minimal session implementation.
//!
//! A session owns a player's protocol traffic after admission. The broker
//! only starts it and hands it a callback that must run exactly once when
//! the session ends, so the player can be dropped from the registry.

use crate::error::NetworkError;
use crate::latch::CloseLatch;
use crate::network::{Connection, Packet};
use crate::player::Player;
use crate::world::World;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

/// Invoked once with the player's identifier when the session terminates.
pub type CloseCallback = Box<dyn FnOnce(Uuid) -> BoxFuture<'static, ()> + Send>;

/// A running player session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Wires the session to its player and world and starts processing
    /// traffic. `on_close` must be called exactly once when it ends.
    fn start(self: Arc<Self>, player: &Arc<Player>, world: Arc<dyn World>, on_close: CloseCallback);

    /// Sends `message` to the client and ends the session.
    async fn disconnect(&self, message: &str) -> Result<(), NetworkError>;

    /// Whether the session has ended. Must already report `true` by the
    /// time `on_close` runs.
    fn is_closed(&self) -> bool;
}

/// Creates a session for a freshly negotiated connection.
pub trait SessionFactory: Send + Sync {
    fn create(&self, conn: Arc<dyn Connection>, chunk_radius: u32) -> Arc<dyn Session>;
}

/// Creates [`BasicSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicSessions;

impl SessionFactory for BasicSessions {
    fn create(&self, conn: Arc<dyn Connection>, chunk_radius: u32) -> Arc<dyn Session> {
        Arc::new(BasicSession::new(conn, chunk_radius))
    }
}

/// Reads packets until the peer leaves or is disconnected. Chat text is
/// logged, everything else ignored.
pub struct BasicSession {
    conn: Arc<dyn Connection>,
    chunk_radius: u32,
    latch: CloseLatch,
    on_close: Mutex<Option<CloseCallback>>,
}

impl BasicSession {
    pub fn new(conn: Arc<dyn Connection>, chunk_radius: u32) -> Self {
        Self {
            conn,
            chunk_radius,
            latch: CloseLatch::new(),
            on_close: Mutex::new(None),
        }
    }

    async fn read_loop(&self, name: &str) {
        loop {
            let packet = tokio::select! {
                biased;
                _ = self.latch.closed() => return,
                packet = self.conn.read_packet() => packet,
            };
            match packet {
                Ok(Packet::Text { message }) => info!("<{name}> {message}"),
                Ok(Packet::Disconnect { .. }) => return,
                Ok(_) => {}
                Err(e) => {
                    debug!("session of {name} ended: {e}");
                    return;
                }
            }
        }
    }

    async fn finish(&self, uuid: Uuid) {
        self.latch.close();
        if let Err(e) = self.conn.close().await {
            debug!("closing connection of {uuid} failed: {e}");
        }

        let on_close = self
            .on_close
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(on_close) = on_close {
            on_close(uuid).await;
        }
    }
}

#[async_trait]
impl Session for BasicSession {
    fn start(self: Arc<Self>, player: &Arc<Player>, world: Arc<dyn World>, on_close: CloseCallback) {
        *self.on_close.lock().unwrap_or_else(PoisonError::into_inner) = Some(on_close);

        let uuid = player.uuid();
        let name = player.name().to_string();
        tokio::spawn(async move {
            debug!(
                "{name} joined world '{}' with chunk radius {}",
                world.name().await,
                self.chunk_radius
            );
            self.read_loop(&name).await;
            debug!("{name} left the server");
            self.finish(uuid).await;
        });
    }

    async fn disconnect(&self, message: &str) -> Result<(), NetworkError> {
        if self.latch.is_closed() {
            return Ok(());
        }
        let written = self
            .conn
            .write_packet(Packet::Disconnect {
                message: message.to_string(),
            })
            .await;
        self.latch.close();
        self.conn.close().await?;
        written
    }

    fn is_closed(&self) -> bool {
        self.latch.is_closed()
    }
}
