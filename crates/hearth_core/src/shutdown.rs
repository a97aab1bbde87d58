//! Server lifecycle and ordered teardown.
//!
//! The lifecycle moves forward only:
//! not-running -> starting -> running -> closing -> closed.
//! A failed bind during start is the one step back (starting -> not-running).
//! Starting twice or closing before start are caller bugs and panic.

use crate::error::ServerError;
use crate::latch::CloseLatch;
use crate::mailbox::Mailbox;
use crate::network::Listener;
use crate::player::Player;
use crate::registry::PlayerRegistry;
use crate::world::World;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const NOT_RUNNING: u8 = 0;
const STARTING: u8 = 1;
const RUNNING: u8 = 2;
const CLOSING: u8 = 3;
const CLOSED: u8 = 4;

/// Monotonic running state of a server.
pub struct Lifecycle {
    state: AtomicU8,
    started_at: OnceLock<Instant>,
    stopped: CloseLatch,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(NOT_RUNNING),
            started_at: OnceLock::new(),
            stopped: CloseLatch::new(),
        }
    }

    /// Claims the start. Panics if the server was already started.
    pub fn begin_start(&self) {
        if self
            .state
            .compare_exchange(NOT_RUNNING, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            panic!("server already running");
        }
    }

    /// Gives the start back after a recoverable startup failure.
    pub fn abort_start(&self) {
        self.state.store(NOT_RUNNING, Ordering::Release);
    }

    pub fn finish_start(&self) {
        let _ = self.started_at.set(Instant::now());
        self.state.store(RUNNING, Ordering::Release);
    }

    /// Claims the close. Returns `false` if another close already claimed
    /// it. Panics if the server never reached the running state.
    pub fn begin_close(&self) -> bool {
        match self
            .state
            .compare_exchange(RUNNING, CLOSING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(CLOSING) | Err(CLOSED) => false,
            Err(_) => panic!("server not yet running"),
        }
    }

    pub fn finish_close(&self) {
        self.state.store(CLOSED, Ordering::Release);
        self.stopped.close();
    }

    /// True from a successful start onwards, including while closing.
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) >= RUNNING
    }

    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    /// Time since the server started, or zero if it never did.
    pub fn uptime(&self) -> Duration {
        self.started_at
            .get()
            .map(Instant::elapsed)
            .unwrap_or_default()
    }

    /// Resolves once a close has finished.
    pub async fn stopped(&self) {
        self.stopped.closed().await
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders the shutdown notice in yellow.
pub fn shutdown_notice(message: &str) -> String {
    format!("§e{message}§r")
}

/// Everything the teardown touches, in the order it touches it.
pub(crate) struct Teardown<'a> {
    pub mailbox: &'a Mailbox<Arc<Player>>,
    pub registry: &'a PlayerRegistry,
    pub message: &'a str,
    pub world: &'a dyn World,
    pub listener: Option<&'a Arc<dyn Listener>>,
}

impl Teardown<'_> {
    /// Stops admission, then notifies players, closes the world and closes
    /// the listener, strictly in that order. The listener is closed even if
    /// the world fails to close; the first error is returned.
    pub(crate) async fn run(self) -> Result<(), ServerError> {
        self.mailbox.close();

        debug!("Disconnecting players...");
        let notice = shutdown_notice(self.message);
        for player in self.registry.list().await {
            if let Err(e) = player.disconnect(&notice).await {
                warn!("failed to notify {} of shutdown: {e}", player.name());
            }
        }

        debug!("Closing world...");
        let world = self.world.close().await.map_err(ServerError::WorldClose);

        debug!("Closing listener...");
        let listener = match self.listener {
            Some(listener) => listener.close().await.map_err(ServerError::ListenerClose),
            None => Ok(()),
        };

        match (world, listener) {
            (Err(e), Err(listener_err)) => {
                warn!("{listener_err}");
                Err(e)
            }
            (world, listener) => world.and(listener),
        }
    }
}
