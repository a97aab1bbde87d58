//! Error types for the connection broker.
//!
//! Each collaborator boundary gets its own error enum so callers can tell an
//! operator/environment failure apart from a per-connection one. Caller
//! contract violations (double start, close before start) are not part of
//! this taxonomy; they panic.

use thiserror::Error;

/// Failures reported by a [`Network`](crate::network::Network),
/// [`Listener`](crate::network::Listener) or
/// [`Connection`](crate::network::Connection).
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The listener could not bind to the requested address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The requested transport is not provided by this network.
    #[error("unsupported transport '{0}'")]
    UnsupportedTransport(String),

    /// No listener is reachable at the address.
    #[error("no listener at {0}")]
    Unreachable(String),

    /// The listener or connection has been closed.
    #[error("use of closed network connection")]
    Closed,

    /// The peer did not complete game-start negotiation.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed packet: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Failures reported by a [`World`](crate::world::World) or its persistence provider.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed level data: {0}")]
    Format(#[from] serde_json::Error),

    #[error("world already closed")]
    Closed,
}

/// Per-connection admission failures. These never affect other connections
/// or the registry.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("game start negotiation failed: {0}")]
    StartGame(#[source] NetworkError),

    #[error("malformed UUID ('{raw}'): {source}")]
    MalformedIdentity {
        raw: String,
        #[source]
        source: uuid::Error,
    },
}

/// Errors surfaced by the [`Server`](crate::server::Server) facade.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The hand-off mailbox is closed; stop accepting.
    #[error("server closed")]
    Closed,

    /// The listener could not be set up. The server did not reach the running state.
    #[error("listening on address failed: {0}")]
    Listen(#[source] NetworkError),

    #[error("closing world failed: {0}")]
    WorldClose(#[source] WorldError),

    #[error("closing listener failed: {0}")]
    ListenerClose(#[source] NetworkError),
}
