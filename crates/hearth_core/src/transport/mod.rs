//! Bundled [`Network`](crate::network::Network) implementations.
//!
//! * [`memory`] - in-process channels, for tests and embedded bots
//! * [`tcp`] - newline-delimited JSON frames over TCP

pub mod memory;
pub mod tcp;

pub use memory::{MemoryClient, MemoryConnection, MemoryNetwork};
pub use tcp::{TcpClient, TcpConnection, TcpNetwork};
