//! The server facade.
//!
//! [`Server`] composes the listener, negotiator, registry and lifecycle and
//! is the only type embedders need to drive.

mod core;

pub use self::core::{Collaborators, Server};
