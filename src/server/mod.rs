//! HTTP server for the relay
//!
//! Wires the stream and publish endpoints onto an axum router backed by one
//! explicitly constructed [`Registry`](crate::registry::Registry).

pub mod config;
pub mod handlers;
pub mod listener;

pub use config::ServerConfig;
pub use handlers::{PublishForm, RelayState};
pub use listener::RelayServer;
