//! Real-time broadcast relay over Server-Sent Events
//!
//! Any connected participant can publish a short text message, and every
//! other currently-connected participant receives it as a live stream update.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<Registry>
//!                 ┌──────────────────────────┐
//!                 │ mailboxes: HashMap<Id,   │
//!                 │   Mailbox (send half)    │
//!                 │ >                        │
//!                 └────────────┬─────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!   POST /send           [StreamSession]       [StreamSession]
//!   registry.broadcast() mailbox.recv()        mailbox.recv()
//!        │                     │                     │
//!        └──────► handoff ─────┴──► SSE frame ──► HTTP body
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sse_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> sse_relay::error::Result<()> {
//! let config = ServerConfig::default().bind("127.0.0.1:3000".parse().unwrap());
//! let server = RelayServer::new(config);
//!
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{
    BroadcastReport, DeliveryOutcome, HandoffPolicy, Message, ParticipantId, Registry,
    RegistryConfig,
};
pub use server::{RelayServer, ServerConfig};
pub use session::{Frame, StreamSession, TerminationReason};
pub use stats::{RelayStats, StatsSnapshot};
