//! Participant registry for broadcast fan-out
//!
//! The registry maps each streaming participant to its mailbox and delivers
//! published messages to all of them.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<Registry>
//!                     ┌─────────────────────────┐
//!                     │ mailboxes: HashMap<Id,  │
//!                     │   Slot {                │
//!                     │     mailbox: Tx,        │
//!                     │     generation,         │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Publisher]            [Session]               [Session]
//!    POST /send             mailbox.recv()          mailbox.recv()
//!         │                       │                       │
//!         └──► registry.broadcast()──► handoff ──► SSE frame
//! ```
//!
//! # Handoff
//!
//! A mailbox is a single-slot handoff by default, so a broadcast is
//! backpressured by its slowest recipient. [`HandoffPolicy`] makes the bound
//! explicit: unbounded rendezvous, timeout-bounded rendezvous (the default),
//! or a bounded buffer that drops the newest message on overflow.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod store;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use mailbox::{mailbox, DeliveryOutcome, HandoffPolicy, Mailbox, MailboxReceiver};
pub use message::{Message, ParticipantId};
pub use store::{BroadcastReport, Registration, Registry};
