//! Stream sessions
//!
//! One [`StreamSession`] runs per open stream. It moves through
//! `Init -> Active -> Terminated`, relaying mailbox deliveries and keepalive
//! frames to the connection, and releases its registry entry on exit.

pub mod frame;
pub mod state;
pub mod stream;

pub use frame::Frame;
pub use state::{SessionPhase, SessionState, TerminationReason};
pub use stream::{
    output_channel, FrameSink, FrameStream, SessionSummary, StreamSession,
    DEFAULT_KEEPALIVE_INTERVAL,
};
