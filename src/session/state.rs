//! Session state machine
//!
//! Tracks a stream session from registration to termination.

use std::time::{Duration, Instant};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Mailbox registered, loop not started
    Init,
    /// Relaying messages and keepalives
    Active,
    /// Loop exited, registration released
    Terminated,
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Peer disconnected or the response body was dropped
    PeerClosed,
    /// Server is shutting down
    Shutdown,
    /// A newer registration took over this participant's identifier
    Superseded,
    /// The registry entry was removed while the session was running
    Removed,
}

/// Lifecycle state for one session
#[derive(Debug)]
pub struct SessionState {
    /// Current phase
    pub phase: SessionPhase,

    /// Time the session was created
    pub opened_at: Instant,

    /// Time the loop started
    pub activated_at: Option<Instant>,

    /// Delivery frames written
    pub deliveries: u64,

    /// Keepalive frames written
    pub keepalives: u64,
}

impl SessionState {
    /// Create a new session state
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Init,
            opened_at: Instant::now(),
            activated_at: None,
            deliveries: 0,
            keepalives: 0,
        }
    }

    /// Enter the active loop
    pub fn activate(&mut self) {
        if self.phase == SessionPhase::Init {
            self.phase = SessionPhase::Active;
            self.activated_at = Some(Instant::now());
        }
    }

    /// Stop the session; terminal
    pub fn terminate(&mut self) {
        self.phase = SessionPhase::Terminated;
    }

    /// Check if the loop is running
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new();
        assert_eq!(state.phase, SessionPhase::Init);

        state.activate();
        assert!(state.is_active());
        assert!(state.activated_at.is_some());

        state.terminate();
        assert_eq!(state.phase, SessionPhase::Terminated);
    }

    #[test]
    fn test_terminated_is_final() {
        let mut state = SessionState::new();
        state.terminate();

        state.activate();
        assert_eq!(state.phase, SessionPhase::Terminated);
        assert!(state.activated_at.is_none());
    }
}
