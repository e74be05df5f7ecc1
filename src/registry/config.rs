//! Registry configuration

use std::time::Duration;

use super::mailbox::HandoffPolicy;

/// Default bound on a single mailbox handoff
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the participant registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// How a broadcast hands a message to each mailbox
    pub handoff: HandoffPolicy,

    /// Maximum registered participants (0 = unlimited)
    pub max_participants: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            handoff: HandoffPolicy::Timeout(DEFAULT_HANDOFF_TIMEOUT),
            max_participants: 0,
        }
    }
}

impl RegistryConfig {
    /// Set the handoff policy
    pub fn handoff(mut self, policy: HandoffPolicy) -> Self {
        self.handoff = policy;
        self
    }

    /// Set maximum participants
    pub fn max_participants(mut self, max: usize) -> Self {
        self.max_participants = max;
        self
    }
}
