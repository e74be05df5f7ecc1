//! Participant identifiers and broadcast messages
//!
//! This module defines the key type for identifying stream participants and
//! the message value that is handed to their mailboxes.

use std::sync::Arc;

/// Opaque per-connection identifier for one stream participant
///
/// Not a verified identity: it is assigned per request by the server and only
/// distinguishes concurrent connections from one another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create an identifier from an arbitrary token
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create an identifier from a per-connection sequence number
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("req-{:06}", seq))
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A message to be broadcast to every registered participant
///
/// Cheap to clone: both fields are reference counted, so every recipient of a
/// broadcast shares the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    from: Arc<str>,
    content: Arc<str>,
}

impl Message {
    /// Create a new message
    pub fn new(from: impl AsRef<str>, content: impl AsRef<str>) -> Self {
        Self {
            from: Arc::from(from.as_ref()),
            content: Arc::from(content.as_ref()),
        }
    }

    /// Sender display label
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Message body
    pub fn content(&self) -> &str {
        &self.content
    }
}
