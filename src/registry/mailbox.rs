//! Per-participant mailbox
//!
//! A mailbox is split in two halves: the [`Mailbox`] sender stays in the
//! registry and is cloned into every broadcast snapshot, while the
//! [`MailboxReceiver`] is owned by exactly one stream session.
//!
//! How a broadcast hands a message over is governed by [`HandoffPolicy`].
//! The rendezvous policies attach a one-shot "taken" signal to each message;
//! the broadcaster waits on it, and the receiver fires it when the session
//! picks the message up. A message whose broadcaster already gave up is
//! discarded by the receiver instead of being rendered late.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::message::Message;

/// How a broadcast hands a message to a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffPolicy {
    /// Single-slot rendezvous. The broadcaster waits, without bound, until the
    /// owning session has taken the message.
    Synchronous,
    /// Single-slot rendezvous abandoned after the given duration.
    Timeout(Duration),
    /// Bounded queue. The broadcaster never waits; a full queue drops the
    /// newest message.
    Buffered {
        /// Queue depth per mailbox
        capacity: usize,
    },
}

impl HandoffPolicy {
    fn channel_capacity(&self) -> usize {
        match self {
            HandoffPolicy::Buffered { capacity } => (*capacity).max(1),
            HandoffPolicy::Synchronous | HandoffPolicy::Timeout(_) => 1,
        }
    }
}

/// Result of handing one message to one mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryOutcome {
    /// The session took the message (or it was queued, for buffered mailboxes)
    Delivered,
    /// Buffered mailbox was full; the message was dropped
    Dropped,
    /// The session did not take the message within the handoff timeout
    TimedOut,
    /// The owning session has terminated
    Closed,
}

struct Envelope {
    message: Message,
    taken: Option<oneshot::Sender<()>>,
}

/// Sending half of a participant mailbox
#[derive(Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<Envelope>,
    policy: HandoffPolicy,
}

/// Receiving half of a participant mailbox, owned by one stream session
pub struct MailboxReceiver {
    rx: mpsc::Receiver<Envelope>,
}

/// Create a connected mailbox pair
pub fn mailbox(policy: HandoffPolicy) -> (Mailbox, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(policy.channel_capacity());
    (Mailbox { tx, policy }, MailboxReceiver { rx })
}

impl Mailbox {
    /// Hand a message to the owning session according to the handoff policy
    pub async fn deliver(&self, message: Message) -> DeliveryOutcome {
        match self.policy {
            HandoffPolicy::Synchronous => self.rendezvous(message).await,
            HandoffPolicy::Timeout(limit) => {
                match tokio::time::timeout(limit, self.rendezvous(message)).await {
                    Ok(outcome) => outcome,
                    Err(_) => DeliveryOutcome::TimedOut,
                }
            }
            HandoffPolicy::Buffered { .. } => {
                let envelope = Envelope {
                    message,
                    taken: None,
                };
                match self.tx.try_send(envelope) {
                    Ok(()) => DeliveryOutcome::Delivered,
                    Err(mpsc::error::TrySendError::Full(_)) => DeliveryOutcome::Dropped,
                    Err(mpsc::error::TrySendError::Closed(_)) => DeliveryOutcome::Closed,
                }
            }
        }
    }

    async fn rendezvous(&self, message: Message) -> DeliveryOutcome {
        let (taken_tx, taken_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            taken: Some(taken_tx),
        };

        if self.tx.send(envelope).await.is_err() {
            return DeliveryOutcome::Closed;
        }

        // The receiver drops the signal unfired only when it shuts down
        match taken_rx.await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(_) => DeliveryOutcome::Closed,
        }
    }

    /// Get the handoff policy
    pub fn policy(&self) -> HandoffPolicy {
        self.policy
    }

    /// Check if the receiving session has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl MailboxReceiver {
    /// Wait for the next message
    ///
    /// Returns `None` once every sending handle is gone, which happens when
    /// the registry entry has been removed or replaced. Cancel safe.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            let envelope = self.rx.recv().await?;

            match envelope.taken {
                None => return Some(envelope.message),
                Some(taken) => {
                    if taken.send(()).is_ok() {
                        return Some(envelope.message);
                    }
                    // Broadcaster gave up on this handoff; skip it
                }
            }
        }
    }
}
