//! Participant registry implementation
//!
//! The central directory that maps every streaming participant to its
//! mailbox and fans published messages out to all of them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinSet;

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::mailbox::{mailbox, DeliveryOutcome, Mailbox, MailboxReceiver};
use super::message::{Message, ParticipantId};

struct Slot {
    mailbox: Mailbox,
    generation: u64,
}

/// Central registry for all streaming participants
///
/// Every structural change and the broadcast snapshot go through one
/// `RwLock`. The lock is never held across an await point: a broadcast copies
/// the mailbox handles out and delivers after releasing it, so a stalled
/// recipient can never block registration or deregistration.
pub struct Registry {
    /// Map of participant to the sending half of its mailbox
    mailboxes: RwLock<HashMap<ParticipantId, Slot>>,

    /// Source of registration generations
    next_generation: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl Registry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a participant and create its mailbox
    ///
    /// If `id` is already registered, the previous mailbox is replaced: its
    /// session sees the mailbox close and terminates, and its registration
    /// guard no longer owns the entry.
    pub fn register(
        self: &Arc<Self>,
        id: ParticipantId,
    ) -> Result<(Registration, MailboxReceiver), RegistryError> {
        let (mailbox, receiver) = mailbox(self.config.handoff);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut mailboxes = self.mailboxes.write();

        let limit = self.config.max_participants;
        if limit > 0 && mailboxes.len() >= limit && !mailboxes.contains_key(&id) {
            tracing::warn!(participant = %id, limit = limit, "Registration rejected: registry full");
            return Err(RegistryError::Full(limit));
        }

        let previous = mailboxes.insert(
            id.clone(),
            Slot {
                mailbox,
                generation,
            },
        );

        if let Some(previous) = previous {
            tracing::warn!(
                participant = %id,
                replaced_generation = previous.generation,
                generation = generation,
                "Participant re-registered, previous mailbox replaced"
            );
        } else {
            tracing::info!(
                participant = %id,
                participants = mailboxes.len(),
                "Participant registered"
            );
        }

        let registration = Registration {
            registry: Arc::clone(self),
            id,
            generation,
        };

        Ok((registration, receiver))
    }

    /// Remove a participant's mailbox
    ///
    /// Returns `false` (and does nothing) if the participant is not registered.
    pub fn deregister(&self, id: &ParticipantId) -> bool {
        let removed = self.mailboxes.write().remove(id).is_some();

        if removed {
            tracing::info!(participant = %id, "Participant deregistered");
        }

        removed
    }

    /// Remove the entry only if it still belongs to the given registration
    fn release(&self, id: &ParticipantId, generation: u64) {
        let mut mailboxes = self.mailboxes.write();

        match mailboxes.get(id) {
            Some(slot) if slot.generation == generation => {
                mailboxes.remove(id);
                tracing::info!(
                    participant = %id,
                    participants = mailboxes.len(),
                    "Participant deregistered"
                );
            }
            Some(slot) => {
                tracing::debug!(
                    participant = %id,
                    expected = generation,
                    current = slot.generation,
                    "Stale registration released, entry left to its successor"
                );
            }
            None => {}
        }
    }

    /// Broadcast a message to every registered participant
    ///
    /// Recipients are those registered at the moment of the snapshot.
    /// Handoffs run concurrently, so one slow mailbox does not delay the
    /// others; the call returns once every handoff has settled.
    pub async fn broadcast(&self, message: Message) -> BroadcastReport {
        let recipients: Vec<(ParticipantId, Mailbox)> = self
            .mailboxes
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.mailbox.clone()))
            .collect();

        let mut report = BroadcastReport {
            recipients: recipients.len(),
            ..BroadcastReport::default()
        };

        if recipients.is_empty() {
            return report;
        }

        let mut deliveries = JoinSet::new();
        for (id, mailbox) in recipients {
            let message = message.clone();
            deliveries.spawn(async move {
                let outcome = mailbox.deliver(message).await;
                (id, outcome)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((id, outcome)) => {
                    match outcome {
                        DeliveryOutcome::Delivered => {
                            tracing::trace!(participant = %id, "Message handed off");
                        }
                        DeliveryOutcome::Closed => {
                            tracing::debug!(participant = %id, "Recipient gone before handoff");
                        }
                        DeliveryOutcome::Dropped | DeliveryOutcome::TimedOut => {
                            tracing::warn!(
                                participant = %id,
                                outcome = ?outcome,
                                "Message not delivered to slow recipient"
                            );
                        }
                    }
                    report.record(outcome);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Delivery task failed");
                    report.record(DeliveryOutcome::Closed);
                }
            }
        }

        tracing::debug!(
            from = message.from(),
            recipients = report.recipients,
            delivered = report.delivered,
            "Broadcast complete"
        );

        report
    }

    /// Check if a participant is registered
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.mailboxes.read().contains_key(id)
    }

    /// Get the number of registered participants
    pub fn len(&self) -> usize {
        self.mailboxes.read().len()
    }

    /// Check if no participant is registered
    pub fn is_empty(&self) -> bool {
        self.mailboxes.read().is_empty()
    }

    /// Get the identifiers of all registered participants
    pub fn participants(&self) -> Vec<ParticipantId> {
        self.mailboxes.read().keys().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped ownership of one registry entry
///
/// Dropping the guard removes the entry, so a session deregisters on every
/// exit path, including task abortion and panics. If the entry has since been
/// replaced by a newer registration, dropping leaves it untouched.
pub struct Registration {
    registry: Arc<Registry>,
    id: ParticipantId,
    generation: u64,
}

impl Registration {
    /// Participant this registration belongs to
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Check if this registration still owns the registry entry
    pub fn is_current(&self) -> bool {
        self.registry
            .mailboxes
            .read()
            .get(&self.id)
            .is_some_and(|slot| slot.generation == self.generation)
    }

    /// Check if a newer registration has taken over this entry
    pub fn is_superseded(&self) -> bool {
        self.registry
            .mailboxes
            .read()
            .get(&self.id)
            .is_some_and(|slot| slot.generation != self.generation)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.generation);
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Per-outcome counts for one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Participants in the snapshot
    pub recipients: usize,
    /// Handoffs accepted
    pub delivered: usize,
    /// Messages dropped by full buffered mailboxes
    pub dropped: usize,
    /// Handoffs abandoned after the timeout
    pub timed_out: usize,
    /// Recipients that terminated before the handoff
    pub closed: usize,
}

impl BroadcastReport {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Dropped => self.dropped += 1,
            DeliveryOutcome::TimedOut => self.timed_out += 1,
            DeliveryOutcome::Closed => self.closed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::super::mailbox::HandoffPolicy;
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[tokio::test]
    async fn test_register_and_drop() {
        let registry = Arc::new(Registry::new());

        let (registration, _rx) = registry.register(id("alice")).unwrap();
        assert!(registry.contains(&id("alice")));
        assert!(registration.is_current());

        drop(registration);
        assert!(!registry.contains(&id("alice")));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_registrations_remain() {
        let registry = Arc::new(Registry::new());

        let mut held = Vec::new();
        for name in ["a", "b", "c", "d", "e"] {
            held.push(registry.register(id(name)).unwrap());
        }

        // Release b and d
        held.remove(3);
        held.remove(1);

        let remaining: HashSet<_> = registry.participants().into_iter().collect();
        let expected: HashSet<_> = ["a", "c", "e"].into_iter().map(id).collect();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn test_deregister_absent_is_noop() {
        let registry = Registry::new();

        assert!(!registry.deregister(&id("nobody")));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_with_no_participants() {
        let registry = Registry::new();

        let report = registry.broadcast(Message::new("bob", "hi")).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_participant() {
        let registry = Arc::new(Registry::with_config(
            RegistryConfig::default().handoff(HandoffPolicy::Synchronous),
        ));

        let mut receivers = Vec::new();
        let mut registrations = Vec::new();
        for name in ["a", "b", "c"] {
            let (registration, rx) = registry.register(id(name)).unwrap();
            registrations.push(registration);
            receivers.push(rx);
        }

        let consumers: Vec<_> = receivers
            .into_iter()
            .map(|mut rx| tokio::spawn(async move { rx.recv().await }))
            .collect();

        let report = registry.broadcast(Message::new("bob", "hi")).await;
        assert_eq!(report.recipients, 3);
        assert_eq!(report.delivered, 3);

        for consumer in consumers {
            let msg = consumer.await.unwrap().unwrap();
            assert_eq!(msg.from(), "bob");
            assert_eq!(msg.content(), "hi");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_recipient_times_out() {
        let registry = Arc::new(Registry::with_config(
            RegistryConfig::default().handoff(HandoffPolicy::Timeout(Duration::from_millis(50))),
        ));

        let (_stalled, _stalled_rx) = registry.register(id("stalled")).unwrap();
        let (_live, mut live_rx) = registry.register(id("live")).unwrap();

        let consumer = tokio::spawn(async move { live_rx.recv().await });

        let report = registry.broadcast(Message::new("bob", "hi")).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.timed_out, 1);
        assert!(consumer.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reregistration_replaces_previous() {
        let registry = Arc::new(Registry::new());

        let (first, mut first_rx) = registry.register(id("alice")).unwrap();
        let (second, _second_rx) = registry.register(id("alice")).unwrap();

        assert!(!first.is_current());
        assert!(first.is_superseded());
        assert!(second.is_current());
        assert!(!second.is_superseded());
        assert_eq!(registry.len(), 1);

        // Previous mailbox is closed once its sender is gone
        assert!(first_rx.recv().await.is_none());

        // Stale guard must not remove the successor's entry
        drop(first);
        assert!(registry.contains(&id("alice")));

        drop(second);
        assert!(!registry.contains(&id("alice")));
    }

    #[tokio::test]
    async fn test_max_participants() {
        let registry = Arc::new(Registry::with_config(
            RegistryConfig::default().max_participants(1),
        ));

        let _held = registry.register(id("a")).unwrap();
        let result = registry.register(id("b"));
        assert!(matches!(result, Err(RegistryError::Full(1))));
    }

    #[tokio::test]
    async fn test_broadcast_to_departed_participant() {
        let registry = Arc::new(Registry::with_config(
            RegistryConfig::default().handoff(HandoffPolicy::Synchronous),
        ));

        let (registration, rx) = registry.register(id("alice")).unwrap();
        drop(rx);

        let report = registry.broadcast(Message::new("bob", "hi")).await;
        assert_eq!(report.closed, 1);

        drop(registration);
        let report = registry.broadcast(Message::new("bob", "again")).await;
        assert_eq!(report.recipients, 0);
    }
}
