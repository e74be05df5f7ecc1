//! Statistics and metrics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::registry::BroadcastReport;

/// Relay-wide counters
///
/// Updated lock-free by sessions and publish handlers; read through
/// [`RelayStats::snapshot`].
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    sessions_opened: AtomicU64,
    sessions_active: AtomicU64,
    sessions_rejected: AtomicU64,
    messages_published: AtomicU64,
    deliveries: AtomicU64,
    dropped: AtomicU64,
    timed_out: AtomicU64,
    keepalives_sent: AtomicU64,
}

impl RelayStats {
    /// Create a zeroed stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            sessions_opened: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_rejected: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            keepalives_sent: AtomicU64::new(0),
        }
    }

    pub(crate) fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn session_closed(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn keepalive_sent(&self) {
        self.keepalives_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast(&self, report: &BroadcastReport) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        self.timed_out
            .fetch_add(report.timed_out as u64, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            sessions_rejected: self.sessions_rejected.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            keepalives_sent: self.keepalives_sent.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Time since the stats tracker was created
    #[serde(serialize_with = "serialize_secs")]
    pub uptime: Duration,
    /// Streams ever opened
    pub sessions_opened: u64,
    /// Streams currently open
    pub sessions_active: u64,
    /// Streams refused by a connection or registry limit
    pub sessions_rejected: u64,
    /// Broadcasts performed
    pub messages_published: u64,
    /// Successful mailbox handoffs
    pub deliveries: u64,
    /// Messages dropped by full buffered mailboxes
    pub dropped: u64,
    /// Handoffs abandoned after the timeout
    pub timed_out: u64,
    /// Keepalive frames written
    pub keepalives_sent: u64,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = RelayStats::new().snapshot();
        assert_eq!(stats.sessions_opened, 0);
        assert_eq!(stats.sessions_active, 0);
        assert_eq!(stats.messages_published, 0);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.keepalives_sent, 0);
    }

    #[test]
    fn test_session_counters() {
        let stats = RelayStats::new();
        stats.session_opened();
        stats.session_opened();
        stats.session_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.sessions_opened, 2);
        assert_eq!(snap.sessions_active, 1);
    }

    #[test]
    fn test_record_broadcast() {
        let stats = RelayStats::new();
        let report = BroadcastReport {
            recipients: 4,
            delivered: 2,
            dropped: 1,
            timed_out: 1,
            closed: 0,
        };
        stats.record_broadcast(&report);

        let snap = stats.snapshot();
        assert_eq!(snap.messages_published, 1);
        assert_eq!(snap.deliveries, 2);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.timed_out, 1);
    }
}
