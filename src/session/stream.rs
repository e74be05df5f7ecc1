//! Per-connection stream session
//!
//! A session owns one participant's registration for the lifetime of one
//! long-lived connection. It waits on its mailbox, a keepalive timer, server
//! shutdown and the peer going away, and writes one SSE frame per event into
//! the connection's output channel.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::frame::Frame;
use super::state::{SessionState, TerminationReason};
use crate::error;
use crate::registry::{MailboxReceiver, ParticipantId, Registration, Registry};
use crate::stats::RelayStats;

/// Default idle interval between keepalive frames
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Sending side of a connection's response body
pub type FrameSink = mpsc::Sender<Result<Bytes, std::io::Error>>;

/// Receiving side of a connection's response body
pub type FrameStream = ReceiverStream<Result<Bytes, std::io::Error>>;

/// Create the channel that carries frames from a session to the HTTP body
///
/// Each item becomes one body chunk, written to the socket as soon as the
/// body is polled.
pub fn output_channel(capacity: usize) -> (FrameSink, FrameStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ReceiverStream::new(rx))
}

/// Final accounting for a finished session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Participant the session streamed for
    pub participant: ParticipantId,
    /// Why the loop exited
    pub reason: TerminationReason,
    /// Delivery frames written
    pub deliveries: u64,
    /// Keepalive frames written
    pub keepalives: u64,
    /// Lifetime of the session
    pub duration: Duration,
}

/// Stream session for one connection
pub struct StreamSession {
    registration: Registration,
    mailbox: MailboxReceiver,
    output: FrameSink,
    shutdown: CancellationToken,
    keepalive_interval: Duration,
    stats: Option<Arc<RelayStats>>,
    state: SessionState,
}

impl StreamSession {
    /// Register `id` and prepare a session writing to `output`
    ///
    /// Fails only when the registry refuses the registration.
    pub fn open(
        registry: &Arc<Registry>,
        id: ParticipantId,
        output: FrameSink,
        shutdown: CancellationToken,
    ) -> error::Result<Self> {
        let (registration, mailbox) = registry.register(id)?;

        Ok(Self {
            registration,
            mailbox,
            output,
            shutdown,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            stats: None,
            state: SessionState::new(),
        })
    }

    /// Set the keepalive interval
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Report counters into shared relay stats
    pub fn with_stats(mut self, stats: Arc<RelayStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Participant this session streams for
    pub fn participant(&self) -> &ParticipantId {
        self.registration.id()
    }

    /// Run the session until the peer leaves, the server shuts down or the
    /// identifier is taken over
    ///
    /// The registration is released before this returns.
    pub async fn run(mut self) -> SessionSummary {
        self.state.activate();
        let active = self.stats.clone().map(ActiveSession::enter);

        tracing::info!(participant = %self.participant(), "Stream session started");

        let period = self.keepalive_interval;
        let mut keepalive = time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break TerminationReason::Shutdown,

                _ = self.output.closed() => break TerminationReason::PeerClosed,

                received = self.mailbox.recv() => {
                    let Some(message) = received else {
                        break self.closed_reason();
                    };

                    if let Err(reason) = self.emit(Frame::Delivery(message)).await {
                        break reason;
                    }
                    self.state.deliveries += 1;
                    keepalive.reset();
                }

                _ = keepalive.tick() => {
                    if let Err(reason) = self.emit(Frame::Keepalive).await {
                        break reason;
                    }
                    self.state.keepalives += 1;
                    if let Some(stats) = &self.stats {
                        stats.keepalive_sent();
                    }
                }
            }
        };

        self.state.terminate();

        let summary = SessionSummary {
            participant: self.registration.id().clone(),
            reason,
            deliveries: self.state.deliveries,
            keepalives: self.state.keepalives,
            duration: self.state.duration(),
        };

        drop(self.registration);
        drop(active);

        tracing::info!(
            participant = %summary.participant,
            reason = ?summary.reason,
            deliveries = summary.deliveries,
            keepalives = summary.keepalives,
            duration_ms = summary.duration.as_millis() as u64,
            "Stream session terminated"
        );

        summary
    }

    /// Tell a replacement apart from a plain removal once the mailbox closes
    fn closed_reason(&self) -> TerminationReason {
        if self.registration.is_superseded() {
            TerminationReason::Superseded
        } else {
            TerminationReason::Removed
        }
    }

    /// Write one frame to the peer
    ///
    /// A closed output means the peer is gone. Shutdown interrupts a write
    /// stuck behind a full output buffer.
    async fn emit(&mut self, frame: Frame) -> Result<(), TerminationReason> {
        let bytes = frame.encode();

        tokio::select! {
            biased;

            _ = self.shutdown.cancelled() => Err(TerminationReason::Shutdown),

            sent = self.output.send(Ok(bytes)) => {
                sent.map_err(|_| TerminationReason::PeerClosed)?;
                tracing::debug!(
                    participant = %self.registration.id(),
                    event = frame.event(),
                    "Frame written"
                );
                Ok(())
            }
        }
    }
}

/// Counts a session as active until dropped, whichever way `run` exits
struct ActiveSession(Arc<RelayStats>);

impl ActiveSession {
    fn enter(stats: Arc<RelayStats>) -> Self {
        stats.session_opened();
        Self(stats)
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.session_closed();
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use super::*;
    use crate::error::Error;
    use crate::registry::{HandoffPolicy, Message, RegistryConfig, RegistryError};

    fn sync_registry() -> Arc<Registry> {
        Arc::new(Registry::with_config(
            RegistryConfig::default().handoff(HandoffPolicy::Synchronous),
        ))
    }

    async fn next_frame(stream: &mut FrameStream) -> Bytes {
        stream.next().await.unwrap().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_sends_keepalives() {
        let registry = sync_registry();
        let (sink, mut stream) = output_channel(8);
        let session = StreamSession::open(
            &registry,
            ParticipantId::new("alice"),
            sink,
            CancellationToken::new(),
        )
        .unwrap();

        let handle = tokio::spawn(session.run());

        for _ in 0..2 {
            let frame = next_frame(&mut stream).await;
            assert_eq!(frame, Frame::Keepalive.encode());
        }

        drop(stream);
        let summary = handle.await.unwrap();

        assert_eq!(summary.reason, TerminationReason::PeerClosed);
        assert_eq!(summary.deliveries, 0);
        assert!(summary.keepalives >= 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_delivers_broadcast() {
        let registry = sync_registry();
        let (sink, mut stream) = output_channel(8);
        let session = StreamSession::open(
            &registry,
            ParticipantId::new("alice"),
            sink,
            CancellationToken::new(),
        )
        .unwrap()
        .keepalive_interval(Duration::from_secs(60));

        let handle = tokio::spawn(session.run());

        let report = registry.broadcast(Message::new("bob", "hi")).await;
        assert_eq!(report.delivered, 1);

        let frame = next_frame(&mut stream).await;
        assert_eq!(
            frame,
            Bytes::from_static(b"event: message\ndata: <li><b>bob</b>hi</li>\n\n")
        );

        drop(stream);
        let summary = handle.await.unwrap();
        assert_eq!(summary.deliveries, 1);
    }

    #[tokio::test]
    async fn test_shutdown_deregisters() {
        let registry = sync_registry();
        let shutdown = CancellationToken::new();
        let (sink, _stream) = output_channel(8);
        let session =
            StreamSession::open(&registry, ParticipantId::new("alice"), sink, shutdown.clone())
                .unwrap();

        assert!(registry.contains(&ParticipantId::new("alice")));

        let handle = tokio::spawn(session.run());
        shutdown.cancel();

        let summary = handle.await.unwrap();
        assert_eq!(summary.reason, TerminationReason::Shutdown);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_superseded_session_leaves_successor_registered() {
        let registry = sync_registry();
        let id = ParticipantId::new("alice");

        let (first_sink, _first_stream) = output_channel(8);
        let first =
            StreamSession::open(&registry, id.clone(), first_sink, CancellationToken::new())
                .unwrap();
        let handle = tokio::spawn(first.run());

        let (second_sink, _second_stream) = output_channel(8);
        let _second =
            StreamSession::open(&registry, id.clone(), second_sink, CancellationToken::new())
                .unwrap();

        let summary = handle.await.unwrap();
        assert_eq!(summary.reason, TerminationReason::Superseded);
        assert!(registry.contains(&id));
    }

    #[tokio::test]
    async fn test_deregistered_session_reports_removal() {
        let registry = sync_registry();
        let id = ParticipantId::new("alice");
        let (sink, _stream) = output_channel(8);
        let session =
            StreamSession::open(&registry, id.clone(), sink, CancellationToken::new()).unwrap();

        let handle = tokio::spawn(session.run());
        assert!(registry.deregister(&id));

        let summary = handle.await.unwrap();
        assert_eq!(summary.reason, TerminationReason::Removed);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_aborted_session_deregisters() {
        let registry = sync_registry();
        let stats = Arc::new(RelayStats::new());
        let (sink, _stream) = output_channel(8);
        let session = StreamSession::open(
            &registry,
            ParticipantId::new("alice"),
            sink,
            CancellationToken::new(),
        )
        .unwrap()
        .with_stats(Arc::clone(&stats));

        let handle = tokio::spawn(session.run());

        // Let the loop start before aborting it
        tokio::task::yield_now().await;
        assert_eq!(stats.snapshot().sessions_active, 1);

        handle.abort();
        let _ = handle.await;

        assert!(registry.is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.sessions_opened, 1);
        assert_eq!(snap.sessions_active, 0);
    }

    #[tokio::test]
    async fn test_open_fails_when_registry_full() {
        let registry = Arc::new(Registry::with_config(
            RegistryConfig::default().max_participants(1),
        ));

        let (sink, _stream) = output_channel(8);
        let _first = StreamSession::open(
            &registry,
            ParticipantId::new("alice"),
            sink,
            CancellationToken::new(),
        )
        .unwrap();

        let (sink, _stream) = output_channel(8);
        let result = StreamSession::open(
            &registry,
            ParticipantId::new("bob"),
            sink,
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(Error::Registry(RegistryError::Full(1)))));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_stats_track_session() {
        let registry = sync_registry();
        let stats = Arc::new(RelayStats::new());
        let (sink, stream) = output_channel(8);
        let session = StreamSession::open(
            &registry,
            ParticipantId::new("alice"),
            sink,
            CancellationToken::new(),
        )
        .unwrap()
        .with_stats(Arc::clone(&stats));

        drop(stream);
        session.run().await;

        let snap = stats.snapshot();
        assert_eq!(snap.sessions_opened, 1);
        assert_eq!(snap.sessions_active, 0);
    }
}
