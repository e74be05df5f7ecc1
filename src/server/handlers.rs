//! HTTP handlers for the relay endpoints
//!
//! - `GET /sse` opens a stream for a fresh participant
//! - `POST /send` broadcasts one message
//! - `GET /stats` returns a counter snapshot

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Form, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::registry::{Message, ParticipantId, Registry};
use crate::session::{output_channel, StreamSession};
use crate::stats::{RelayStats, StatsSnapshot};

const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct RelayState {
    pub(crate) registry: Arc<Registry>,
    pub(crate) stats: Arc<RelayStats>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) keepalive_interval: Duration,
    pub(crate) output_buffer: usize,
    pub(crate) stream_slots: Option<Arc<Semaphore>>,
    next_request_id: Arc<AtomicU64>,
}

impl RelayState {
    pub(crate) fn new(
        registry: Arc<Registry>,
        stats: Arc<RelayStats>,
        shutdown: CancellationToken,
        keepalive_interval: Duration,
        output_buffer: usize,
        max_connections: usize,
    ) -> Self {
        let stream_slots = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Self {
            registry,
            stats,
            shutdown,
            keepalive_interval,
            output_buffer,
            stream_slots,
            next_request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Assign an identifier to an incoming request
    fn next_participant_id(&self) -> ParticipantId {
        ParticipantId::from_sequence(self.next_request_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Open a server-to-client event stream
pub(crate) async fn open_stream(State(state): State<RelayState>) -> Result<Response, StatusCode> {
    // Check stream limit
    let permit = match &state.stream_slots {
        Some(slots) => match Arc::clone(slots).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!("Stream rejected: limit reached");
                state.stats.session_rejected();
                return Err(StatusCode::SERVICE_UNAVAILABLE);
            }
        },
        None => None,
    };

    let id = state.next_participant_id();
    let (sink, frames) = output_channel(state.output_buffer);

    let session = match StreamSession::open(
        &state.registry,
        id.clone(),
        sink,
        state.shutdown.child_token(),
    ) {
        Ok(session) => session
            .keepalive_interval(state.keepalive_interval)
            .with_stats(Arc::clone(&state.stats)),
        Err(e) => {
            tracing::warn!(participant = %id, error = %e, "Stream rejected");
            state.stats.session_rejected();
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    tokio::spawn(async move {
        let _permit = permit;
        session.run().await;
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-store")
        .header(header::CONNECTION, "keep-alive")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(X_ACCEL_BUFFERING, "no")
        .body(Body::from_stream(frames))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Form body of a publish request
#[derive(Debug, Deserialize)]
pub struct PublishForm {
    /// Sender label; the request's own identifier is used when absent
    #[serde(default)]
    pub name: Option<String>,
    /// Message body
    #[serde(default)]
    pub content: String,
}

/// Broadcast one message to every open stream
pub(crate) async fn publish(
    State(state): State<RelayState>,
    Form(form): Form<PublishForm>,
) -> StatusCode {
    let request_id = state.next_participant_id();
    let from = match form.name {
        Some(name) if !name.is_empty() => name,
        _ => request_id.to_string(),
    };

    let report = state
        .registry
        .broadcast(Message::new(&from, &form.content))
        .await;
    state.stats.record_broadcast(&report);

    tracing::info!(
        request = %request_id,
        from = %from,
        recipients = report.recipients,
        delivered = report.delivered,
        "Message published"
    );

    StatusCode::OK
}

/// Current relay counters
pub(crate) async fn stats(State(state): State<RelayState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
