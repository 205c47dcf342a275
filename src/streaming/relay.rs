//! Outbound relay: drives one upstream body through the frame reassembler
//! and token filter, and publishes surviving tokens to a bounded channel.
//!
//! A session suspends only while waiting for the next upstream chunk or for
//! room in the outbound channel. Everything between those two points is
//! synchronous and owned by the session.

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::config::RelaySettings;
use crate::error::{RelayError, Result};
use crate::provider::ProviderStream;
use crate::streaming::frame::{EventRecord, FrameReassembler};
use crate::streaming::token::{TokenFilter, extract_token};

/// Consumer side of a spawned relay
pub type RelayReceiver = ReceiverStream<Result<Bytes>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    ClosedOk,
    ClosedError,
}

/// Result of pushing one raw chunk through a session
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    /// Encoded tokens to publish, in arrival order
    pub forwarded: Vec<Bytes>,
    /// Terminal failure hit after `forwarded` was produced
    pub error: Option<RelayError>,
}

/// How a spawned relay ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed { tokens_forwarded: usize },
    Failed { reason: String },
    ConsumerGone { tokens_forwarded: usize },
}

/// Per-request relay state: one pending buffer, one filter, no sharing
pub struct RelaySession {
    id: Uuid,
    frames: FrameReassembler,
    filter: TokenFilter,
    state: SessionState,
    bytes_received: usize,
}

impl RelaySession {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            frames: FrameReassembler::new(settings.max_pending_bytes),
            filter: TokenFilter::new(),
            state: SessionState::Open,
            bytes_received: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn tokens_forwarded(&self) -> usize {
        self.filter.accepted()
    }

    /// Reassemble, decode and filter one raw chunk.
    ///
    /// Once the session is closed, chunks are discarded.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> ChunkOutcome {
        let mut outcome = ChunkOutcome::default();
        if self.state != SessionState::Open {
            debug!(bytes = chunk.len(), "Discarding chunk for closed session");
            return outcome;
        }

        self.bytes_received += chunk.len();
        debug!(
            bytes = chunk.len(),
            total = self.bytes_received,
            "Upstream chunk received"
        );

        let batch = self.frames.feed(chunk);

        for record in batch.records {
            match record {
                EventRecord::Data(payload) => match extract_token(&payload) {
                    Ok(token) => {
                        if let Some(token) = self.filter.accept(token) {
                            outcome.forwarded.push(Bytes::from(token));
                        }
                    }
                    Err(e) => {
                        self.state = SessionState::ClosedError;
                        outcome.error = Some(e);
                        return outcome;
                    }
                },
                EventRecord::Sentinel => {
                    self.state = SessionState::ClosedOk;
                    return outcome;
                }
            }
        }

        if let Some(e) = batch.error {
            self.state = SessionState::ClosedError;
            outcome.error = Some(e);
        }

        outcome
    }

    /// The upstream body ended. Without a prior sentinel this is a dropped
    /// connection.
    pub fn finish_upstream(&mut self) -> Option<RelayError> {
        if self.state != SessionState::Open {
            return None;
        }

        self.state = SessionState::ClosedError;
        Some(RelayError::UpstreamError(format!(
            "stream ended before [DONE] ({} bytes pending)",
            self.frames.pending_len()
        )))
    }

    /// Record a failure reported by the upstream stream itself
    pub fn fail(&mut self) {
        if self.state == SessionState::Open {
            self.state = SessionState::ClosedError;
        }
    }
}

/// Spawn a relay task for one upstream body.
///
/// The returned receiver yields encoded tokens and ends after the sentinel,
/// or yields one `Err` and ends when the session fails. Dropping the
/// receiver cancels the task, which drops the upstream body.
pub fn spawn_relay(
    upstream: ProviderStream,
    settings: RelaySettings,
) -> (RelayReceiver, JoinHandle<RelayOutcome>) {
    let (tx, rx) = mpsc::channel(settings.channel_capacity.max(1));
    let session = RelaySession::new(settings);
    let span = tracing::info_span!("relay_session", session_id = %session.id());

    let handle = tokio::spawn(run_relay(session, upstream, tx).instrument(span));
    (ReceiverStream::new(rx), handle)
}

/// Drive a session to completion, publishing into `tx`
pub async fn run_relay(
    mut session: RelaySession,
    mut upstream: ProviderStream,
    tx: mpsc::Sender<Result<Bytes>>,
) -> RelayOutcome {
    info!("Relay session opened");

    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => return consumer_gone(&session),
            next = upstream.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => {
                session.fail();
                return publish_error(&tx, e).await;
            }
            None => match session.finish_upstream() {
                Some(e) => return publish_error(&tx, e).await,
                None => return completed(&session),
            },
        };

        let outcome = session.process_chunk(&chunk);

        for bytes in outcome.forwarded {
            // Wait for room before publishing; never buffer past the channel
            let Ok(permit) = tx.reserve().await else {
                return consumer_gone(&session);
            };
            permit.send(Ok(bytes));
        }

        if let Some(e) = outcome.error {
            return publish_error(&tx, e).await;
        }

        if session.state() == SessionState::ClosedOk {
            return completed(&session);
        }
    }
}

/// Wait for a spawned relay and report how it ended.
///
/// The relay logs its own lifecycle; this catches a task that panicked or
/// was aborted, which it cannot report itself.
pub async fn watch_relay(handle: JoinHandle<RelayOutcome>) -> Option<RelayOutcome> {
    match handle.await {
        Ok(outcome) => {
            debug!(?outcome, "Relay task finished");
            Some(outcome)
        }
        Err(e) => {
            error!("Relay task did not finish: {}", e);
            None
        }
    }
}

fn completed(session: &RelaySession) -> RelayOutcome {
    info!(
        tokens_forwarded = session.tokens_forwarded(),
        "Relay session closed at [DONE]"
    );
    RelayOutcome::Completed {
        tokens_forwarded: session.tokens_forwarded(),
    }
}

fn consumer_gone(session: &RelaySession) -> RelayOutcome {
    warn!(
        tokens_forwarded = session.tokens_forwarded(),
        "Consumer disconnected, cancelling upstream"
    );
    RelayOutcome::ConsumerGone {
        tokens_forwarded: session.tokens_forwarded(),
    }
}

async fn publish_error(tx: &mpsc::Sender<Result<Bytes>>, e: RelayError) -> RelayOutcome {
    let reason = e.to_string();
    error!("Relay session failed: {}", reason);
    if tx.send(Err(e)).await.is_err() {
        debug!("Consumer already gone, error not delivered");
    }
    RelayOutcome::Failed { reason }
}
