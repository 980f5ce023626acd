//! Folds the oracle's delta stream into the transcript, one snapshot per step.
//!
//! Phases: `Thinking` (placeholder shown), `Streaming` (one snapshot per text
//! fragment, in oracle order), then exactly one terminal `Done` or `Failed`.
//! The placeholder is relabelled in place on completion, never removed, so entry
//! indices stay stable. Dropping the snapshot stream abandons the oracle stream
//! and leaves the transcript as it was; nothing is persisted from here.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conversations::session::to_oracle_history;
use crate::conversations::types::MessageEntry;
use crate::llm::oracle::{ChatOracle, OracleError, OracleEvent};

/// Placeholder content while waiting for the oracle.
pub const THINKING_MARKER: &str = r#"<div class="parlor-status"><strong>Thinking</strong><span class="parlor-spinner"></span></div>"#;
/// Placeholder content once the answer is complete.
pub const THINK_DONE_MARKER: &str = r#"<div class="parlor-status"><strong>Thinking done ✔</strong></div>"#;
/// Placeholder content when the oracle failed.
pub const THINK_FAILED_MARKER: &str = r#"<div class="parlor-status parlor-error"><strong>Answer failed ✖</strong></div>"#;

/// Assembly phase a snapshot was taken in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    /// Placeholder appended, oracle not yet answering.
    Thinking,
    /// A text fragment was appended.
    Streaming,
    /// The oracle finished; the transcript is final.
    Done,
    /// The oracle failed; the transcript is frozen.
    Failed,
}

impl StreamPhase {
    /// Whether no snapshot follows this one.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Transcript state observed by the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    /// Phase the snapshot was taken in.
    pub phase: StreamPhase,
    /// Whole transcript at that point.
    pub transcript: Vec<MessageEntry>,
    /// Failure description, only for `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stream of transcript snapshots.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = TranscriptSnapshot> + Send>>;

fn snapshot(phase: StreamPhase, transcript: &[MessageEntry]) -> TranscriptSnapshot {
    TranscriptSnapshot {
        phase,
        transcript: transcript.to_vec(),
        error: None,
    }
}

/// Drives an oracle and assembles its answer into a transcript.
#[derive(Clone)]
pub struct StreamAssembler {
    oracle: Arc<dyn ChatOracle>,
}

impl StreamAssembler {
    /// Wrap an oracle.
    #[must_use]
    pub const fn new(oracle: Arc<dyn ChatOracle>) -> Self {
        Self { oracle }
    }

    /// Answer the last user message of `transcript`.
    ///
    /// Yields `N + 2` snapshots for `N` text fragments on success. Oracle errors,
    /// whether opening the stream or mid-way, end with a single `Failed` snapshot.
    #[must_use]
    pub fn run(&self, transcript: Vec<MessageEntry>) -> SnapshotStream {
        let oracle = Arc::clone(&self.oracle);

        Box::pin(stream! {
            let mut transcript = transcript;
            let placeholder = transcript.len();
            transcript.push(MessageEntry::thinking(THINKING_MARKER));
            yield snapshot(StreamPhase::Thinking, &transcript);

            let history = to_oracle_history(&transcript);
            transcript.push(MessageEntry::assistant(""));

            let mut failure: Option<OracleError> = None;
            match oracle.stream_chat(history).await {
                Ok(mut events) => {
                    while let Some(event) = events.next().await {
                        match event {
                            Ok(OracleEvent::TextDelta(delta)) => {
                                if let Some(last) = transcript.last_mut() {
                                    last.content.push_str(&delta);
                                }
                                yield snapshot(StreamPhase::Streaming, &transcript);
                            }
                            Ok(OracleEvent::Other(kind)) => debug!("Ignoring oracle event: {kind}"),
                            Err(err) => {
                                failure = Some(err);
                                break;
                            }
                        }
                    }
                }
                Err(err) => failure = Some(err),
            }

            match failure {
                None => {
                    transcript[placeholder].content = THINK_DONE_MARKER.to_string();
                    yield snapshot(StreamPhase::Done, &transcript);
                }
                Some(err) => {
                    warn!("Oracle stream failed: {err}");
                    transcript[placeholder].content = THINK_FAILED_MARKER.to_string();
                    yield TranscriptSnapshot {
                        phase: StreamPhase::Failed,
                        transcript: transcript.clone(),
                        error: Some(err.to_string()),
                    };
                }
            }
        })
    }
}
