//! Run status: the reported stage, progress, and the bounded activity log.

use std::collections::VecDeque;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::event::PipelineEvent;

/// Maximum number of retained activity log lines.
pub const LOG_CAPACITY: usize = 10;

const MSG_CONNECTING: &str = "Opening connection to the pipeline...";
const MSG_INITIALIZED: &str = "Pipeline initialized.";
const MSG_RUN_COMPLETED: &str = "Pipeline run finished successfully.";
const MSG_DEFAULT_ERROR: &str = "Pipeline reported an error.";
const MSG_TRANSPORT_LOST: &str = "CRITICAL: connection to the pipeline was lost.";

/// Processing stage reported by the server.
///
/// The server is authoritative for ordering: the client mirrors whatever
/// stage a `progress` event names and never infers transitions on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "TRANSCRIPTION")]
    Transcription,
    #[serde(rename = "STRUCTURING")]
    Structuring,
    #[serde(rename = "MASTERING")]
    Mastering,
    #[serde(rename = "JSON_CONVERTER")]
    JsonConverter,
    #[serde(rename = "WRITER")]
    Writer,
    #[serde(rename = "completed")]
    Completed,
}

impl PipelineStage {
    /// True while a run is underway, neither idle nor finished.
    pub fn is_active(&self) -> bool {
        !matches!(self, PipelineStage::Idle | PipelineStage::Completed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::Idle => "Idle",
            PipelineStage::Transcription => "Transcription",
            PipelineStage::Structuring => "Structuring",
            PipelineStage::Mastering => "Mastering",
            PipelineStage::JsonConverter => "JSON conversion",
            PipelineStage::Writer => "Document writing",
            PipelineStage::Completed => "Completed",
        };
        write!(f, "{label}")
    }
}

/// Bounded, append-only log of the most recent pipeline activity.
///
/// Each line is stamped with the local wall-clock time at append. Oldest
/// lines are evicted beyond [`LOG_CAPACITY`].
#[derive(Debug, Clone, Default)]
pub struct LogRing {
    entries: VecDeque<String>,
}

impl LogRing {
    pub fn push(&mut self, message: &str) {
        if self.entries.len() == LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries
            .push_back(format!("[{}] {}", Utc::now().format("%H:%M:%S"), message));
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// What the caller must do after an event has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Keep consuming the stream.
    Continue,
    /// Explicit `error` event: the document must be marked failed.
    DocumentError,
    /// Terminal `complete` event: the payload must be reconciled.
    Completed,
}

/// Status of the active run. One per workspace session.
///
/// `apply` is a pure state transition with no I/O; callers act on the
/// returned [`EventOutcome`].
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub stage: PipelineStage,
    pub progress: f64,
    pub logs: LogRing,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self {
            stage: PipelineStage::Idle,
            progress: 0.0,
            logs: LogRing::default(),
        }
    }
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets for a fresh run. A new run enters the first stage directly
    /// and never transitions through `Idle`.
    pub fn begin_run(&mut self) {
        self.stage = PipelineStage::Transcription;
        self.progress = 0.0;
        self.logs.clear();
        self.logs.push(MSG_CONNECTING);
    }

    /// Applies one decoded event.
    pub fn apply(&mut self, event: &PipelineEvent) -> EventOutcome {
        match event {
            PipelineEvent::Init { log } => {
                self.logs.push(log.as_deref().unwrap_or(MSG_INITIALIZED));
                EventOutcome::Continue
            }
            PipelineEvent::Progress(payload) => {
                // No clamping or smoothing; the server value stands.
                self.stage = payload.stage;
                self.progress = payload.progress;
                if let Some(log) = &payload.log {
                    self.logs.push(log);
                }
                EventOutcome::Continue
            }
            PipelineEvent::Error { message } => {
                self.logs.push(message.as_deref().unwrap_or(MSG_DEFAULT_ERROR));
                self.stage = PipelineStage::Idle;
                EventOutcome::DocumentError
            }
            PipelineEvent::Complete(_) => {
                self.stage = PipelineStage::Completed;
                self.logs.push(MSG_RUN_COMPLETED);
                EventOutcome::Completed
            }
        }
    }

    /// Records a transport-level failure: back to idle with a critical log
    /// line. Unlike an explicit `error` event this does not decide document
    /// status; only the server gets to mark a document failed.
    pub fn transport_failure(&mut self) {
        self.logs.push(MSG_TRANSPORT_LOST);
        self.stage = PipelineStage::Idle;
    }
}
