//! Typed lifecycle events parsed from decoded frames.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::error::DecodeError;
use super::state::PipelineStage;
use crate::stream::Frame;

/// Payload of a `progress` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressPayload {
    pub stage: PipelineStage,
    /// Percentage in 0..=100, mirrored verbatim from the server.
    pub progress: f64,
    #[serde(default)]
    pub log: Option<String>,
}

/// Payload of a terminal `complete` frame.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletePayload {
    #[serde(default)]
    pub manual_content: String,
    #[serde(default)]
    pub manual_docx_path: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One lifecycle event of a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Init { log: Option<String> },
    Progress(ProgressPayload),
    Error { message: Option<String> },
    Complete(CompletePayload),
}

impl PipelineEvent {
    /// Parses a decoded frame into a typed event.
    ///
    /// Returns `Ok(None)` for event names this client does not know, so the
    /// stream keeps going when the server adds new event types. A payload
    /// that is not valid JSON for a known event is a contract violation and
    /// fails the run.
    pub fn from_frame(frame: &Frame) -> Result<Option<Self>, DecodeError> {
        let event = match frame.event.as_str() {
            "init" => {
                // The init payload is either a bare string or an object
                // with a `log` field.
                let value: serde_json::Value = parse_payload(frame)?;
                Self::Init {
                    log: init_log(&value),
                }
            }
            "progress" => Self::Progress(parse_payload(frame)?),
            "error" => {
                #[derive(Deserialize)]
                struct ErrorPayload {
                    #[serde(default)]
                    message: Option<String>,
                }
                let payload: ErrorPayload = parse_payload(frame)?;
                Self::Error {
                    message: payload.message,
                }
            }
            "complete" => Self::Complete(parse_payload(frame)?),
            other => {
                debug!(event = other, "Skipping unknown event type");
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}

fn parse_payload<T: DeserializeOwned>(frame: &Frame) -> Result<T, DecodeError> {
    serde_json::from_str(&frame.data).map_err(|source| DecodeError::InvalidPayload {
        event: frame.event.clone(),
        source,
    })
}

fn init_log(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        other => other
            .get("log")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    }
}
