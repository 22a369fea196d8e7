//! Errors that terminate a pipeline run on the client side.

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The run request or stream transport failed.
    #[error("Pipeline request failed: {0}")]
    Api(#[from] ApiError),

    /// A frame payload violated the event contract.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The stream closed before a `complete` or `error` event arrived.
    #[error("Event stream ended before a terminal event")]
    StreamEnded,
}

/// A known event carried a payload that is not valid JSON for its type.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid payload for '{event}' event: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}
