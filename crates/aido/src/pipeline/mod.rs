//! Pipeline run tracking: typed events, run status, and the stream driver.

pub mod error;
pub mod event;
pub mod request;
pub mod runner;
pub mod state;

pub use error::{DecodeError, PipelineError};
pub use event::{CompletePayload, PipelineEvent, ProgressPayload};
pub use request::PipelineRunRequest;
pub use runner::{PipelineRunner, RunOutcome};
pub use state::{EventOutcome, LogRing, PipelineStage, PipelineStatus};
