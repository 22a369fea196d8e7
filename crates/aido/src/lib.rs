//! Client core for the Aido manual-generation pipeline.
//!
//! The backend runs long multi-stage generation jobs and reports them over
//! a line-framed event stream. This crate owns everything on the client
//! side of that wire: decoding frames, tracking run status, reconciling
//! finished artifacts into a workspace, keeping editable drafts, and
//! auto-downloading artifacts per user policy.
//!
//! Start with [`PipelineRunner::from_config`] to wire a runner and a
//! shared [`Workspace`] session, then drive runs with
//! [`PipelineRunner::run`].

pub mod api;
pub mod config;
pub mod document;
pub mod download;
pub mod draft;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod reconcile;
pub mod status;
pub mod stream;
pub mod workspace;

pub use api::{AidoClient, ApiError, ManualResponse, ManualStore, ResourceFetcher};
pub use config::{load_config, load_config_from_str, ClientConfig};
pub use document::{Document, DocumentRegistry, DocumentStatus, MediaKind};
pub use download::{
    ArtifactKind, AutoDownloadCoordinator, DownloadError, DownloadPolicy, DownloadRecords,
};
pub use draft::{DraftStore, ManualDraft};
pub use error::{AidoError, ConfigError, Result};
pub use pipeline::{
    CompletePayload, DecodeError, EventOutcome, PipelineError, PipelineEvent, PipelineRunRequest,
    PipelineRunner, PipelineStage, PipelineStatus, RunOutcome,
};
pub use reconcile::ArtifactReconciler;
pub use status::{spawn_status_monitor, NodeStatus, SystemStatus};
pub use stream::{Frame, FrameDecoder};
pub use workspace::{RunGeneration, SharedWorkspace, Workspace, WorkspaceClient};
