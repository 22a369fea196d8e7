//! Resource-fetch seam used by the reconciler and download coordinator.
//!
//! Implemented by [`AidoClient`](super::AidoClient) in production and by
//! in-memory stubs in tests, so artifact handling is testable without a
//! backend.

use async_trait::async_trait;

use super::client::ManualResponse;
use super::ApiError;

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetches a server-relative resource as UTF-8 text.
    async fn fetch_text(&self, path: &str) -> Result<String, ApiError>;

    /// Fetches a server-relative resource as raw bytes.
    async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError>;

    /// Fetches the stored manual representation of a document.
    async fn fetch_manual(&self, doc_id: &str) -> Result<ManualResponse, ApiError>;
}

/// Write-side backend seam used by workspace operations.
///
/// Splitting this from [`ResourceFetcher`] keeps the save and export flows
/// drivable from tests without a backend.
#[async_trait]
pub trait ManualStore: Send + Sync {
    /// Persists edited manual content for a document.
    async fn save_manual(&self, doc_id: &str, content: &str) -> Result<(), ApiError>;

    /// Regenerates a DOCX artifact from manual text.
    async fn convert_docx(&self, content: &str) -> Result<Vec<u8>, ApiError>;

    /// Fetches a stored artifact as raw bytes.
    async fn fetch_artifact(&self, path: &str) -> Result<Vec<u8>, ApiError>;
}
