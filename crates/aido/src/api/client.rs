//! Typed client for the Aido backend endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::fetch::{ManualStore, ResourceFetcher};
use crate::pipeline::PipelineRunRequest;
use crate::status::SystemStatus;

/// Connect timeout for all requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall timeout for unary requests. The pipeline run stream is exempt:
/// a run has no client-side deadline.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response of `GET /manual/{doc_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ManualResponse {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub manual_docx_path: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Serialize)]
struct SaveManualRequest<'a> {
    content: &'a str,
}

/// HTTP client for the Aido backend. Cheap to clone; all clones share the
/// underlying connection pool.
#[derive(Debug, Clone)]
pub struct AidoClient {
    client: reqwest::Client,
    base_url: String,
}

impl AidoClient {
    /// Creates a client for the given backend base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn ensure_ok(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Starts a pipeline run and returns the raw event-stream response.
    /// The caller owns decoding; see the pipeline runner.
    pub async fn run_pipeline(
        &self,
        request: &PipelineRunRequest,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self
            .client
            .post(self.url("pipeline/run"))
            .json(request)
            .send()
            .await?;
        Self::ensure_ok(response).await
    }

    /// Persists edited manual content for a document.
    pub async fn save_manual(&self, doc_id: &str, content: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .put(self.url(&format!("manual/{doc_id}")))
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .json(&SaveManualRequest { content })
            .send()
            .await?;
        Self::ensure_ok(response).await?;
        Ok(())
    }

    /// Regenerates a DOCX artifact from manual text.
    pub async fn convert_docx(&self, content: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .post(self.url("convert/docx"))
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .json(&SaveManualRequest { content })
            .send()
            .await?;
        let response = Self::ensure_ok(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Retrieves the backend liveness snapshot.
    pub async fn system_status(&self) -> Result<SystemStatus, ApiError> {
        let response = self
            .client
            .get(self.url("system/status"))
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .send()
            .await?;
        let response = Self::ensure_ok(response).await?;
        Ok(response.json().await?)
    }

    async fn get_resource(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        let response = self
            .client
            .get(self.url(path))
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .send()
            .await?;
        Self::ensure_ok(response).await
    }
}

#[async_trait]
impl ResourceFetcher for AidoClient {
    async fn fetch_text(&self, path: &str) -> Result<String, ApiError> {
        let response = self.get_resource(path).await?;
        Ok(response.text().await?)
    }

    async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.get_resource(path).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_manual(&self, doc_id: &str) -> Result<ManualResponse, ApiError> {
        let response = self.get_resource(&format!("manual/{doc_id}")).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ManualStore for AidoClient {
    async fn save_manual(&self, doc_id: &str, content: &str) -> Result<(), ApiError> {
        AidoClient::save_manual(self, doc_id, content).await
    }

    async fn convert_docx(&self, content: &str) -> Result<Vec<u8>, ApiError> {
        AidoClient::convert_docx(self, content).await
    }

    async fn fetch_artifact(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        self.fetch_bytes(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = AidoClient::new("http://localhost:8000/").unwrap();
        assert_eq!(
            client.url("/pipeline/run"),
            "http://localhost:8000/pipeline/run"
        );
        assert_eq!(
            client.url("manual/abc"),
            "http://localhost:8000/manual/abc"
        );
    }

    #[test]
    fn test_manual_response_tolerates_sparse_payload() {
        let manual: ManualResponse = serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        assert_eq!(manual.content, "hello");
        assert!(manual.manual_docx_path.is_none());
        assert!(manual.updated_at.is_none());
    }
}
