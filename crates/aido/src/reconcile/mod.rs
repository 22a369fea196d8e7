//! Merges terminal pipeline output and stored manuals into workspace state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use tokio::task::JoinHandle;

use crate::api::ResourceFetcher;
use crate::document::DocumentStatus;
use crate::pipeline::CompletePayload;
use crate::workspace::SharedWorkspace;

/// Applies `complete` payloads and on-open manual fetches.
pub struct ArtifactReconciler {
    fetcher: Arc<dyn ResourceFetcher>,
    /// Delay before the secondary transcript fetch, giving the backend
    /// time to materialize the resource after the run ends.
    transcript_fetch_delay: Duration,
}

impl ArtifactReconciler {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, transcript_fetch_delay: Duration) -> Self {
        Self {
            fetcher,
            transcript_fetch_delay,
        }
    }

    /// Applies a terminal `complete` payload to the document and its draft.
    ///
    /// Server-terminal content wins: the draft is reseeded even over an
    /// unsaved local edit. When the payload names a transcript path, a
    /// single delayed fetch merges the text into the document; the returned
    /// handle resolves when that fetch settles, and dropping it detaches
    /// the task.
    pub async fn complete(
        &self,
        workspace: &SharedWorkspace,
        doc_id: &str,
        payload: &CompletePayload,
    ) -> Option<JoinHandle<()>> {
        {
            let mut ws = workspace.lock().await;
            match ws.documents.get_mut(doc_id) {
                Some(document) => {
                    document.status = DocumentStatus::Ready;
                    document.manual_content = Some(payload.manual_content.clone());
                    if let Some(path) = &payload.manual_docx_path {
                        document.manual_docx_path = Some(path.clone());
                    }
                    if let Some(path) = &payload.transcript_path {
                        document.transcript_path = Some(path.clone());
                    }
                }
                None => warn!("Complete event for unknown document {doc_id}"),
            }
            let updated_at = payload.updated_at.as_deref().and_then(parse_timestamp);
            ws.drafts
                .seed(doc_id, payload.manual_content.clone(), updated_at);
        }

        payload
            .transcript_path
            .as_ref()
            .map(|path| self.fetch_transcript_later(workspace.clone(), doc_id.to_string(), path.clone()))
    }

    /// Schedules the one-shot transcript fetch. Failure is logged, never
    /// retried, and never surfaced to the run outcome.
    fn fetch_transcript_later(
        &self,
        workspace: SharedWorkspace,
        doc_id: String,
        path: String,
    ) -> JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let delay = self.transcript_fetch_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match fetcher.fetch_text(&path).await {
                Ok(text) => {
                    let mut ws = workspace.lock().await;
                    if let Some(document) = ws.documents.get_mut(&doc_id) {
                        document.content = Some(text);
                    }
                }
                Err(e) => warn!("Transcript retrieval for document {doc_id} failed: {e}"),
            }
        })
    }

    /// Seeds the draft for an already-ready document on first open. A fetch
    /// failure is reported through the activity log; the document itself is
    /// left untouched.
    pub async fn open_existing(&self, workspace: &SharedWorkspace, doc_id: &str) {
        if workspace.lock().await.drafts.contains(doc_id) {
            return;
        }
        match self.fetcher.fetch_manual(doc_id).await {
            Ok(manual) => {
                let mut ws = workspace.lock().await;
                // An edit may have landed while the fetch was in flight;
                // the newer local work wins over the stored copy.
                if ws.drafts.contains(doc_id) {
                    return;
                }
                let updated_at = manual.updated_at.as_deref().and_then(parse_timestamp);
                ws.drafts.seed(doc_id, manual.content, updated_at);
                if let Some(document) = ws.documents.get_mut(doc_id) {
                    if manual.manual_docx_path.is_some() {
                        document.manual_docx_path = manual.manual_docx_path;
                    }
                    if manual.transcript_path.is_some() {
                        document.transcript_path = manual.transcript_path;
                    }
                }
            }
            Err(e) => {
                let message = format!("Failed to load stored manual: {e}");
                warn!("{message}");
                workspace.lock().await.status.logs.push(&message);
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!("Ignoring unparseable updated_at '{raw}': {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use crate::api::{ApiError, ManualResponse};
    use crate::document::MediaKind;
    use crate::workspace::Workspace;

    struct StubFetcher {
        transcript: &'static str,
        manual: Option<ManualResponse>,
        fail: AtomicBool,
    }

    impl StubFetcher {
        fn ok(transcript: &'static str) -> Arc<Self> {
            Arc::new(Self {
                transcript,
                manual: None,
                fail: AtomicBool::new(false),
            })
        }

        fn with_manual(manual: ManualResponse) -> Arc<Self> {
            Arc::new(Self {
                transcript: "",
                manual: Some(manual),
                fail: AtomicBool::new(false),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                transcript: "",
                manual: None,
                fail: AtomicBool::new(true),
            })
        }

        fn check(&self) -> Result<(), ApiError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ResourceFetcher for StubFetcher {
        async fn fetch_text(&self, _path: &str) -> Result<String, ApiError> {
            self.check()?;
            Ok(self.transcript.to_string())
        }

        async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
            self.check()?;
            Ok(path.as_bytes().to_vec())
        }

        async fn fetch_manual(&self, _doc_id: &str) -> Result<ManualResponse, ApiError> {
            self.check()?;
            Ok(self.manual.clone().unwrap_or_default())
        }
    }

    fn workspace_with_doc(doc_id: &str) -> SharedWorkspace {
        let workspace = Workspace::shared();
        {
            let mut ws = workspace.try_lock().unwrap();
            let mut doc = crate::document::Document::new(doc_id, "Doc", MediaKind::Mp3);
            doc.status = DocumentStatus::Processing;
            ws.documents.register(doc);
        }
        workspace
    }

    fn reconciler(fetcher: Arc<dyn ResourceFetcher>) -> ArtifactReconciler {
        // No delay in tests.
        ArtifactReconciler::new(fetcher, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_complete_overwrites_dirty_draft() {
        let workspace = workspace_with_doc("d1");
        workspace.lock().await.drafts.edit("d1", "unsaved local edit");
        let payload = CompletePayload {
            manual_content: "server manual".to_string(),
            manual_docx_path: Some("/files/d1.docx".to_string()),
            transcript_path: None,
            updated_at: Some("2026-08-29T12:00:00Z".to_string()),
        };

        reconciler(StubFetcher::ok(""))
            .complete(&workspace, "d1", &payload)
            .await;

        let ws = workspace.lock().await;
        let draft = ws.drafts.get("d1").unwrap();
        assert!(!draft.is_dirty);
        assert_eq!(draft.content, "server manual");
        let document = ws.documents.get("d1").unwrap();
        assert_eq!(document.status, DocumentStatus::Ready);
        assert_eq!(document.manual_content.as_deref(), Some("server manual"));
        assert_eq!(document.manual_docx_path.as_deref(), Some("/files/d1.docx"));
    }

    #[tokio::test]
    async fn test_delayed_transcript_fetch_merges_text() {
        let workspace = workspace_with_doc("d1");
        let payload = CompletePayload {
            manual_content: "manual".to_string(),
            transcript_path: Some("/files/d1.txt".to_string()),
            ..Default::default()
        };

        let handle = reconciler(StubFetcher::ok("the transcript"))
            .complete(&workspace, "d1", &payload)
            .await
            .expect("transcript fetch scheduled");
        handle.await.unwrap();

        let ws = workspace.lock().await;
        assert_eq!(
            ws.documents.get("d1").unwrap().content.as_deref(),
            Some("the transcript")
        );
    }

    #[tokio::test]
    async fn test_transcript_fetch_failure_is_silent() {
        let workspace = workspace_with_doc("d1");
        let payload = CompletePayload {
            manual_content: "manual".to_string(),
            transcript_path: Some("/files/d1.txt".to_string()),
            ..Default::default()
        };

        let handle = reconciler(StubFetcher::failing())
            .complete(&workspace, "d1", &payload)
            .await
            .unwrap();
        handle.await.unwrap();

        let ws = workspace.lock().await;
        let document = ws.documents.get("d1").unwrap();
        // Document is still ready; only the transcript is missing.
        assert_eq!(document.status, DocumentStatus::Ready);
        assert!(document.content.is_none());
    }

    #[tokio::test]
    async fn test_open_existing_seeds_draft_once() {
        let workspace = workspace_with_doc("d1");
        let fetcher = StubFetcher::with_manual(ManualResponse {
            doc_id: "d1".to_string(),
            content: "stored manual".to_string(),
            manual_docx_path: Some("/files/d1.docx".to_string()),
            ..Default::default()
        });

        reconciler(fetcher).open_existing(&workspace, "d1").await;

        let ws = workspace.lock().await;
        assert_eq!(ws.drafts.get("d1").unwrap().content, "stored manual");
        assert_eq!(
            ws.documents.get("d1").unwrap().manual_docx_path.as_deref(),
            Some("/files/d1.docx")
        );
    }

    #[tokio::test]
    async fn test_open_existing_skips_seeded_draft() {
        let workspace = workspace_with_doc("d1");
        workspace.lock().await.drafts.edit("d1", "local work");

        reconciler(StubFetcher::failing())
            .open_existing(&workspace, "d1")
            .await;

        // The failing fetcher was never consulted; the draft survives.
        let ws = workspace.lock().await;
        assert_eq!(ws.drafts.get("d1").unwrap().content, "local work");
    }

    /// Fetcher that races the editor: a local edit lands while the manual
    /// fetch is in flight.
    struct EditDuringFetch {
        workspace: SharedWorkspace,
    }

    #[async_trait]
    impl ResourceFetcher for EditDuringFetch {
        async fn fetch_text(&self, _path: &str) -> Result<String, ApiError> {
            Ok(String::new())
        }

        async fn fetch_bytes(&self, _path: &str) -> Result<Vec<u8>, ApiError> {
            Ok(Vec::new())
        }

        async fn fetch_manual(&self, doc_id: &str) -> Result<ManualResponse, ApiError> {
            self.workspace
                .lock()
                .await
                .drafts
                .edit(doc_id, "local edit wins");
            Ok(ManualResponse {
                doc_id: doc_id.to_string(),
                content: "stored manual".to_string(),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_open_existing_preserves_interleaved_edit() {
        let workspace = workspace_with_doc("d1");
        let fetcher = Arc::new(EditDuringFetch {
            workspace: workspace.clone(),
        });

        reconciler(fetcher).open_existing(&workspace, "d1").await;

        let ws = workspace.lock().await;
        let draft = ws.drafts.get("d1").unwrap();
        assert!(draft.is_dirty);
        assert_eq!(draft.content, "local edit wins");
    }

    #[tokio::test]
    async fn test_open_existing_failure_logs_and_moves_on() {
        let workspace = workspace_with_doc("d1");

        reconciler(StubFetcher::failing())
            .open_existing(&workspace, "d1")
            .await;

        let ws = workspace.lock().await;
        assert!(ws.drafts.get("d1").is_none());
        assert!(ws.status.logs.iter().any(|l| l.contains("Failed to load")));
    }
}
