//! Policy-gated, at-most-once auto-download of run artifacts.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;
use thiserror::Error;
use tracing::info;

use crate::api::{ApiError, ResourceFetcher};
use crate::document::Document;

/// Kind of downloadable run artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Manual,
    Transcript,
}

impl ArtifactKind {
    fn filename_suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Manual => "manual.docx",
            ArtifactKind::Transcript => "transcript.txt",
        }
    }
}

/// Error saving an artifact locally.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Artifact fetch failed: {0}")]
    Fetch(#[from] ApiError),

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown document: {0}")]
    UnknownDocument(String),

    #[error("Document has no manual content or stored artifact")]
    MissingArtifact,
}

/// Session-scoped record of which artifacts have already been downloaded.
///
/// Write-once per (document, kind); dropped with the owning workspace
/// session, so a fresh session downloads everything again.
#[derive(Debug, Clone, Default)]
pub struct DownloadRecords {
    downloaded: HashMap<String, HashSet<ArtifactKind>>,
}

impl DownloadRecords {
    pub fn is_downloaded(&self, doc_id: &str, kind: ArtifactKind) -> bool {
        self.downloaded
            .get(doc_id)
            .is_some_and(|kinds| kinds.contains(&kind))
    }

    pub fn mark(&mut self, doc_id: &str, kind: ArtifactKind) {
        self.downloaded
            .entry(doc_id.to_string())
            .or_default()
            .insert(kind);
    }
}

/// Which artifact kinds the user wants downloaded automatically.
#[derive(Debug, Clone, Copy)]
pub struct DownloadPolicy {
    pub auto_download_manual: bool,
    pub auto_download_transcript: bool,
}

impl DownloadPolicy {
    fn enabled(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::Manual => self.auto_download_manual,
            ArtifactKind::Transcript => self.auto_download_transcript,
        }
    }
}

/// Downloads each ready artifact exactly once per session.
///
/// The coordinator itself is stateless between sweeps; the at-most-once
/// guarantee lives in [`DownloadRecords`].
pub struct AutoDownloadCoordinator {
    fetcher: Arc<dyn ResourceFetcher>,
    policy: DownloadPolicy,
    download_dir: PathBuf,
}

impl AutoDownloadCoordinator {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        policy: DownloadPolicy,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            policy,
            download_dir: download_dir.into(),
        }
    }

    /// Evaluates every document and downloads artifacts that are ready,
    /// enabled by policy, and not yet recorded. Returns the pairs that
    /// succeeded; the caller marks them in its records. A failed fetch is
    /// logged and left unmarked, so the next sweep retries it.
    pub async fn sweep(
        &self,
        documents: &[Document],
        records: &DownloadRecords,
    ) -> Vec<(String, ArtifactKind)> {
        let mut completed = Vec::new();
        for document in documents {
            if !document.is_ready() {
                continue;
            }
            for kind in [ArtifactKind::Manual, ArtifactKind::Transcript] {
                let path = match kind {
                    ArtifactKind::Manual => document.manual_docx_path.as_deref(),
                    ArtifactKind::Transcript => document.transcript_path.as_deref(),
                };
                let Some(path) = path else { continue };
                if !self.policy.enabled(kind) || records.is_downloaded(&document.id, kind) {
                    continue;
                }
                match self.download(document, kind, path).await {
                    Ok(target) => {
                        info!(
                            doc_id = %document.id,
                            target = %target.display(),
                            "Artifact downloaded"
                        );
                        completed.push((document.id.clone(), kind));
                    }
                    Err(e) => {
                        warn!(
                            "Auto-download of {:?} for document {} failed: {}",
                            kind, document.id, e
                        );
                    }
                }
            }
        }
        completed
    }

    async fn download(
        &self,
        document: &Document,
        kind: ArtifactKind,
        path: &str,
    ) -> Result<PathBuf, DownloadError> {
        let bytes = match kind {
            ArtifactKind::Manual => self.fetcher.fetch_bytes(path).await?,
            ArtifactKind::Transcript => self.fetcher.fetch_text(path).await?.into_bytes(),
        };
        let filename = format!(
            "{}_{}",
            sanitize_filename(&document.name),
            kind.filename_suffix()
        );
        save_artifact(&self.download_dir, &filename, &bytes).await
    }
}

/// Writes artifact bytes under `dir`, creating it if needed.
pub(crate) async fn save_artifact(
    dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> Result<PathBuf, DownloadError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| DownloadError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    let target = dir.join(filename);
    tokio::fs::write(&target, bytes)
        .await
        .map_err(|source| DownloadError::Write {
            path: target.clone(),
            source,
        })?;
    Ok(target)
}

/// Keeps names filesystem-safe without losing readability.
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::api::ManualResponse;
    use crate::document::{DocumentStatus, MediaKind};

    struct StubFetcher {
        fetches: AtomicUsize,
        fail_paths: Mutex<HashSet<String>>,
    }

    impl StubFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fetches: AtomicUsize::new(0),
                fail_paths: Mutex::new(HashSet::new()),
            })
        }

        fn fail_on(&self, path: &str) {
            self.fail_paths.lock().unwrap().insert(path.to_string());
        }

        fn clear_failures(&self) {
            self.fail_paths.lock().unwrap().clear();
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn check(&self, path: &str) -> Result<(), ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_paths.lock().unwrap().contains(path) {
                return Err(ApiError::Status {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ResourceFetcher for StubFetcher {
        async fn fetch_text(&self, path: &str) -> Result<String, ApiError> {
            self.check(path)?;
            Ok(format!("text of {path}"))
        }

        async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
            self.check(path)?;
            Ok(path.as_bytes().to_vec())
        }

        async fn fetch_manual(&self, doc_id: &str) -> Result<ManualResponse, ApiError> {
            self.check(doc_id)?;
            Ok(ManualResponse::default())
        }
    }

    fn ready_document(id: &str) -> Document {
        let mut doc = Document::new(id, format!("Guide {id}"), MediaKind::PlainText);
        doc.status = DocumentStatus::Ready;
        doc.manual_docx_path = Some(format!("/files/{id}.docx"));
        doc.transcript_path = Some(format!("/files/{id}.txt"));
        doc
    }

    fn all_enabled() -> DownloadPolicy {
        DownloadPolicy {
            auto_download_manual: true,
            auto_download_transcript: true,
        }
    }

    fn apply_marks(records: &mut DownloadRecords, completed: Vec<(String, ArtifactKind)>) {
        for (doc_id, kind) in completed {
            records.mark(&doc_id, kind);
        }
    }

    #[tokio::test]
    async fn test_sweep_downloads_each_artifact_once() {
        let fetcher = StubFetcher::new();
        let dir = tempfile::tempdir().unwrap();
        let coordinator =
            AutoDownloadCoordinator::new(fetcher.clone(), all_enabled(), dir.path());
        let documents = vec![ready_document("d1")];
        let mut records = DownloadRecords::default();

        let completed = coordinator.sweep(&documents, &records).await;
        apply_marks(&mut records, completed);
        assert_eq!(fetcher.fetch_count(), 2);

        // Second observation pass: nothing new to do.
        let completed = coordinator.sweep(&documents, &records).await;
        assert!(completed.is_empty());
        assert_eq!(fetcher.fetch_count(), 2);

        assert!(dir.path().join("Guide d1_manual.docx").exists());
        assert!(dir.path().join("Guide d1_transcript.txt").exists());
    }

    #[tokio::test]
    async fn test_failed_download_is_retried_next_sweep() {
        let fetcher = StubFetcher::new();
        fetcher.fail_on("/files/d1.docx");
        let dir = tempfile::tempdir().unwrap();
        let coordinator =
            AutoDownloadCoordinator::new(fetcher.clone(), all_enabled(), dir.path());
        let documents = vec![ready_document("d1")];
        let mut records = DownloadRecords::default();

        let completed = coordinator.sweep(&documents, &records).await;
        apply_marks(&mut records, completed);
        // Transcript succeeded, manual did not.
        assert!(records.is_downloaded("d1", ArtifactKind::Transcript));
        assert!(!records.is_downloaded("d1", ArtifactKind::Manual));

        fetcher.clear_failures();
        let completed = coordinator.sweep(&documents, &records).await;
        apply_marks(&mut records, completed);
        assert!(records.is_downloaded("d1", ArtifactKind::Manual));
    }

    #[tokio::test]
    async fn test_policy_disables_artifact_kind() {
        let fetcher = StubFetcher::new();
        let dir = tempfile::tempdir().unwrap();
        let policy = DownloadPolicy {
            auto_download_manual: true,
            auto_download_transcript: false,
        };
        let coordinator = AutoDownloadCoordinator::new(fetcher.clone(), policy, dir.path());
        let documents = vec![ready_document("d1")];
        let records = DownloadRecords::default();

        let completed = coordinator.sweep(&documents, &records).await;

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].1, ArtifactKind::Manual);
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_non_ready_documents_are_skipped() {
        let fetcher = StubFetcher::new();
        let dir = tempfile::tempdir().unwrap();
        let coordinator =
            AutoDownloadCoordinator::new(fetcher.clone(), all_enabled(), dir.path());
        let mut doc = ready_document("d1");
        doc.status = DocumentStatus::Processing;

        let completed = coordinator.sweep(&[doc], &DownloadRecords::default()).await;

        assert!(completed.is_empty());
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[test]
    fn test_sanitize_filename_replaces_path_separators() {
        assert_eq!(sanitize_filename("a/b\\c: d"), "a_b_c_ d");
        assert_eq!(sanitize_filename("Guia Técnico 2.mp3"), "Guia Técnico 2.mp3");
    }
}
