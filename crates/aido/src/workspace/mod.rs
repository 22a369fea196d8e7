//! Workspace session: the single owner of client-side mutable state.
//!
//! All state lives behind one `tokio::sync::Mutex`, so between any two
//! await points exactly one task mutates documents, drafts, download
//! records, and run status. Components lock, mutate, and release; nothing
//! holds the lock across network I/O.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use log::warn;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::api::{ApiError, ManualStore};
use crate::document::{Document, DocumentRegistry, DocumentStatus, MediaKind};
use crate::download::{save_artifact, sanitize_filename, DownloadError, DownloadRecords};
use crate::draft::DraftStore;
use crate::pipeline::{EventOutcome, PipelineEvent, PipelineStage, PipelineStatus};
use crate::status::SystemStatus;

/// Shared handle to a workspace session.
pub type SharedWorkspace = Arc<Mutex<Workspace>>;

/// Token tying events to the run that produced them.
///
/// Each `begin_run` bumps the session counter; events carrying a stale
/// token are dropped, so an abandoned stream can never corrupt the state
/// of a newer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunGeneration(u64);

/// All mutable state of one client session.
#[derive(Debug, Default)]
pub struct Workspace {
    pub documents: DocumentRegistry,
    pub drafts: DraftStore,
    pub downloads: DownloadRecords,
    pub system: SystemStatus,
    pub status: PipelineStatus,
    generation: u64,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedWorkspace {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Registers a new document for submission and returns its id.
    pub fn submit(
        &mut self,
        name: &str,
        kind: MediaKind,
        instructions: Option<String>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let mut document = Document::new(&id, name, kind);
        document.instructions = instructions;
        self.documents.register(document);
        id
    }

    /// Starts a new run: bumps the generation, resets run status, and moves
    /// the document into processing. Safe to call while an older run is
    /// still streaming; its remaining events will be fenced out.
    pub fn begin_run(&mut self, doc_id: &str, uses_media: bool) -> RunGeneration {
        self.generation += 1;
        self.status.begin_run();
        self.system.on_run_started(uses_media);
        self.documents.set_status(doc_id, DocumentStatus::Processing);
        RunGeneration(self.generation)
    }

    /// Applies a decoded event if it belongs to the current run, returning
    /// `None` for events from a superseded run.
    pub fn apply_event(
        &mut self,
        generation: RunGeneration,
        doc_id: &str,
        event: &PipelineEvent,
    ) -> Option<EventOutcome> {
        if generation.0 != self.generation {
            debug!(doc_id, "Dropping event from superseded run");
            return None;
        }
        if let PipelineEvent::Progress(payload) = event {
            self.system.on_stage(payload.stage);
        }
        let outcome = self.status.apply(event);
        match outcome {
            EventOutcome::DocumentError => {
                self.documents.set_status(doc_id, DocumentStatus::Error);
                self.system.on_run_finished();
            }
            EventOutcome::Completed => {
                self.system.on_run_finished();
            }
            EventOutcome::Continue => {}
        }
        Some(outcome)
    }

    /// Records a transport failure for the given run. Document status is
    /// left untouched on this path; only an explicit server `error` event
    /// marks a document failed.
    pub fn transport_failure(&mut self, generation: RunGeneration) {
        if generation.0 != self.generation {
            return;
        }
        self.status.transport_failure();
        self.system.on_run_finished();
    }

    /// Local draft edit; no network effect.
    pub fn edit_draft(&mut self, doc_id: &str, content: impl Into<String>) {
        self.drafts.edit(doc_id, content);
    }

    /// Opens a document for viewing. Ready documents present as completed.
    /// Returns true when the caller should fetch the stored manual because
    /// no draft has been seeded yet.
    pub fn open_document(&mut self, doc_id: &str) -> bool {
        let Some(document) = self.documents.get(doc_id) else {
            return false;
        };
        if !document.is_ready() {
            return false;
        }
        self.status.stage = PipelineStage::Completed;
        !self.drafts.contains(doc_id)
    }
}

/// Network-facing workspace operations: saving drafts and exporting DOCX.
/// Backed by the [`ManualStore`] seam.
pub struct WorkspaceClient {
    workspace: SharedWorkspace,
    store: Arc<dyn ManualStore>,
}

impl WorkspaceClient {
    pub fn new(workspace: SharedWorkspace, store: Arc<dyn ManualStore>) -> Self {
        Self { workspace, store }
    }

    /// Persists the current draft, falling back to the stored manual text
    /// when no draft exists. Only a successful save clears the dirty flag;
    /// on failure the draft stays dirty for an explicit retry. An edit that
    /// lands while the save is in flight also stays dirty: the buffer is
    /// never rewritten with the saved snapshot.
    pub async fn save_manual(&self, doc_id: &str) -> Result<(), ApiError> {
        let content = {
            let ws = self.workspace.lock().await;
            ws.drafts
                .get(doc_id)
                .map(|d| d.content.clone())
                .or_else(|| {
                    ws.documents
                        .get(doc_id)
                        .and_then(|d| d.manual_content.clone())
                })
                .unwrap_or_default()
        };

        match self.store.save_manual(doc_id, &content).await {
            Ok(()) => {
                let mut ws = self.workspace.lock().await;
                match ws.drafts.get(doc_id) {
                    Some(draft) if draft.content == content => {
                        ws.drafts.mark_saved(doc_id, Utc::now());
                    }
                    // The buffer moved on while the PUT was in flight; its
                    // newer content has not been saved.
                    Some(_) => {}
                    None => ws.drafts.seed(doc_id, content.clone(), Some(Utc::now())),
                }
                if let Some(document) = ws.documents.get_mut(doc_id) {
                    document.manual_content = Some(content);
                }
                Ok(())
            }
            Err(e) => {
                let message = format!("Failed to save manual: {e}");
                warn!("{message}");
                self.workspace.lock().await.status.logs.push(&message);
                Err(e)
            }
        }
    }

    /// Exports a DOCX for the document into `download_dir` and returns the
    /// written path. Current text (draft or stored manual) is converted
    /// server-side; with no text at all, the stored artifact is fetched
    /// instead.
    pub async fn export_docx(
        &self,
        doc_id: &str,
        download_dir: &Path,
    ) -> Result<PathBuf, DownloadError> {
        let (name, content, docx_path) = {
            let ws = self.workspace.lock().await;
            let Some(document) = ws.documents.get(doc_id) else {
                return Err(DownloadError::UnknownDocument(doc_id.to_string()));
            };
            let content = ws
                .drafts
                .get(doc_id)
                .map(|d| d.content.clone())
                .or_else(|| document.manual_content.clone());
            (
                document.name.clone(),
                content,
                document.manual_docx_path.clone(),
            )
        };

        let (bytes, suffix) = if let Some(content) = content {
            (self.store.convert_docx(&content).await?, "manual.docx")
        } else if let Some(path) = docx_path {
            (self.store.fetch_artifact(&path).await?, "manual.docx")
        } else {
            return Err(DownloadError::MissingArtifact);
        };

        let filename = format!("{}_{}", sanitize_filename(&name), suffix);
        save_artifact(download_dir, &filename, &bytes).await
    }
}
