//! Drives one pipeline run: HTTP stream in, workspace state out.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, info, info_span, Instrument};

use super::error::PipelineError;
use super::event::PipelineEvent;
use super::request::PipelineRunRequest;
use super::state::EventOutcome;
use crate::api::{AidoClient, ApiError};
use crate::config::ClientConfig;
use crate::download::{ArtifactKind, AutoDownloadCoordinator};
use crate::reconcile::ArtifactReconciler;
use crate::stream::FrameDecoder;
use crate::workspace::{SharedWorkspace, Workspace};

/// Terminal outcome of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The server sent a `complete` event.
    Completed,
    /// The server sent an explicit `error` event.
    Failed,
    /// A newer run took over; this stream was abandoned.
    Superseded,
}

/// Executes runs against one workspace session.
///
/// Cancellation is dropping the returned future: the stream closes with
/// the connection and the workspace keeps whatever state the last applied
/// event left behind.
pub struct PipelineRunner {
    client: AidoClient,
    workspace: SharedWorkspace,
    reconciler: ArtifactReconciler,
    coordinator: AutoDownloadCoordinator,
}

impl PipelineRunner {
    pub fn new(
        client: AidoClient,
        workspace: SharedWorkspace,
        reconciler: ArtifactReconciler,
        coordinator: AutoDownloadCoordinator,
    ) -> Self {
        Self {
            client,
            workspace,
            reconciler,
            coordinator,
        }
    }

    /// Wires a runner and a fresh workspace session from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<(Self, SharedWorkspace), ApiError> {
        let client = AidoClient::new(&config.base_url)?;
        let workspace = Workspace::shared();
        let fetcher = Arc::new(client.clone());
        let reconciler =
            ArtifactReconciler::new(fetcher.clone(), config.transcript_fetch_delay());
        let coordinator = AutoDownloadCoordinator::new(
            fetcher,
            config.download_policy(),
            config.download_dir.clone(),
        );
        let runner = Self::new(client, workspace.clone(), reconciler, coordinator);
        Ok((runner, workspace))
    }

    /// Runs the pipeline for one submitted document to its terminal event.
    pub async fn run(&self, request: PipelineRunRequest) -> Result<RunOutcome, PipelineError> {
        let span = info_span!("pipeline_run", doc_id = %request.doc_id);
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: PipelineRunRequest) -> Result<RunOutcome, PipelineError> {
        let generation = {
            let mut ws = self.workspace.lock().await;
            ws.begin_run(&request.doc_id, request.uses_media())
        };

        let response = match self.client.run_pipeline(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.workspace.lock().await.transport_failure(generation);
                return Err(e.into());
            }
        };

        let mut decoder = FrameDecoder::new();
        let mut stream = response.bytes_stream();
        let mut outcome = None;

        'stream: while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.workspace.lock().await.transport_failure(generation);
                    return Err(ApiError::from(e).into());
                }
            };
            for frame in decoder.push(&String::from_utf8_lossy(&chunk)) {
                let event = match PipelineEvent::from_frame(&frame) {
                    Ok(Some(event)) => event,
                    Ok(None) => continue,
                    Err(e) => {
                        self.workspace.lock().await.transport_failure(generation);
                        return Err(e.into());
                    }
                };
                let applied = {
                    let mut ws = self.workspace.lock().await;
                    ws.apply_event(generation, &request.doc_id, &event)
                };
                match applied {
                    None => {
                        outcome = Some(RunOutcome::Superseded);
                        break 'stream;
                    }
                    Some(EventOutcome::Continue) => {}
                    Some(EventOutcome::DocumentError) => {
                        outcome = Some(RunOutcome::Failed);
                        break 'stream;
                    }
                    Some(EventOutcome::Completed) => {
                        if let PipelineEvent::Complete(payload) = &event {
                            // Detached; the transcript merge lands whenever
                            // the backend has the file ready.
                            let _ = self
                                .reconciler
                                .complete(&self.workspace, &request.doc_id, payload)
                                .await;
                        }
                        outcome = Some(RunOutcome::Completed);
                        break 'stream;
                    }
                }
            }
        }

        let residue = decoder.finish();
        if residue > 0 {
            debug!(bytes = residue, "Dropping partial frame at end of stream");
        }

        match outcome {
            Some(RunOutcome::Completed) => {
                self.sweep_downloads().await;
                info!(doc_id = %request.doc_id, "Run completed");
                Ok(RunOutcome::Completed)
            }
            Some(terminal) => Ok(terminal),
            None => {
                // EOF without a terminal event is a transport defect.
                self.workspace.lock().await.transport_failure(generation);
                Err(PipelineError::StreamEnded)
            }
        }
    }

    /// Re-evaluates the auto-download policy against current documents.
    /// Also safe to call outside a run, e.g. after toggling settings.
    pub async fn sweep_downloads(&self) {
        let (documents, records) = {
            let ws = self.workspace.lock().await;
            (
                ws.documents.iter().cloned().collect::<Vec<_>>(),
                ws.downloads.clone(),
            )
        };
        let completed: Vec<(String, ArtifactKind)> =
            self.coordinator.sweep(&documents, &records).await;
        if !completed.is_empty() {
            let mut ws = self.workspace.lock().await;
            for (doc_id, kind) in completed {
                ws.downloads.mark(&doc_id, kind);
            }
        }
    }
}
