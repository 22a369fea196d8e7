//! Liveness snapshot of the backing subsystems.
//!
//! The snapshot is advisory display state. Between refreshes of the status
//! endpoint the client nudges individual nodes opportunistically as runs
//! start, progress, and finish.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::AidoClient;
use crate::pipeline::PipelineStage;
use crate::workspace::SharedWorkspace;

/// Liveness of a single backing subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    Ready,
    Inactive,
    Error,
}

/// Snapshot of backend subsystem health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SystemStatus {
    pub postgres: NodeStatus,
    pub whisper: NodeStatus,
    pub adk: NodeStatus,
    pub auth: NodeStatus,
}

impl Default for SystemStatus {
    // Optimistic defaults until the first refresh lands.
    fn default() -> Self {
        Self {
            postgres: NodeStatus::Active,
            whisper: NodeStatus::Inactive,
            adk: NodeStatus::Ready,
            auth: NodeStatus::Active,
        }
    }
}

impl SystemStatus {
    /// Snapshot shown when the status endpoint is unreachable.
    pub fn unreachable() -> Self {
        Self {
            postgres: NodeStatus::Error,
            whisper: NodeStatus::Error,
            adk: NodeStatus::Error,
            auth: NodeStatus::Error,
        }
    }

    /// Opportunistic update when a run starts.
    pub fn on_run_started(&mut self, uses_media: bool) {
        self.adk = NodeStatus::Active;
        if uses_media {
            self.whisper = NodeStatus::Active;
        }
    }

    /// Opportunistic update when the server reports the active stage.
    pub fn on_stage(&mut self, stage: PipelineStage) {
        self.adk = NodeStatus::Active;
        if stage == PipelineStage::Transcription {
            self.whisper = NodeStatus::Active;
        } else if self.whisper != NodeStatus::Error {
            self.whisper = NodeStatus::Inactive;
        }
    }

    /// Opportunistic update when a run ends, for any reason.
    pub fn on_run_finished(&mut self) {
        self.adk = NodeStatus::Ready;
        if self.whisper != NodeStatus::Error {
            self.whisper = NodeStatus::Inactive;
        }
    }
}

/// Spawns a background task that refreshes the workspace snapshot on a
/// fixed interval. An unreachable endpoint degrades every node to `Error`
/// until a later refresh succeeds.
pub fn spawn_status_monitor(
    client: AidoClient,
    workspace: SharedWorkspace,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let fresh = match client.system_status().await {
                Ok(status) => status,
                Err(e) => {
                    debug!("System status refresh failed: {e}");
                    SystemStatus::unreachable()
                }
            };
            workspace.lock().await.system = fresh;
        }
    })
}
