//! Progress emission and run snapshot persistence.
//!
//! The orchestrator reports progress through a callback invoked at every
//! phase transition and, inside apply phases, at a configurable item
//! interval (never more often, to bound callback overhead). Each emission
//! also writes the run's JSON snapshot to a run-scoped file that external
//! pollers read.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::run::{SyncPhase, SyncRun, SyncStats};

/// Payload handed to the progress callback.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Run the update belongs to.
    pub run_id: Uuid,
    /// Current phase.
    pub phase: SyncPhase,
    /// Overall progress, 0–100.
    pub percentage: u8,
    /// Last progress message.
    pub message: String,
    /// Cumulative counters.
    pub stats: SyncStats,
}

impl ProgressUpdate {
    fn from_run(run: &SyncRun) -> Self {
        Self {
            run_id: run.run_id,
            phase: run.phase,
            percentage: run.progress,
            message: run.message.clone(),
            stats: run.stats,
        }
    }
}

/// Progress callback type.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Throttled progress reporter owned by the orchestrator for one run.
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
    interval: usize,
    snapshot_path: Option<PathBuf>,
    items_since_emit: usize,
}

impl ProgressReporter {
    pub(crate) fn new(
        callback: Option<ProgressCallback>,
        interval: usize,
        state_dir: Option<&PathBuf>,
        run_id: Uuid,
    ) -> Self {
        Self {
            callback,
            interval,
            snapshot_path: state_dir.map(|dir| dir.join("runs").join(format!("{run_id}.json"))),
            items_since_emit: 0,
        }
    }

    /// Emits unconditionally; used at phase transitions and terminally.
    pub(crate) async fn emit(&mut self, run: &SyncRun) {
        self.items_since_emit = 0;
        if let Some(ref callback) = self.callback {
            callback(ProgressUpdate::from_run(run));
        }
        self.persist(run).await;
    }

    /// Counts one processed item and emits once the interval is reached.
    ///
    /// Returns whether an emission happened; cancellation is checked at
    /// exactly these points inside a phase.
    pub(crate) async fn item_processed(&mut self, run: &SyncRun) -> bool {
        self.items_since_emit += 1;
        if self.items_since_emit >= self.interval {
            self.emit(run).await;
            true
        } else {
            false
        }
    }

    /// Writes the run snapshot to its run-scoped file. Persistence
    /// failures are logged, never fatal to the run.
    async fn persist(&self, run: &SyncRun) {
        let Some(ref path) = self.snapshot_path else {
            return;
        };

        let result = async {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let bytes = serde_json::to_vec_pretty(run)?;
            tokio::fs::write(path, bytes).await?;
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
        }
        .await;

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to persist run snapshot");
        }
    }
}
