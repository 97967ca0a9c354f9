//! Sync service: the invocation surface.
//!
//! Starting a sync returns a run ID immediately; the run itself executes
//! on a spawned background task, fully decoupling the caller's
//! request/response lifecycle from the run lifecycle. Callers poll
//! [`SyncService::get_status`] for read-only [`SyncRun`] snapshots and
//! may cancel a running sync at any time.
//!
//! At most one run is active per service; a second start request while
//! one is running is rejected, never queued silently.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use edusync_connector::IdentityProvider;

use crate::config::SyncOptions;
use crate::error::{EngineError, EngineResult};
use crate::gateway::LocalStateGateway;
use crate::orchestrator::SyncEngine;
use crate::plan::SyncPlan;
use crate::progress::ProgressCallback;
use crate::run::SyncRun;

/// Handle to the currently (or most recently) active run.
struct ActiveRun {
    run_id: Uuid,
    cancel: CancellationToken,
    snapshot: Arc<RwLock<SyncRun>>,
}

/// Background-task orchestration around [`SyncEngine`].
pub struct SyncService {
    engine: Arc<SyncEngine>,
    callback: Option<ProgressCallback>,
    active: Mutex<Option<ActiveRun>>,
    runs: RwLock<HashMap<Uuid, Arc<RwLock<SyncRun>>>>,
}

impl SyncService {
    /// Creates a service for one sync target.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn LocalStateGateway>,
        options: SyncOptions,
    ) -> Self {
        Self {
            engine: Arc::new(SyncEngine::new(provider, gateway, options)),
            callback: None,
            active: Mutex::new(None),
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Attaches a progress callback invoked for every emission of every
    /// run started through this service.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Starts a sync run and returns its ID immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] while another run is
    /// active; concurrent syncs against one target are never queued.
    #[instrument(skip(self))]
    pub async fn start_sync(&self, dry_run: bool) -> EngineResult<Uuid> {
        let mut active = self.active.lock().await;

        if let Some(ref current) = *active {
            let status = current.snapshot.read().await.status;
            if !status.is_terminal() {
                return Err(EngineError::AlreadyRunning {
                    run_id: current.run_id,
                });
            }
        }

        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let snapshot = Arc::new(RwLock::new(SyncRun::new(run_id, dry_run)));
        self.runs.write().await.insert(run_id, snapshot.clone());

        let engine = Arc::clone(&self.engine);
        let callback = self.callback.clone();
        let token = cancel.clone();
        let shared = snapshot.clone();
        tokio::spawn(async move {
            engine.execute(run_id, dry_run, token, shared, callback).await;
        });

        *active = Some(ActiveRun {
            run_id,
            cancel,
            snapshot,
        });
        info!(%run_id, dry_run, "Sync run started");
        Ok(run_id)
    }

    /// Returns a read-only snapshot of a run.
    pub async fn get_status(&self, run_id: Uuid) -> EngineResult<SyncRun> {
        let runs = self.runs.read().await;
        let snapshot = runs
            .get(&run_id)
            .ok_or(EngineError::RunNotFound { run_id })?
            .clone();
        let result = snapshot.read().await.clone();
        Ok(result)
    }

    /// Requests cancellation of a running sync.
    ///
    /// The acknowledgement only means the signal was delivered; the run
    /// reaches `Cancelled` at its next cancellation checkpoint, with
    /// already-applied changes left in place.
    #[instrument(skip(self))]
    pub async fn cancel_sync(&self, run_id: Uuid) -> EngineResult<()> {
        let active = self.active.lock().await;

        if let Some(ref current) = *active {
            if current.run_id == run_id {
                let status = current.snapshot.read().await.status;
                if !status.can_cancel() {
                    return Err(EngineError::NotCancellable {
                        run_id,
                        status: status.to_string(),
                    });
                }
                current.cancel.cancel();
                info!(%run_id, "Cancellation requested");
                return Ok(());
            }
        }

        let runs = self.runs.read().await;
        match runs.get(&run_id) {
            Some(snapshot) => {
                let status = snapshot.read().await.status;
                Err(EngineError::NotCancellable {
                    run_id,
                    status: status.to_string(),
                })
            }
            None => Err(EngineError::RunNotFound { run_id }),
        }
    }

    /// Computes the sync plan without applying anything (dry-run diff,
    /// synchronous).
    pub async fn preview(&self) -> EngineResult<SyncPlan> {
        self.engine.preview().await
    }
}
