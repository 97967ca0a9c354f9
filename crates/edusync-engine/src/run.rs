//! Sync run state: phases, status, statistics, event log.
//!
//! A [`SyncRun`] is the unit-of-work record. It is owned and mutated
//! exclusively by the orchestrator; external pollers only ever see
//! read-only snapshots. Its serialized form is the JSON document polled
//! by UIs: `{status, progress, phase, message, stats, log, errors, ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named stage of the orchestrator's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Options validated, schema compiled.
    Init,
    /// Remote users and groups are being pulled.
    Fetching,
    /// Groups are being classified and formatted.
    Classifying,
    /// Remote state is being diffed against local state.
    Diffing,
    /// Account creates/updates/disables are being applied.
    ApplyingAccounts,
    /// Container creates are being applied.
    ApplyingContainers,
    /// Enrollments are being applied.
    ApplyingMemberships,
    /// Tracker and final snapshot are being persisted.
    Finalizing,
}

impl SyncPhase {
    /// Progress percentage at which this phase begins.
    #[must_use]
    pub fn progress_floor(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Fetching => 5,
            Self::Classifying => 25,
            Self::Diffing => 30,
            Self::ApplyingAccounts => 40,
            Self::ApplyingContainers => 60,
            Self::ApplyingMemberships => 75,
            Self::Finalizing => 95,
        }
    }

    /// Progress percentage at which this phase ends.
    #[must_use]
    pub fn progress_ceiling(self) -> u8 {
        match self {
            Self::Init => 5,
            Self::Fetching => 25,
            Self::Classifying => 30,
            Self::Diffing => 40,
            Self::ApplyingAccounts => 60,
            Self::ApplyingContainers => 75,
            Self::ApplyingMemberships => 95,
            Self::Finalizing => 100,
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Fetching => "fetching",
            Self::Classifying => "classifying",
            Self::Diffing => "diffing",
            Self::ApplyingAccounts => "applying_accounts",
            Self::ApplyingContainers => "applying_containers",
            Self::ApplyingMemberships => "applying_memberships",
            Self::Finalizing => "finalizing",
        };
        write!(f, "{name}")
    }
}

/// Terminal and non-terminal run states.
///
/// A run that completed with accumulated per-item errors is still
/// `Completed`; callers distinguish it from a clean completion through
/// `stats.errors`. `Failed` is reserved for phase-fatal aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet executing.
    Pending,
    /// Executing.
    Running,
    /// Finished; check `stats.errors` for per-item failures.
    Completed,
    /// Aborted by a phase-fatal error.
    Failed,
    /// Terminated by external cancellation. Already-applied changes are
    /// not rolled back.
    Cancelled,
}

impl RunStatus {
    /// Whether the status will never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a cancellation request is valid in this state.
    #[must_use]
    pub fn can_cancel(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// Cumulative counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Entities created (accounts, containers, enrollments).
    #[serde(default)]
    pub created: u64,
    /// Entities updated.
    #[serde(default)]
    pub updated: u64,
    /// Accounts disabled.
    #[serde(default)]
    pub disabled: u64,
    /// Entities deleted (accounts, removed enrollments).
    #[serde(default)]
    pub deleted: u64,
    /// Items excluded by filters, protection, or tracker gating.
    #[serde(default)]
    pub skipped: u64,
    /// Per-item apply failures.
    #[serde(default)]
    pub errors: u64,
}

/// One structured event in the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Phase the event belongs to.
    pub phase: SyncPhase,
    /// Event message.
    pub message: String,
}

/// One accumulated per-item error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    /// Entity kind, e.g. `account`, `container`, `membership`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Identifier of the failed item.
    pub item: String,
    /// Underlying error.
    pub message: String,
}

/// The unit-of-work record for one sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    /// Run identifier.
    pub run_id: Uuid,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Completion time, once terminal.
    pub finished_at: Option<DateTime<Utc>>,
    /// Terminal or current status.
    pub status: RunStatus,
    /// Overall progress, 0–100.
    pub progress: u8,
    /// Current phase.
    pub phase: SyncPhase,
    /// Last progress message.
    pub message: String,
    /// Whether gateway writes were suppressed.
    pub dry_run: bool,
    /// Cumulative counters.
    pub stats: SyncStats,
    /// Ordered event log.
    pub log: Vec<RunEvent>,
    /// Accumulated per-item errors.
    pub errors: Vec<ItemError>,
}

impl SyncRun {
    /// Creates a pending run.
    #[must_use]
    pub fn new(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Pending,
            progress: 0,
            phase: SyncPhase::Init,
            message: String::new(),
            dry_run,
            stats: SyncStats::default(),
            log: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Marks the run as executing.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
    }

    /// Enters a phase, logging the transition and advancing progress to
    /// the phase floor.
    pub fn enter_phase(&mut self, phase: SyncPhase, message: impl Into<String>) {
        let message = message.into();
        self.phase = phase;
        self.progress = phase.progress_floor();
        self.message.clone_from(&message);
        self.push_event(message);
    }

    /// Updates intra-phase progress from item counts.
    pub fn set_phase_progress(&mut self, done: usize, total: usize) {
        let floor = f64::from(self.phase.progress_floor());
        let ceiling = f64::from(self.phase.progress_ceiling());
        let fraction = if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        };
        self.progress = (floor + (ceiling - floor) * fraction).round() as u8;
    }

    /// Appends a log event in the current phase.
    pub fn push_event(&mut self, message: impl Into<String>) {
        self.log.push(RunEvent {
            timestamp: Utc::now(),
            phase: self.phase,
            message: message.into(),
        });
    }

    /// Records a per-item apply failure. Never aborts the run.
    pub fn record_error(&mut self, kind: &str, item: &str, message: impl Into<String>) {
        self.stats.errors += 1;
        self.errors.push(ItemError {
            kind: kind.to_string(),
            item: item.to_string(),
            message: message.into(),
        });
    }

    /// Marks the run completed. Accumulated item errors do not demote the
    /// status; `stats.errors` carries the distinction.
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.progress = 100;
        self.finished_at = Some(Utc::now());
        let message = if self.stats.errors == 0 {
            "Sync completed".to_string()
        } else {
            format!("Sync completed with {} item error(s)", self.stats.errors)
        };
        self.message.clone_from(&message);
        self.push_event(message);
    }

    /// Marks the run failed with the triggering error.
    pub fn fail(&mut self, error: impl std::fmt::Display) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
        let message = format!("Sync failed: {error}");
        self.message.clone_from(&message);
        self.push_event(message);
    }

    /// Marks the run cancelled. Counters keep the values accumulated up
    /// to the cancellation point.
    pub fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.finished_at = Some(Utc::now());
        let message = "Sync cancelled".to_string();
        self.message.clone_from(&message);
        self.push_event(message);
    }
}
