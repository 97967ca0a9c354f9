//! Engine configuration.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use edusync_classify::{NamingOptions, SchemaSelector};

use crate::error::{EngineError, EngineResult};

/// Deactivation tracker thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerOptions {
    /// Consecutive runs an account must be missing before it is disabled.
    /// At the default of 1, a single absence disables (when
    /// `disable_missing` is on).
    #[serde(default = "default_mark_count_threshold")]
    pub mark_count_threshold: u32,
    /// Seconds an account must stay disabled before it may be deleted
    /// (when `delete_missing` is on).
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

fn default_mark_count_threshold() -> u32 {
    1
}

fn default_grace_period_secs() -> u64 {
    2_592_000 // 30 days
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            mark_count_threshold: default_mark_count_threshold(),
            grace_period_secs: default_grace_period_secs(),
        }
    }
}

/// Options for one sync target.
///
/// Consumed, not owned, by the engine: the surrounding application reads
/// these from wherever it keeps settings and hands them over per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Active classification schema.
    #[serde(default)]
    pub schema: SchemaSelector,
    /// Container naming and placement.
    #[serde(default)]
    pub naming: NamingOptions,
    /// User attribute whose value marks staff accounts.
    #[serde(default = "default_teacher_attribute")]
    pub teacher_attribute: String,
    /// Attribute value that grants the elevated role.
    #[serde(default = "default_teacher_attribute_value")]
    pub teacher_attribute_value: String,
    /// Disable accounts missing from the remote fetch. Off by default:
    /// absence alone never destroys state unless explicitly enabled.
    #[serde(default)]
    pub disable_missing: bool,
    /// Hard-delete accounts that stayed disabled past the grace period.
    /// Gated independently from `disable_missing`.
    #[serde(default)]
    pub delete_missing: bool,
    /// Remove enrollments no longer backed by a remote group membership.
    #[serde(default)]
    pub unenroll_missing: bool,
    /// Accounts never disabled or deleted, regardless of remote state.
    #[serde(default)]
    pub protected_users: BTreeSet<String>,
    /// Usernames excluded from synchronization entirely.
    #[serde(default)]
    pub ignore_users: BTreeSet<String>,
    /// Email domains excluded from synchronization.
    #[serde(default)]
    pub ignore_email_domains: BTreeSet<String>,
    /// When set, only users carrying this attribute are synchronized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_attribute: Option<String>,
    /// Accepted values for `required_attribute`; empty accepts any value.
    #[serde(default)]
    pub required_attribute_values: Vec<String>,
    /// Concurrent apply workers per phase.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Items between progress emissions inside apply phases.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
    /// Directory for run snapshots and tracker state. `None` disables
    /// persistence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    /// Deactivation tracker thresholds.
    #[serde(default)]
    pub tracker: TrackerOptions,
}

fn default_teacher_attribute() -> String {
    "role".to_string()
}

fn default_teacher_attribute_value() -> String {
    "teacher".to_string()
}

fn default_worker_count() -> usize {
    4
}

fn default_progress_interval() -> usize {
    25
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            schema: SchemaSelector::default(),
            naming: NamingOptions::default(),
            teacher_attribute: default_teacher_attribute(),
            teacher_attribute_value: default_teacher_attribute_value(),
            disable_missing: false,
            delete_missing: false,
            unenroll_missing: false,
            protected_users: BTreeSet::new(),
            ignore_users: BTreeSet::new(),
            ignore_email_domains: BTreeSet::new(),
            required_attribute: None,
            required_attribute_values: Vec::new(),
            worker_count: default_worker_count(),
            progress_interval: default_progress_interval(),
            state_dir: None,
            tracker: TrackerOptions::default(),
        }
    }
}

impl SyncOptions {
    /// Validates option invariants. Called before a run starts; a failure
    /// here is run-fatal and precedes any fetching.
    pub fn validate(&self) -> EngineResult<()> {
        if self.worker_count == 0 {
            return Err(EngineError::configuration("worker_count must be positive"));
        }
        if self.progress_interval == 0 {
            return Err(EngineError::configuration(
                "progress_interval must be positive",
            ));
        }
        if self.teacher_attribute.is_empty() {
            return Err(EngineError::configuration(
                "teacher_attribute must not be empty",
            ));
        }
        if self.tracker.mark_count_threshold == 0 {
            return Err(EngineError::configuration(
                "tracker.mark_count_threshold must be positive",
            ));
        }
        Ok(())
    }
}
