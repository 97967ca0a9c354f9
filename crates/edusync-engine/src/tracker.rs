//! Deactivation tracker.
//!
//! Soft-delete bookkeeping across runs: accounts missing from the remote
//! fetch are marked per run; an account is only disabled once it has been
//! missing for a configured number of consecutive runs, and only deleted
//! once it has additionally stayed deactivated past a grace period. An
//! account that reappears is unmarked and starts over.
//!
//! State is a flat JSON file under the engine's state directory; a
//! missing or unreadable file starts the tracker empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TrackerOptions;
use crate::error::EngineResult;

/// Tracking record for one missing account.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrackedItem {
    /// Correlation ID of the account.
    identifier: String,
    /// When the account was first seen missing.
    first_marked: DateTime<Utc>,
    /// When the account was last seen missing.
    last_marked: DateTime<Utc>,
    /// Consecutive runs the account has been missing.
    mark_count: u32,
    /// When the account was deactivated, if it was.
    deactivated_at: Option<DateTime<Utc>>,
}

/// Tracker for soft-delete gating.
#[derive(Debug)]
pub struct DeactivationTracker {
    path: Option<PathBuf>,
    options: TrackerOptions,
    items: HashMap<String, TrackedItem>,
}

impl DeactivationTracker {
    /// Creates an empty, non-persistent tracker.
    #[must_use]
    pub fn in_memory(options: TrackerOptions) -> Self {
        Self {
            path: None,
            options,
            items: HashMap::new(),
        }
    }

    /// Loads tracker state from the given file, starting empty when the
    /// file is absent or unreadable.
    pub async fn load(path: &Path, options: TrackerOptions) -> Self {
        let items = match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, TrackedItem>>(&bytes) {
                Ok(items) => {
                    debug!(count = items.len(), path = %path.display(), "Loaded tracker state");
                    items
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Tracker state unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path: Some(path.to_path_buf()),
            options,
            items,
        }
    }

    /// Marks an account as missing in the current run.
    pub fn mark(&mut self, identifier: &str) {
        let now = Utc::now();
        self.items
            .entry(identifier.to_string())
            .and_modify(|item| {
                item.last_marked = now;
                item.mark_count += 1;
            })
            .or_insert_with(|| TrackedItem {
                identifier: identifier.to_string(),
                first_marked: now,
                last_marked: now,
                mark_count: 1,
                deactivated_at: None,
            });
    }

    /// Clears tracking for an account that reappeared remotely.
    pub fn unmark(&mut self, identifier: &str) {
        if self.items.remove(identifier).is_some() {
            debug!(identifier, "Account reappeared, tracking cleared");
        }
    }

    /// Whether the account has been missing long enough to disable.
    #[must_use]
    pub fn should_disable(&self, identifier: &str) -> bool {
        self.items
            .get(identifier)
            .is_some_and(|item| item.mark_count >= self.options.mark_count_threshold)
    }

    /// Records that the account was deactivated; starts the grace period.
    pub fn mark_deactivated(&mut self, identifier: &str) {
        if let Some(item) = self.items.get_mut(identifier) {
            if item.deactivated_at.is_none() {
                item.deactivated_at = Some(Utc::now());
            }
        }
    }

    /// Whether the account stayed deactivated past the grace period.
    #[must_use]
    pub fn should_delete(&self, identifier: &str) -> bool {
        let grace = Duration::seconds(self.options.grace_period_secs.min(i64::MAX as u64) as i64);
        self.items.get(identifier).is_some_and(|item| {
            item.deactivated_at
                .is_some_and(|deactivated_at| Utc::now() - deactivated_at >= grace)
        })
    }

    /// Drops tracking for a deleted account.
    pub fn mark_deleted(&mut self, identifier: &str) {
        self.items.remove(identifier);
    }

    /// Number of tracked accounts.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.items.len()
    }

    /// Persists tracker state, if a backing file is configured.
    pub async fn commit(&self) -> EngineResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&self.items)?;
        tokio::fs::write(path, bytes).await?;
        debug!(count = self.items.len(), path = %path.display(), "Saved tracker state");
        Ok(())
    }
}
