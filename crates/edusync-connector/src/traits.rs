//! Identity provider trait.
//!
//! Capability-based trait definition for directory connectors. The
//! reconciliation engine depends only on this trait, never on a concrete
//! provider client.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::types::{RemoteGroup, RemoteUser};

/// Result of a connectivity probe.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    /// Whether the provider answered an authenticated request.
    pub ok: bool,
    /// Human-readable detail (server version, error description).
    pub detail: String,
}

/// Read access to an external identity provider.
///
/// Fetches are finite and restartable per run: calling a fetch method
/// again starts a fresh paginated read of the provider's current state.
/// Implementations perform no local writes; network I/O is the only side
/// effect.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch all users, page by page.
    ///
    /// A transient page failure is retried internally; a page that cannot
    /// be fetched within the retry bounds aborts the fetch with
    /// [`ConnectorError::PageFetch`](crate::ConnectorError::PageFetch).
    async fn fetch_users(&self) -> ConnectorResult<Vec<RemoteUser>>;

    /// Fetch all groups, page by page.
    async fn fetch_groups(&self) -> ConnectorResult<Vec<RemoteGroup>>;

    /// Fetch the usernames of a group's members, page by page.
    async fn fetch_group_members(&self, group_id: &str) -> ConnectorResult<Vec<String>>;

    /// Total user count as reported by the provider.
    ///
    /// Providers may report stale counts; callers must treat the value as
    /// advisory and never fail a fetch over a mismatch.
    async fn count_users(&self) -> ConnectorResult<u32>;

    /// Probe connectivity and authentication.
    async fn test_connection(&self) -> ConnectorResult<ConnectionStatus>;
}
