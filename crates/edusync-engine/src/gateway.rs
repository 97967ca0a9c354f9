//! Local learning-platform state gateway.
//!
//! The platform's account, container, and membership store is an external
//! collaborator: the engine reads and writes it exclusively through the
//! [`LocalStateGateway`] trait and never touches platform storage
//! directly. Implementations are expected to provide request-level
//! atomicity per single entity write; the engine assumes no cross-entity
//! transactions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors raised by a gateway implementation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The platform rejected the request (validation, missing entity).
    #[error("Gateway rejected request: {0}")]
    Rejected(String),

    /// The platform could not be reached.
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Create a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Create an unavailability error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Role an account holds on the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Default role for synchronized users.
    #[default]
    Base,
    /// Elevated role for staff, granted per the configured role attribute
    /// or staff group membership.
    Elevated,
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Elevated => write!(f, "elevated"),
        }
    }
}

/// An existing platform account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAccount {
    /// Platform-side identifier.
    pub id: String,
    /// Correlation field holding the provider's stable user ID. Accounts
    /// without one are not managed by the sync and are left alone.
    pub external_id: Option<String>,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Whether the account is active.
    pub enabled: bool,
    /// Current role.
    pub role: AccountRole,
}

/// Field set for creating or updating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// Provider's stable user ID, written to the correlation field.
    pub external_id: String,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Role to assign.
    pub role: AccountRole,
}

/// An existing course/category container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalContainer {
    /// Platform-side identifier.
    pub id: String,
    /// Correlation field holding the provider's group ID.
    pub external_id: Option<String>,
    /// Human-readable name.
    pub display_name: String,
    /// Parent category path.
    pub parent_path: String,
}

/// Field set for creating a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContainer {
    /// Provider's group ID, written to the correlation field.
    pub external_id: String,
    /// Human-readable name.
    pub display_name: String,
    /// Parent category path; intermediate categories are created by the
    /// platform as needed.
    pub parent_path: String,
}

/// An existing enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMembership {
    /// Container the membership belongs to.
    pub container_id: String,
    /// Enrolled account's login name.
    pub username: String,
    /// Role within the container.
    pub role: AccountRole,
}

/// Write/read access to the platform's account, container, and membership
/// store.
#[async_trait]
pub trait LocalStateGateway: Send + Sync {
    /// List all sync-managed accounts.
    async fn list_accounts(&self) -> GatewayResult<Vec<LocalAccount>>;

    /// Create an account; returns the stored record.
    async fn create_account(&self, account: &NewAccount) -> GatewayResult<LocalAccount>;

    /// Update an existing account's profile fields and role.
    async fn update_account(&self, id: &str, account: &NewAccount) -> GatewayResult<()>;

    /// Disable (suspend) an account without removing it.
    async fn disable_account(&self, id: &str) -> GatewayResult<()>;

    /// Permanently delete an account.
    async fn delete_account(&self, id: &str) -> GatewayResult<()>;

    /// List all sync-managed containers.
    async fn list_containers(&self) -> GatewayResult<Vec<LocalContainer>>;

    /// Create a container; returns the stored record.
    async fn create_container(&self, container: &NewContainer) -> GatewayResult<LocalContainer>;

    /// List all memberships in sync-managed containers.
    async fn list_memberships(&self) -> GatewayResult<Vec<LocalMembership>>;

    /// Enroll an account into a container with the given role.
    async fn enroll(&self, container_id: &str, username: &str, role: AccountRole)
        -> GatewayResult<()>;

    /// Remove an account's enrollment from a container.
    async fn unenroll(&self, container_id: &str, username: &str) -> GatewayResult<()>;
}
