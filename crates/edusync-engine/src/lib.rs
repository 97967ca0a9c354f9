//! Phased reconciliation engine for edusync.
//!
//! Drives a deterministic sequence of phases that fetch remote identity
//! state, classify it, diff it against the local learning platform, and
//! apply changes in dependency order (accounts, then containers, then
//! memberships), emitting progress events and collecting per-item errors
//! without aborting the run.
//!
//! The engine talks to the outside world through two seams:
//!
//! - [`edusync_connector::IdentityProvider`] for the remote directory
//! - [`LocalStateGateway`] for the platform's account/container/membership
//!   store
//!
//! [`SyncService`] is the invocation surface: starting a sync returns a
//! run ID immediately while the run executes on a background task;
//! status is polled through read-only [`SyncRun`] snapshots.

mod config;
mod error;
mod gateway;
mod orchestrator;
mod plan;
mod progress;
mod run;
mod service;
mod tracker;

pub use config::{SyncOptions, TrackerOptions};
pub use error::{EngineError, EngineResult};
pub use gateway::{
    AccountRole, GatewayError, GatewayResult, LocalAccount, LocalContainer, LocalMembership,
    LocalStateGateway, NewAccount, NewContainer,
};
pub use orchestrator::SyncEngine;
pub use plan::{
    AccountPlan, ContainerPlan, MembershipPlan, PlanSummary, PlannedAccount, PlannedContainer,
    PlannedMembership, PlannedUpdate, SyncPlan,
};
pub use progress::{ProgressCallback, ProgressUpdate};
pub use run::{ItemError, RunEvent, RunStatus, SyncPhase, SyncRun, SyncStats};
pub use service::SyncService;
pub use tracker::DeactivationTracker;
