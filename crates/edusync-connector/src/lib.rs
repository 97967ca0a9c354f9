//! Shared connector vocabulary for edusync.
//!
//! This crate defines the types and traits that sit between the identity
//! provider connectors and the reconciliation engine:
//!
//! - [`RemoteUser`] / [`RemoteGroup`]: immutable per-run snapshots of the
//!   provider's directory state
//! - [`IdentityProvider`]: the capability trait a provider connector
//!   implements (paginated reads plus connectivity diagnostics)
//! - [`ConnectorError`]: the error taxonomy shared by all connectors

mod error;
mod traits;
mod types;

pub use error::{ConnectorError, ConnectorResult};
pub use traits::{ConnectionStatus, IdentityProvider};
pub use types::{RemoteGroup, RemoteUser};
