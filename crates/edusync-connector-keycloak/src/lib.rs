//! Keycloak connector for edusync.
//!
//! This crate implements the [`edusync_connector::IdentityProvider`] trait
//! against the Keycloak admin REST API:
//!
//! - `OAuth2` client-credentials authentication with an in-memory token
//!   cache and single-flight refresh
//! - Paginated user/group/member reads with bounded per-page retry
//! - Connectivity diagnostics
//!
//! # Example
//!
//! ```no_run
//! use edusync_connector::IdentityProvider;
//! use edusync_connector_keycloak::{KeycloakClient, KeycloakConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KeycloakConfig::builder()
//!     .base_url("https://idp.example.org")
//!     .realm("school")
//!     .client_id("edusync")
//!     .client_secret("secret")
//!     .build()?;
//!
//! let client = KeycloakClient::new(config)?;
//! let status = client.test_connection().await?;
//! println!("connected: {}", status.detail);
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;

pub use auth::TokenCache;
pub use client::{KeycloakClient, RetryPolicy};
pub use config::{KeycloakConfig, KeycloakConfigBuilder};
