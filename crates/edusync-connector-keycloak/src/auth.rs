//! `OAuth2` client-credentials authentication against Keycloak.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use edusync_connector::{ConnectorError, ConnectorResult};

use crate::config::KeycloakConfig;

/// Token response from the `OpenID` Connect token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Machine-readable error body returned by Keycloak.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Cached access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Token cache for the service account's client-credentials grant.
///
/// Tokens are cached in memory for their advertised lifetime and refreshed
/// transparently. The refresh is single-flight: concurrent callers hitting
/// an expired token trigger exactly one token request.
#[derive(Debug)]
pub struct TokenCache {
    config: KeycloakConfig,
    http_client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
    /// Grace period before expiry to trigger refresh.
    grace_period: Duration,
}

impl TokenCache {
    /// Creates a new token cache sharing the connector's HTTP client.
    #[must_use]
    pub fn new(config: KeycloakConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
            cached_token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            grace_period: Duration::seconds(30),
        }
    }

    /// Gets a valid access token, refreshing if necessary.
    #[instrument(skip(self), fields(realm = %self.config.realm))]
    pub async fn get_token(&self) -> ConnectorResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    debug!("Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        // Single-flight: only one caller performs the refresh, the rest
        // wait on the lock and pick up the fresh token from the cache.
        let _guard = self.refresh_lock.lock().await;
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Refreshing access token");
        let new_token = self.acquire_token().await?;

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Acquires a new access token using the client-credentials flow.
    async fn acquire_token(&self) -> ConnectorResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", &self.config.client_id),
            ("client_secret", self.config.client_secret.expose_secret()),
        ];

        let response = self
            .http_client
            .post(self.config.token_url())
            .timeout(self.config.auth_timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ConnectorError::connectivity(format!("token endpoint unreachable: {e}"))
                } else {
                    ConnectorError::auth(format!("token request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorBody>(&body)
                .map(|e| {
                    let description = e.error_description.unwrap_or_default();
                    format!("{}: {description}", e.error)
                })
                .unwrap_or(body);
            warn!(status = %status, "Token request rejected");
            return Err(ConnectorError::auth(format!(
                "token request failed with status {status}: {detail}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::auth(format!("failed to parse token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);
        debug!(%expires_at, "Acquired new token");

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    /// Invalidates the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
