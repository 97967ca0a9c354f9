//! Keycloak admin REST API client with pagination and bounded retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use edusync_connector::{
    ConnectionStatus, ConnectorError, ConnectorResult, IdentityProvider, RemoteGroup, RemoteUser,
};

use crate::auth::TokenCache;
use crate::config::KeycloakConfig;

/// Machine-readable error body returned by the admin API.
#[derive(Debug, serde::Deserialize)]
struct AdminErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "errorMessage")]
    error_message: Option<String>,
}

/// Retry bounds for a single page fetch.
///
/// A transient page failure is retried with exponential backoff; once the
/// attempts are exhausted the fetch is aborted with a
/// [`ConnectorError::PageFetch`]. Pages yielded before the failure stay
/// valid.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given zero-based attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Keycloak admin API client.
///
/// Implements [`IdentityProvider`] with offset/limit pagination
/// (`first`/`max` query parameters) and transparent token refresh on 401.
#[derive(Debug)]
pub struct KeycloakClient {
    config: KeycloakConfig,
    http_client: reqwest::Client,
    token_cache: Arc<TokenCache>,
    retry: RetryPolicy,
}

impl KeycloakClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] if the HTTP client cannot be built.
    pub fn new(config: KeycloakConfig) -> ConnectorResult<Self> {
        Self::with_retry_policy(config, RetryPolicy::default())
    }

    /// Creates a new client with custom page retry bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] if the HTTP client cannot be built.
    pub fn with_retry_policy(config: KeycloakConfig, retry: RetryPolicy) -> ConnectorResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.fetch_timeout);

        if !config.verify_tls {
            warn!(
                base_url = %config.base_url,
                "TLS certificate verification is DISABLED for this connector"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http_client = builder
            .build()
            .map_err(|e| ConnectorError::config(format!("failed to create HTTP client: {e}")))?;

        let token_cache = Arc::new(TokenCache::new(config.clone(), http_client.clone()));

        Ok(Self {
            config,
            http_client,
            token_cache,
            retry,
        })
    }

    /// The token cache backing this client.
    #[must_use]
    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.token_cache
    }

    /// Performs an authenticated GET, refreshing the token once on 401.
    async fn get_json(&self, url: &str) -> ConnectorResult<serde_json::Value> {
        let mut refreshed = false;

        loop {
            let token = self.token_cache.get_token().await?;

            let response = self
                .http_client
                .get(url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() || e.is_connect() {
                        ConnectorError::connectivity(format!("request to {url} failed: {e}"))
                    } else {
                        ConnectorError::Http(e)
                    }
                })?;

            let status = response.status();

            // Expired token mid-run: invalidate and retry once with a
            // freshly acquired token.
            if status == reqwest::StatusCode::UNAUTHORIZED && !refreshed {
                debug!("Got 401, refreshing token and retrying");
                self.token_cache.invalidate().await;
                refreshed = true;
                continue;
            }

            if status.is_success() {
                return response.json().await.map_err(ConnectorError::from);
            }

            let body = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<AdminErrorBody>(&body)
                .ok()
                .and_then(|e| e.error.or(e.error_message));
            return Err(ConnectorError::protocol(status.as_u16(), code, body));
        }
    }

    /// Fetches one page, retrying transient failures within the policy.
    async fn fetch_page(&self, url: &str, offset: u32) -> ConnectorResult<Vec<serde_json::Value>> {
        let mut attempt = 0;

        loop {
            match self.get_json(url).await {
                Ok(serde_json::Value::Array(items)) => return Ok(items),
                Ok(other) => {
                    return Err(ConnectorError::page_fetch(
                        offset,
                        format!("expected a JSON array, got: {other}"),
                    ))
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        offset,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Page fetch failed, retrying after {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(ConnectorError::page_fetch(offset, e.to_string()))
                }
                // Auth, config, and client-side protocol errors propagate
                // as themselves, not as page failures.
                Err(e) => return Err(e),
            }
        }
    }

    /// Walks an offset-paginated listing to the end.
    async fn fetch_paginated(
        &self,
        path: &str,
        extra_query: &str,
    ) -> ConnectorResult<Vec<serde_json::Value>> {
        let mut all = Vec::new();
        let mut first = 0u32;
        let page_size = self.config.page_size;

        loop {
            let url = format!(
                "{}{path}?first={first}&max={page_size}{extra_query}",
                self.config.admin_url()
            );
            debug!(%url, "Fetching page");

            let batch = self.fetch_page(&url, first).await?;
            let batch_len = batch.len();
            all.extend(batch);

            // A short page means the listing is exhausted; offset paging
            // has no explicit next-link.
            if batch_len < page_size as usize {
                return Ok(all);
            }
            first += page_size;
        }
    }

    /// Flattens a group tree (`subGroups`) into a single list.
    fn collect_groups(
        value: &serde_json::Value,
        out: &mut Vec<RemoteGroup>,
    ) -> ConnectorResult<()> {
        out.push(RemoteGroup::from_json(value)?);
        if let Some(children) = value.get("subGroups").and_then(|v| v.as_array()) {
            for child in children {
                Self::collect_groups(child, out)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    #[instrument(skip(self))]
    async fn fetch_users(&self) -> ConnectorResult<Vec<RemoteUser>> {
        info!("Fetching users from Keycloak");

        // Advisory only: providers may report stale counts, so a mismatch
        // is logged and otherwise ignored.
        let expected = match self.count_users().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Could not get user count");
                None
            }
        };

        let raw = self
            .fetch_paginated("/users", "&briefRepresentation=false")
            .await?;

        let mut users = Vec::with_capacity(raw.len());
        for value in &raw {
            match RemoteUser::from_json(value) {
                Ok(user) => users.push(user),
                Err(e) => warn!(error = %e, "Failed to parse user record, skipping"),
            }
        }

        if let Some(expected) = expected {
            if expected as usize != users.len() {
                warn!(
                    expected,
                    fetched = users.len(),
                    "User count reported by provider does not match fetched total"
                );
            }
        }

        info!(count = users.len(), "Fetched users");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn fetch_groups(&self) -> ConnectorResult<Vec<RemoteGroup>> {
        info!("Fetching groups from Keycloak");

        let raw = self
            .fetch_paginated("/groups", "&briefRepresentation=false")
            .await?;

        let mut groups = Vec::new();
        for value in &raw {
            if let Err(e) = Self::collect_groups(value, &mut groups) {
                warn!(error = %e, "Failed to parse group record, skipping");
            }
        }

        info!(count = groups.len(), "Fetched groups");
        Ok(groups)
    }

    #[instrument(skip(self))]
    async fn fetch_group_members(&self, group_id: &str) -> ConnectorResult<Vec<String>> {
        let path = format!("/groups/{}/members", urlencoding::encode(group_id));
        let raw = self.fetch_paginated(&path, "").await?;

        Ok(raw
            .iter()
            .filter_map(|v| v.get("username").and_then(|u| u.as_str()))
            .map(String::from)
            .collect())
    }

    async fn count_users(&self) -> ConnectorResult<u32> {
        let url = format!("{}/users/count", self.config.admin_url());
        let value = self.get_json(&url).await?;

        value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                ConnectorError::protocol(200, None, format!("unexpected count body: {value}"))
            })
    }

    #[instrument(skip(self))]
    async fn test_connection(&self) -> ConnectorResult<ConnectionStatus> {
        match self.count_users().await {
            Ok(count) => Ok(ConnectionStatus {
                ok: true,
                detail: format!(
                    "realm '{}' reachable, {count} users visible",
                    self.config.realm
                ),
            }),
            Err(e @ ConnectorError::Auth(_)) => Err(e),
            Err(e) => Ok(ConnectionStatus {
                ok: false,
                detail: e.to_string(),
            }),
        }
    }
}
