//! Keycloak connection configuration.

use std::time::Duration;

use secrecy::SecretString;

use edusync_connector::{ConnectorError, ConnectorResult};

/// Connection settings for a Keycloak server.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Server base URL, without trailing slash (e.g. `https://idp.example.org`).
    pub base_url: String,
    /// Realm to read users and groups from.
    pub realm: String,
    /// Service-account client ID.
    pub client_id: String,
    /// Service-account client secret.
    pub client_secret: SecretString,
    /// Whether to verify the server's TLS certificate. On by default;
    /// turning this off is an explicit, logged exception path.
    pub verify_tls: bool,
    /// Entries per page for paginated reads.
    pub page_size: u32,
    /// Timeout for token endpoint requests.
    pub auth_timeout: Duration,
    /// Timeout for bulk read requests.
    pub fetch_timeout: Duration,
}

impl KeycloakConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> KeycloakConfigBuilder {
        KeycloakConfigBuilder::default()
    }

    /// Root of the realm's admin read API.
    #[must_use]
    pub fn admin_url(&self) -> String {
        format!("{}/admin/realms/{}", self.base_url, self.realm)
    }

    /// The realm's `OAuth2` token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, self.realm
        )
    }
}

/// Builder for [`KeycloakConfig`].
#[derive(Debug, Default)]
pub struct KeycloakConfigBuilder {
    base_url: Option<String>,
    realm: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    verify_tls: Option<bool>,
    page_size: Option<u32>,
    auth_timeout: Option<Duration>,
    fetch_timeout: Option<Duration>,
}

impl KeycloakConfigBuilder {
    /// Set the server base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the realm name.
    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Set the client ID.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the client secret.
    #[must_use]
    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Enable or disable TLS certificate verification.
    #[must_use]
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = Some(verify);
        self
    }

    /// Set the page size for paginated reads.
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Set the token endpoint timeout.
    #[must_use]
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = Some(timeout);
        self
    }

    /// Set the bulk read timeout.
    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Config`] when a required field is missing,
    /// the base URL does not parse, or the page size is zero.
    pub fn build(self) -> ConnectorResult<KeycloakConfig> {
        let base_url = self
            .base_url
            .ok_or_else(|| ConnectorError::config("base_url is required"))?;
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| ConnectorError::config(format!("invalid base_url: {e}")))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(ConnectorError::config(format!(
                "unsupported base_url scheme: {}",
                parsed.scheme()
            )));
        }

        let realm = self
            .realm
            .ok_or_else(|| ConnectorError::config("realm is required"))?;
        if realm.is_empty() {
            return Err(ConnectorError::config("realm must not be empty"));
        }

        let client_id = self
            .client_id
            .ok_or_else(|| ConnectorError::config("client_id is required"))?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| ConnectorError::config("client_secret is required"))?;

        let page_size = self.page_size.unwrap_or(50);
        if page_size == 0 {
            return Err(ConnectorError::config("page_size must be positive"));
        }

        Ok(KeycloakConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            realm,
            client_id,
            client_secret: client_secret.into(),
            verify_tls: self.verify_tls.unwrap_or(true),
            page_size,
            auth_timeout: self.auth_timeout.unwrap_or(Duration::from_secs(10)),
            fetch_timeout: self.fetch_timeout.unwrap_or(Duration::from_secs(30)),
        })
    }
}
