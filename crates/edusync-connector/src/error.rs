//! Error types shared by identity provider connectors.

use thiserror::Error;

/// Result type alias using [`ConnectorError`].
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Errors that can occur when talking to an identity provider.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication against the token endpoint failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The provider could not be reached (DNS, connect, timeout).
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The provider answered with a non-2xx response.
    #[error("Protocol error ({status}): {message}")]
    Protocol {
        /// HTTP status code of the response.
        status: u16,
        /// Provider error code when the body was machine-readable.
        code: Option<String>,
        /// Human-readable error detail.
        message: String,
    },

    /// A single page of a paginated fetch failed after exhausting retries.
    ///
    /// Pages yielded before this offset remain valid; only the fetch as a
    /// whole is aborted.
    #[error("Page fetch failed at offset {offset}: {message}")]
    PageFetch {
        /// Offset of the page that failed.
        offset: u32,
        /// Description of the last attempt's failure.
        message: String,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConnectorError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity(message.into())
    }

    /// Create a protocol error from a status code and response body detail.
    pub fn protocol(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            status,
            code,
            message: message.into(),
        }
    }

    /// Create a page fetch error.
    pub fn page_fetch(offset: u32, message: impl Into<String>) -> Self {
        Self::PageFetch {
            offset,
            message: message.into(),
        }
    }

    /// Whether a retry of the same request may succeed.
    ///
    /// Transport failures and server-side 5xx responses are considered
    /// transient; authentication, configuration, and client-side protocol
    /// errors are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connectivity(_) => true,
            Self::Protocol { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Whether this error aborts the entire run when raised during fetching.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Auth(_) | Self::Config(_) | Self::Connectivity(_) | Self::PageFetch { .. }
        )
    }
}
