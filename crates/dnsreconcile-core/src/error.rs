//! Error types for the reconciliation engine
//!
//! Zone-level failures (`Config`, `Fetch`) abort a single zone. A failing
//! correction is wrapped in `Correction` and recorded without stopping the
//! remaining corrections of that zone.

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reconciliation engine
#[derive(Error, Debug)]
pub enum Error {
    /// Desired state is structurally invalid or asks for an unsupported capability
    #[error("Configuration error: {0}")]
    Config(String),

    /// Existing records could not be retrieved; the zone is never diffed
    #[error("Fetch error for zone {zone}: {message}")]
    Fetch {
        /// Zone being reconciled
        zone: String,
        /// Underlying failure
        message: String,
    },

    /// One correction's action failed
    #[error("Correction failed ({correction}): {message}")]
    Correction {
        /// First line of the correction's description
        correction: String,
        /// Underlying failure
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A zone worker ended without reporting (panicked or was aborted)
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a fetch error for a zone
    pub fn fetch(zone: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            zone: zone.into(),
            message: message.into(),
        }
    }

    /// Create a correction error
    pub fn correction(correction: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Correction {
            correction: correction.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Message without the variant's prefix
    ///
    /// Used when one error is folded into another's context.
    pub fn message(&self) -> String {
        match self {
            Error::Config(msg) | Error::InvalidInput(msg) | Error::Other(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
