/*
[INPUT]:  Error sources (strategy backends, HTTP, serialization, storage)
[OUTPUT]: Structured error types with capability and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::Capability;

/// Main error type for wallet-kit
#[derive(Error, Debug)]
pub enum WalletError {
    /// Operation requires an active strategy and none is selected
    #[error("No wallet strategy selected")]
    NoStrategySelected,

    /// Strategy id is not registered and cannot be created lazily
    #[error("Unknown wallet strategy: {0}")]
    UnknownStrategy(String),

    /// Optional operation is not offered by the active strategy
    #[error("Strategy '{strategy}' does not support {capability}")]
    CapabilityUnsupported {
        strategy: String,
        capability: Capability,
    },

    /// The wrapped wallet or SDK call failed
    #[error("Wallet backend '{strategy}' failed: {message}")]
    Backend { strategy: String, message: String },

    /// Backend cannot be used in this environment (e.g. extension not injected)
    #[error("Wallet backend unavailable: {0}")]
    Unavailable(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Session store read or write failed
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Invalid response from server or wallet
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalletError {
    /// Shorthand for a backend failure carrying the strategy id
    pub fn backend(strategy: impl Into<String>, message: impl ToString) -> Self {
        WalletError::Backend {
            strategy: strategy.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for an absent optional operation
    pub fn unsupported(strategy: impl Into<String>, capability: Capability) -> Self {
        WalletError::CapabilityUnsupported {
            strategy: strategy.into(),
            capability,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::Http(_) | WalletError::Backend { .. } | WalletError::InvalidResponse(_)
        )
    }

    /// Check if the error reports a missing optional operation
    pub fn is_capability_error(&self) -> bool {
        matches!(self, WalletError::CapabilityUnsupported { .. })
    }

    /// Check if the error indicates the session is gone on the backend side
    pub fn is_auth_error(&self) -> bool {
        matches!(self, WalletError::Api { code: 401 | 403, .. })
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        WalletError::Api {
            code: status.as_u16() as i32,
            message: message.into(),
        }
    }
}

/// Result type alias for wallet-kit operations
pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let backend_err = WalletError::backend("wander", "popup closed");
        assert!(backend_err.is_retryable());

        assert!(!WalletError::NoStrategySelected.is_retryable());
        assert!(!WalletError::Unavailable("no extension".into()).is_retryable());
    }

    #[test]
    fn test_capability_error() {
        let err = WalletError::unsupported("ethereum", Capability::Encrypt);
        assert!(err.is_capability_error());
        assert_eq!(
            err.to_string(),
            "Strategy 'ethereum' does not support encrypt"
        );
    }

    #[test]
    fn test_api_error_creation() {
        let err = WalletError::api_error(StatusCode::UNAUTHORIZED, "token expired");
        assert!(err.is_auth_error());
        match err {
            WalletError::Api { code, message } => {
                assert_eq!(code, 401);
                assert_eq!(message, "token expired");
            }
            _ => panic!("Expected Api error variant"),
        }
    }
}
