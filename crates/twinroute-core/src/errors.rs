//! Error types for twinroute

use thiserror::Error;

/// Core errors that can occur in twinroute
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Wallet-provider connection and request errors
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider unreachable at {url}")]
    Unreachable { url: String },

    #[error("Provider returned error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<String>,
    },

    #[error("Provider request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Provider is on chain {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Provider exposes no accounts")]
    NoAccounts,
}

impl ProviderError {
    /// JSON-RPC error code when the provider answered with one
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Transport-level failures that a retry may fix
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable { .. } | Self::Timeout { .. } => true,
            // -32005: limit exceeded, -32603: internal error (often upstream flakiness)
            Self::Rpc { code, .. } => matches!(*code, -32005 | -32603 | 429),
            _ => false,
        }
    }
}

/// Protocol-level validation errors
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("Invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    #[error("Unsupported pair: {reason}")]
    UnsupportedPair { reason: String },

    #[error("Insufficient balance of {token}: need {required}, have {available}")]
    InsufficientBalance {
        token: String,
        required: String,
        available: String,
    },
}

/// Result type alias for twinroute operations
pub type Result<T> = std::result::Result<T, Error>;

impl ProtocolError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken { .. } => "invalid_token",
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::UnsupportedPair { .. } => "unsupported_pair",
            Self::InsufficientBalance { .. } => "insufficient_balance",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidToken { .. } | Self::InvalidAmount { .. } => 400,
            Self::UnsupportedPair { .. } | Self::InsufficientBalance { .. } => 422,
        }
    }
}
