//! Mapping provider and protocol failures onto user-facing error kinds

use std::fmt;

use amm::AmmError;
use serde::{Deserialize, Serialize};
use twinroute_core::ProviderError;

/// Longest raw provider message carried into a [`TxError`]
const MAX_RAW_MESSAGE: usize = 160;

/// EIP-1193 user rejection
const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxErrorKind {
    UserRejected,
    ProviderUnavailable,
    InsufficientLiquidity,
    InsufficientBalance,
    InsufficientAllowance,
    QuoteStale,
    TransactionFailed,
    ConfirmationTimeout,
    InvalidToken,
}

impl TxErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRejected => "user_rejected",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::InsufficientLiquidity => "insufficient_liquidity",
            Self::InsufficientBalance => "insufficient_balance",
            Self::InsufficientAllowance => "insufficient_allowance",
            Self::QuoteStale => "quote_stale",
            Self::TransactionFailed => "transaction_failed",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::InvalidToken => "invalid_token",
        }
    }

    /// HTTP status when surfaced through the API
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidToken => 400,
            Self::UserRejected => 409,
            Self::InsufficientLiquidity
            | Self::InsufficientBalance
            | Self::InsufficientAllowance
            | Self::QuoteStale
            | Self::TransactionFailed => 422,
            Self::ProviderUnavailable => 503,
            Self::ConfirmationTimeout => 504,
        }
    }
}

impl fmt::Display for TxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure with a human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxError {
    pub kind: TxErrorKind,
    pub message: String,
}

impl TxError {
    pub fn new(kind: TxErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TxError {}

impl From<ProviderError> for TxError {
    fn from(e: ProviderError) -> Self {
        classify_provider_error(&e)
    }
}

impl From<AmmError> for TxError {
    fn from(e: AmmError) -> Self {
        match &e {
            AmmError::Provider(inner) => classify_provider_error(inner),
            AmmError::InsufficientLiquidity | AmmError::PoolNotFound(_) => {
                TxError::new(TxErrorKind::InsufficientLiquidity, e.to_string())
            }
            AmmError::InvalidToken(_) => TxError::new(TxErrorKind::InvalidToken, e.to_string()),
            AmmError::InvalidAmount(_) | AmmError::Overflow(_) => {
                TxError::new(TxErrorKind::QuoteStale, e.to_string())
            }
        }
    }
}

/// Classify a write-path provider failure by code, then by message text
pub fn classify_provider_error(error: &ProviderError) -> TxError {
    match error {
        ProviderError::Unreachable { .. } | ProviderError::Timeout { .. } => {
            TxError::new(TxErrorKind::ProviderUnavailable, error.to_string())
        }
        ProviderError::Rpc {
            code,
            message,
            data,
        } => {
            if *code == USER_REJECTED_CODE {
                return TxError::new(TxErrorKind::UserRejected, "request rejected in wallet");
            }
            let text = match data {
                Some(data) => format!("{} {}", message, data),
                None => message.clone(),
            };
            classify_message(&text)
        }
        ProviderError::ChainMismatch { .. } | ProviderError::NoAccounts => {
            TxError::new(TxErrorKind::ProviderUnavailable, error.to_string())
        }
        ProviderError::ParseError(message) => {
            tracing::warn!(error = %message, "Malformed provider response");
            TxError::new(TxErrorKind::ProviderUnavailable, truncate(message))
        }
    }
}

/// Match revert reasons and wallet messages
pub fn classify_message(raw: &str) -> TxError {
    let lower = raw.to_ascii_lowercase();
    let kind = if lower.contains("user rejected")
        || lower.contains("user denied")
        || lower.contains("denied transaction")
    {
        TxErrorKind::UserRejected
    } else if lower.contains("insufficient funds") {
        TxErrorKind::InsufficientBalance
    } else if lower.contains("insufficient_liquidity") {
        TxErrorKind::InsufficientLiquidity
    } else if lower.contains("transfer_from_failed") || lower.contains("allowance") {
        TxErrorKind::InsufficientAllowance
    } else if lower.contains("expired")
        || lower.contains("insufficient_output_amount")
        || lower.contains("excessive_input_amount")
    {
        TxErrorKind::QuoteStale
    } else if lower.contains("execution reverted") || lower.contains("revert") {
        TxErrorKind::TransactionFailed
    } else if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("network")
        || lower.contains("connection")
    {
        TxErrorKind::ProviderUnavailable
    } else {
        tracing::debug!(error = %raw, "Unrecognized provider error, mapping to transaction failure");
        TxErrorKind::TransactionFailed
    };
    TxError::new(kind, truncate(raw))
}

fn truncate(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= MAX_RAW_MESSAGE {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_RAW_MESSAGE).collect();
    out.push_str("...");
    out
}
