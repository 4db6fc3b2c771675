//! Core type definitions for twinroute

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

pub use alloy_primitives::{TxHash, U256};

/// Highest decimals value a token may declare (10^77 still fits in a U256).
pub const MAX_TOKEN_DECIMALS: u8 = 77;

/// Sentinel address used for the chain's native coin in quotes and paths.
pub const NATIVE_SENTINEL: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

/// Identifies one of the two competing routers.
///
/// `Primary` is the chain's native router and always wins ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterId {
    Primary,
    Secondary,
}

impl RouterId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    /// Routers in evaluation order.
    pub const PRIORITY: [RouterId; 2] = [RouterId::Primary, RouterId::Secondary];
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of wallet behind the provider connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    Injected,
    WalletConnect,
    Hardware,
    Other,
}

impl WalletKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Injected => "injected",
            Self::WalletConnect => "wallet_connect",
            Self::Hardware => "hardware",
            Self::Other => "other",
        }
    }
}

/// Connected-account context supplied by the calling application.
///
/// Replaces any ambient lookup of "the current wallet": every flow receives
/// the session it acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account: Address,
    pub wallet: WalletKind,
}

impl Session {
    pub fn new(account: Address, wallet: WalletKind) -> Self {
        Self { account, wallet }
    }
}

/// Parse a `0x`-prefixed 40-hex-digit address, any letter case.
pub fn parse_address(raw: &str) -> Result<Address, ProtocolError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| ProtocolError::InvalidToken {
            reason: format!("address must start with 0x: {}", trimmed),
        })?;

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ProtocolError::InvalidToken {
            reason: format!("address must be 40 hex digits: {}", trimmed),
        });
    }

    Address::from_str(&digits.to_ascii_lowercase()).map_err(|e| ProtocolError::InvalidToken {
        reason: format!("invalid address {}: {}", trimmed, e),
    })
}

/// Lowercase `0x` hex form used for address comparison and sorting.
pub fn lowercase_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Token descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    pub address: Address,
    pub decimals: u8,
    /// Reference price in USD, display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<f64>,
    /// Added by the user rather than shipped in the default list
    #[serde(default)]
    pub imported: bool,
}

impl Token {
    /// Build a validated token from raw user/list input.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        address: &str,
        decimals: u8,
    ) -> Result<Self, ProtocolError> {
        let address = parse_address(address)?;
        Self::from_parts(symbol.into(), name.into(), address, decimals)
    }

    pub fn from_parts(
        symbol: String,
        name: String,
        address: Address,
        decimals: u8,
    ) -> Result<Self, ProtocolError> {
        if decimals > MAX_TOKEN_DECIMALS {
            return Err(ProtocolError::InvalidToken {
                reason: format!(
                    "{} declares {} decimals (max {})",
                    symbol, decimals, MAX_TOKEN_DECIMALS
                ),
            });
        }
        if symbol.trim().is_empty() {
            return Err(ProtocolError::InvalidToken {
                reason: "token symbol is empty".to_string(),
            });
        }
        Ok(Self {
            symbol,
            name,
            address,
            decimals,
            reference_price: None,
            imported: false,
        })
    }

    pub fn imported(mut self) -> Self {
        self.imported = true;
        self
    }

    pub fn with_reference_price(mut self, price: f64) -> Self {
        self.reference_price = Some(price);
        self
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, lowercase_hex(&self.address))
    }
}
