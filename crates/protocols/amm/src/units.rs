//! Decimal strings <-> base units
//!
//! Amounts are U256 base units everywhere inside the engine; these helpers
//! are used only at the presentation boundary.

use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::U256;
use twinroute_core::MAX_TOKEN_DECIMALS;

use crate::state::AmmError;

/// Parse a user-entered decimal amount ("1.5") into base units
pub fn parse_amount(raw: &str, decimals: u8) -> Result<U256, AmmError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmmError::InvalidAmount("amount is empty".to_string()));
    }
    if trimmed.starts_with('-') {
        return Err(AmmError::InvalidAmount(format!("negative amount: {}", trimmed)));
    }
    check_decimals(decimals)?;

    let fraction_digits = trimmed.split_once('.').map(|(_, f)| f.len()).unwrap_or(0);
    if fraction_digits > decimals as usize {
        return Err(AmmError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            trimmed, decimals
        )));
    }

    parse_units(trimmed, decimals)
        .map(|parsed| parsed.get_absolute())
        .map_err(|e| AmmError::InvalidAmount(format!("{}: {}", trimmed, e)))
}

/// Format base units as a decimal string without trailing zeros
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    match format_units(amount, decimals) {
        Ok(s) => trim_fraction(s),
        Err(_) => amount.to_string(),
    }
}

/// Base units to a float, for display ratios only
pub fn to_display_f64(amount: U256, decimals: u8) -> f64 {
    format_amount(amount, decimals).parse().unwrap_or(0.0)
}

fn check_decimals(decimals: u8) -> Result<(), AmmError> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(AmmError::InvalidToken(format!(
            "{} decimals exceeds {}",
            decimals, MAX_TOKEN_DECIMALS
        )));
    }
    Ok(())
}

fn trim_fraction(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
