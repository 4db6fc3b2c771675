//! Slippage bounds and recommendations

use alloy_primitives::U256;

use crate::constants::fees::BPS_DENOM;
use crate::state::{AmmError, PriceImpact};

/// Reject tolerances at or above 100%
pub fn validate_slippage(slippage_bps: u16) -> Result<(), AmmError> {
    if slippage_bps as u64 >= BPS_DENOM {
        return Err(AmmError::InvalidAmount(format!(
            "slippage {} bps must be below {}",
            slippage_bps, BPS_DENOM
        )));
    }
    Ok(())
}

/// floor(amount_out * (10000 - slippage_bps) / 10000)
pub fn minimum_received(amount_out: U256, slippage_bps: u16) -> U256 {
    let keep = BPS_DENOM.saturating_sub(slippage_bps as u64);
    match amount_out.checked_mul(U256::from(keep)) {
        Some(scaled) => scaled / U256::from(BPS_DENOM),
        // Divide first when the product would overflow; still rounds down
        None => amount_out / U256::from(BPS_DENOM) * U256::from(keep),
    }
}

/// ceil(amount_in * (10000 + slippage_bps) / 10000)
pub fn maximum_input(amount_in: U256, slippage_bps: u16) -> Result<U256, AmmError> {
    let factor = U256::from(BPS_DENOM + slippage_bps as u64);
    let denom = U256::from(BPS_DENOM);
    let scaled = amount_in
        .checked_mul(factor)
        .ok_or(AmmError::Overflow("maximum input"))?;
    Ok(scaled.div_ceil(denom))
}

/// Slippage to suggest when the impact exceeds `threshold_bps`.
///
/// The suggestion is impact + margin, capped below 100%. It is only ever
/// surfaced to the caller; quotes keep the tolerance they were asked with.
pub fn recommended_slippage(
    impact: PriceImpact,
    threshold_bps: u16,
    margin_bps: u16,
) -> Option<u16> {
    let impact_bps = impact.bps_ceil()?;
    if impact_bps <= threshold_bps as u32 {
        return None;
    }
    let suggested = impact_bps
        .saturating_add(margin_bps as u32)
        .min(BPS_DENOM as u32 - 1);
    u16::try_from(suggested).ok()
}

/// Raise a recommendation to `floor_bps` for tokens that tax transfers.
/// `None` when the current tolerance already covers it.
pub fn with_transfer_fee_floor(
    recommended: Option<u16>,
    current_bps: u16,
    floor_bps: u16,
) -> Option<u16> {
    let floor = recommended.unwrap_or(0).max(floor_bps);
    (floor > current_bps).then_some(floor)
}
