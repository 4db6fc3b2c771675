//! AMM Calculator
//!
//! Swap and liquidity math using the constant product formula (x * y = k).
//! All arithmetic is checked U256; rounding always favors the pool.

use alloy_primitives::{U256, U512};

use crate::constants::{
    fees::{FEE_DENOM, PPM},
    lp::MINIMUM_LIQUIDITY,
};
use crate::state::AmmError;

/// Upper bound on upward corrections of a reverse quote
const MAX_INPUT_NUDGES: usize = 4;

/// One constant-product hop as seen from the input side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub reserve_in: U256,
    pub reserve_out: U256,
    pub fee_bps: u16,
}

impl Leg {
    pub fn new(reserve_in: U256, reserve_out: U256, fee_bps: u16) -> Self {
        Self {
            reserve_in,
            reserve_out,
            fee_bps,
        }
    }
}

fn fee_factor(fee_bps: u16) -> Result<U256, AmmError> {
    FEE_DENOM
        .checked_sub(fee_bps as u64)
        .filter(|f| *f > 0)
        .map(U256::from)
        .ok_or_else(|| AmmError::InvalidAmount(format!("fee {} bps out of range", fee_bps)))
}

/// Calculate swap output using the constant product formula.
///
/// after_fee = floor(amount_in * (FEE_DENOM - fee) / FEE_DENOM)
/// output    = floor(reserve_out * after_fee / (reserve_in + after_fee))
pub fn calculate_output(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u16,
) -> Result<U256, AmmError> {
    if amount_in.is_zero() {
        return Err(AmmError::InvalidAmount("input amount is zero".to_string()));
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(AmmError::InsufficientLiquidity);
    }

    let after_fee = amount_in
        .checked_mul(fee_factor(fee_bps)?)
        .ok_or(AmmError::Overflow("fee adjustment"))?
        / U256::from(FEE_DENOM);

    let numerator = reserve_out
        .checked_mul(after_fee)
        .ok_or(AmmError::Overflow("output numerator"))?;
    let denominator = reserve_in
        .checked_add(after_fee)
        .ok_or(AmmError::Overflow("output denominator"))?;

    Ok(numerator / denominator)
}

/// Calculate required input for a desired output (reverse calculation).
///
/// input = reserve_in * amount_out * FEE_DENOM / ((reserve_out - amount_out) * (FEE_DENOM - fee)) + 1
///
/// The `+ 1` is applied on every hop. Because the forward formula truncates
/// the fee-adjusted input, the candidate is then raised in single units
/// (bounded) until `calculate_output` covers `amount_out`.
pub fn calculate_input(
    amount_out: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u16,
) -> Result<U256, AmmError> {
    if amount_out.is_zero() {
        return Err(AmmError::InvalidAmount("output amount is zero".to_string()));
    }
    if reserve_in.is_zero() || reserve_out.is_zero() || amount_out >= reserve_out {
        return Err(AmmError::InsufficientLiquidity);
    }

    let numerator = reserve_in
        .checked_mul(amount_out)
        .and_then(|v| v.checked_mul(U256::from(FEE_DENOM)))
        .ok_or(AmmError::Overflow("input numerator"))?;
    let denominator = (reserve_out - amount_out)
        .checked_mul(fee_factor(fee_bps)?)
        .ok_or(AmmError::Overflow("input denominator"))?;

    let mut candidate = (numerator / denominator)
        .checked_add(U256::from(1))
        .ok_or(AmmError::Overflow("input rounding"))?;

    for _ in 0..MAX_INPUT_NUDGES {
        if calculate_output(candidate, reserve_in, reserve_out, fee_bps)? >= amount_out {
            break;
        }
        candidate = candidate
            .checked_add(U256::from(1))
            .ok_or(AmmError::Overflow("input rounding"))?;
    }

    Ok(candidate)
}

/// Chain `calculate_output` through each leg
pub fn quote_path_output(amount_in: U256, legs: &[Leg]) -> Result<U256, AmmError> {
    if legs.is_empty() {
        return Err(AmmError::PoolNotFound("empty path".to_string()));
    }
    legs.iter().try_fold(amount_in, |amount, leg| {
        let out = calculate_output(amount, leg.reserve_in, leg.reserve_out, leg.fee_bps)?;
        if out.is_zero() {
            return Err(AmmError::InsufficientLiquidity);
        }
        Ok(out)
    })
}

/// Work backwards through the legs with `calculate_input`
pub fn quote_path_input(amount_out: U256, legs: &[Leg]) -> Result<U256, AmmError> {
    if legs.is_empty() {
        return Err(AmmError::PoolNotFound("empty path".to_string()));
    }
    legs.iter().rev().try_fold(amount_out, |needed, leg| {
        calculate_input(needed, leg.reserve_in, leg.reserve_out, leg.fee_bps)
    })
}

/// Price impact in parts per million.
///
/// impact = 1 - (amount_out / amount_in) / prod(reserve_out / reserve_in)
///
/// Evaluated in U512 so a one-hop product of reserves cannot overflow.
/// Returns `None` when the inputs are degenerate or the products overflow.
/// An execution price better than spot reports zero.
pub fn calculate_price_impact_ppm(amount_in: U256, amount_out: U256, legs: &[Leg]) -> Option<u32> {
    if amount_in.is_zero() || legs.is_empty() {
        return None;
    }

    let mut spot_num = U512::from(amount_in);
    let mut actual_num = U512::from(amount_out).checked_mul(U512::from(PPM))?;
    for leg in legs {
        if leg.reserve_in.is_zero() || leg.reserve_out.is_zero() {
            return None;
        }
        spot_num = spot_num.checked_mul(U512::from(leg.reserve_out))?;
        actual_num = actual_num.checked_mul(U512::from(leg.reserve_in))?;
    }

    // ratio_ppm = (out * prod(R_in) * PPM) / (in * prod(R_out))
    let ratio_ppm = actual_num / spot_num;
    let ppm = U512::from(PPM);
    if ratio_ppm >= ppm {
        return Some(0);
    }
    u32::try_from(ppm - ratio_ppm).ok()
}

/// Proportional amount of the other token at the current pool price
/// (router `quote()`): amount_a * reserve_b / reserve_a
pub fn quote_proportional(amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256, AmmError> {
    if amount_a.is_zero() {
        return Err(AmmError::InvalidAmount("amount is zero".to_string()));
    }
    if reserve_a.is_zero() || reserve_b.is_zero() {
        return Err(AmmError::InsufficientLiquidity);
    }
    Ok(amount_a
        .checked_mul(reserve_b)
        .ok_or(AmmError::Overflow("proportional amount"))?
        / reserve_a)
}

/// Integer square root (floor), Babylonian method
pub fn sqrt(y: U256) -> U256 {
    if y > U256::from(3) {
        let mut z = y;
        let mut x = y / U256::from(2) + U256::from(1);
        while x < z {
            z = x;
            x = (y / x + x) / U256::from(2);
        }
        z
    } else if !y.is_zero() {
        U256::from(1)
    } else {
        U256::ZERO
    }
}

/// Calculate LP tokens minted for a deposit.
///
/// First deposit: sqrt(amount_a * amount_b) - MINIMUM_LIQUIDITY.
/// Otherwise: min(amount_a * supply / reserve_a, amount_b * supply / reserve_b).
pub fn calculate_lp_minted(
    amount_a: U256,
    amount_b: U256,
    reserve_a: U256,
    reserve_b: U256,
    total_supply: U256,
) -> Result<U256, AmmError> {
    if amount_a.is_zero() || amount_b.is_zero() {
        return Err(AmmError::InvalidAmount("deposit amounts must be non-zero".to_string()));
    }

    if total_supply.is_zero() {
        let product = amount_a
            .checked_mul(amount_b)
            .ok_or(AmmError::Overflow("initial liquidity"))?;
        return sqrt(product)
            .checked_sub(U256::from(MINIMUM_LIQUIDITY))
            .filter(|minted| !minted.is_zero())
            .ok_or(AmmError::InsufficientLiquidity);
    }

    if reserve_a.is_zero() || reserve_b.is_zero() {
        return Err(AmmError::InsufficientLiquidity);
    }
    let from_a = amount_a
        .checked_mul(total_supply)
        .ok_or(AmmError::Overflow("lp reward"))?
        / reserve_a;
    let from_b = amount_b
        .checked_mul(total_supply)
        .ok_or(AmmError::Overflow("lp reward"))?
        / reserve_b;
    let minted = from_a.min(from_b);
    if minted.is_zero() {
        return Err(AmmError::InsufficientLiquidity);
    }
    Ok(minted)
}

/// Calculate the user's share of pool reserves when burning LP tokens.
///
/// Returns (amount_a, amount_b) = liquidity * reserve / supply for each side.
pub fn calculate_redeem_shares(
    liquidity: U256,
    reserve_a: U256,
    reserve_b: U256,
    total_supply: U256,
) -> Result<(U256, U256), AmmError> {
    if liquidity.is_zero() {
        return Err(AmmError::InvalidAmount("liquidity is zero".to_string()));
    }
    if total_supply.is_zero() || liquidity > total_supply {
        return Err(AmmError::InsufficientLiquidity);
    }
    let a = liquidity
        .checked_mul(reserve_a)
        .ok_or(AmmError::Overflow("redeem share"))?
        / total_supply;
    let b = liquidity
        .checked_mul(reserve_b)
        .ok_or(AmmError::Overflow("redeem share"))?
        / total_supply;
    Ok((a, b))
}

/// Share of the pool in ppm that `lp_amount` represents out of `total_supply`
pub fn calculate_pool_share_ppm(lp_amount: U256, total_supply: U256) -> u32 {
    if total_supply.is_zero() {
        return 0;
    }
    let share = U512::from(lp_amount) * U512::from(PPM) / U512::from(total_supply);
    u32::try_from(share.min(U512::from(PPM))).unwrap_or(PPM as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_calculate_output_reference_pool() {
        // floor(2_000_000 * 997 / 1_000_997)
        let out = calculate_output(u(1_000), u(1_000_000), u(2_000_000), 30).unwrap();
        assert_eq!(out, u(1_992));
    }

    #[test]
    fn test_calculate_output_rejects_empty_pool() {
        assert!(matches!(
            calculate_output(u(1_000), U256::ZERO, u(2_000_000), 30),
            Err(AmmError::InsufficientLiquidity)
        ));
        assert!(matches!(
            calculate_output(U256::ZERO, u(1), u(1), 30),
            Err(AmmError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_reverse_of_reference_output() {
        let input = calculate_input(u(1_992), u(1_000_000), u(2_000_000), 30).unwrap();
        assert!(input >= u(1_000));
        assert!(calculate_output(input, u(1_000_000), u(2_000_000), 30).unwrap() >= u(1_992));
    }

    #[test]
    fn test_reverse_covers_forward_output() {
        let pools = [
            (u(1_000_000), u(2_000_000), 30u16),
            (u(5_000_000_000), u(17), 25),
            (u(123_456_789), u(987_654_321_000), 30),
            (u(10u64.pow(18)), u(3_000 * 10u64.pow(6)), 30),
        ];
        for (r_in, r_out, fee) in pools {
            for amount_in in [1u64, 7, 1_001, 99_999, 1_000_000] {
                let out = match calculate_output(u(amount_in), r_in, r_out, fee) {
                    Ok(out) if !out.is_zero() => out,
                    _ => continue,
                };
                let back = calculate_input(out, r_in, r_out, fee).unwrap();
                let again = calculate_output(back, r_in, r_out, fee).unwrap();
                assert!(again >= out, "pool ({}, {}) in {}", r_in, r_out, amount_in);
            }
        }
    }

    #[test]
    fn test_calculate_input_exceeding_reserves() {
        assert!(matches!(
            calculate_input(u(2_000_000), u(1_000_000), u(2_000_000), 30),
            Err(AmmError::InsufficientLiquidity)
        ));
    }

    #[test]
    fn test_path_two_legs() {
        let legs = [
            Leg::new(u(1_000_000), u(2_000_000), 30),
            Leg::new(u(4_000_000), u(1_000_000), 30),
        ];
        let out = quote_path_output(u(1_000), &legs).unwrap();
        // leg one -> 1992, leg two -> floor(1_000_000 * 1986 / 4_001_986) = 496
        assert_eq!(out, u(496));
        let back = quote_path_input(out, &legs).unwrap();
        assert!(quote_path_output(back, &legs).unwrap() >= out);
    }

    #[test]
    fn test_price_impact_single_leg() {
        // spot 2.0, execution 1.8 -> 10%
        let ppm = calculate_price_impact_ppm(u(100), u(180), &[Leg::new(u(1_000), u(2_000), 30)]);
        assert_eq!(ppm, Some(100_000));
    }

    #[test]
    fn test_price_impact_better_than_spot_is_zero() {
        let ppm = calculate_price_impact_ppm(u(100), u(250), &[Leg::new(u(1_000), u(2_000), 30)]);
        assert_eq!(ppm, Some(0));
    }

    #[test]
    fn test_price_impact_one_hop_uses_spot_product() {
        let legs = [
            Leg::new(u(1_000), u(2_000), 30),
            Leg::new(u(1_000), u(3_000), 30),
        ];
        // spot product 6.0, execution 5.4 -> 10%
        assert_eq!(calculate_price_impact_ppm(u(10), u(54), &legs), Some(100_000));
    }

    #[test]
    fn test_lp_minted_first_deposit() {
        // sqrt(4e6 * 1e6) = 2e6
        let minted =
            calculate_lp_minted(u(4_000_000), u(1_000_000), U256::ZERO, U256::ZERO, U256::ZERO)
                .unwrap();
        assert_eq!(minted, u(2_000_000 - MINIMUM_LIQUIDITY));
        assert!(calculate_lp_minted(u(10), u(10), U256::ZERO, U256::ZERO, U256::ZERO).is_err());
    }

    #[test]
    fn test_lp_minted_existing_pool_takes_min() {
        let minted =
            calculate_lp_minted(u(100), u(300), u(1_000), u(2_000), u(1_000)).unwrap();
        assert_eq!(minted, u(100));
    }

    #[test]
    fn test_redeem_shares() {
        let (a, b) = calculate_redeem_shares(u(250), u(1_000), u(3_000), u(1_000)).unwrap();
        assert_eq!((a, b), (u(250), u(750)));
        assert!(calculate_redeem_shares(u(1_001), u(1_000), u(3_000), u(1_000)).is_err());
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(sqrt(U256::ZERO), U256::ZERO);
        assert_eq!(sqrt(u(3)), u(1));
        assert_eq!(sqrt(u(16)), u(4));
        assert_eq!(sqrt(u(17)), u(4));
        assert_eq!(sqrt(U256::MAX), U256::from(u128::MAX));
    }

    #[test]
    fn test_pool_share() {
        assert_eq!(calculate_pool_share_ppm(u(1), u(4)), 250_000);
        assert_eq!(calculate_pool_share_ppm(u(1), U256::ZERO), 0);
    }
}
