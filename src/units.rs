//! Amount scaling and rate annualisation
//!
//! DAI carries 18 decimals. User input is scaled by 10^18 into base units
//! before it reaches a batch; display values are scaled back and rounded to
//! 4 decimal places.

use alloy_primitives::U256;

use crate::error::{CompoundError, Result};

/// Fixed decimal precision of the underlying token.
pub const TOKEN_DECIMALS: usize = 18;

/// Decimal places shown for balances.
pub const DISPLAY_DECIMALS: usize = 4;

/// Blocks per year assuming a fixed 15 second block time.
pub const BLOCKS_PER_YEAR: u64 = 4 * 60 * 24 * 365;

/// 10^18
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

fn pow10(exp: usize) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// Parse a user-entered decimal string into base units (x 10^18).
///
/// Rejects empty strings, non-digits, signs, more than 18 fractional digits
/// and zero amounts.
pub fn parse_amount(input: &str) -> Result<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CompoundError::Input("amount is empty".to_string()));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(CompoundError::Input(format!("not a number: {:?}", input)));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(CompoundError::Input(format!("not a number: {:?}", input)));
    }
    if fraction.len() > TOKEN_DECIMALS {
        return Err(CompoundError::Input(format!(
            "at most {} decimal places are supported",
            TOKEN_DECIMALS
        )));
    }

    let overflow = || CompoundError::Input(format!("amount too large: {:?}", input));

    let whole_units = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|_| overflow())?
    };
    let fraction_units = if fraction.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", fraction, width = TOKEN_DECIMALS);
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };

    let amount = whole_units
        .checked_mul(WAD)
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or_else(overflow)?;

    if amount.is_zero() {
        return Err(CompoundError::Input(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}

/// Divide with round-half-up and render as `int.frac` with `places` digits.
fn format_scaled(numerator: U256, denominator: U256, places: usize) -> String {
    let half = denominator / U256::from(2u64);
    let scaled = numerator.saturating_add(half) / denominator;
    let unit = pow10(places);
    let whole = scaled / unit;
    let frac = (scaled % unit).as_limbs()[0];
    format!("{}.{:0width$}", whole, frac, width = places)
}

/// Render base units as a decimal string rounded to 4 places.
pub fn format_amount(base_units: U256) -> String {
    let denominator = pow10(TOKEN_DECIMALS - DISPLAY_DECIMALS);
    format_scaled(base_units, denominator, DISPLAY_DECIMALS)
}

/// Annualise a per-block supply rate (scaled by 10^18) into a percentage
/// with 2 decimal places.
pub fn supply_apr(supply_rate_per_block: U256, blocks_per_year: u64) -> Result<String> {
    // rate * blocks / 1e18 * 100, kept in hundredths of a percent
    supply_rate_per_block
        .checked_mul(U256::from(blocks_per_year))
        .and_then(|v| v.checked_mul(U256::from(100u64 * 100)))
        .filter(|v| v.checked_add(WAD / U256::from(2u64)).is_some())
        .map(|numerator| format_scaled(numerator, WAD, 2))
        .ok_or_else(|| {
            CompoundError::provider(format!(
                "supply rate {} per block is out of range",
                supply_rate_per_block
            ))
        })
}
