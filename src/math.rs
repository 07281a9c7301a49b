//! Precise fixed-point arithmetic on 18-decimal `U256` values.
//!
//! Every unit, supply and multiplier in the engine is an integer scaled by
//! [`PRECISE_UNIT`]. All helpers are checked: overflow, underflow and
//! division by zero surface as [`Error::Arithmetic`] instead of wrapping.

use alloy_primitives::U256;

use crate::error::{Error, Result};

/// 1.0 in 18-decimal fixed point.
pub const PRECISE_UNIT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Divisor applied to the stored position multiplier when raising targets
/// (1.0025, i.e. 25 basis points).
pub const TARGET_RAISE_DIVISOR: U256 = U256::from_limbs([1_002_500_000_000_000_000, 0, 0, 0]);

/// Build a precise value from a whole number (`3` -> `3e18`).
pub fn units(whole: u64) -> U256 {
    U256::from(whole) * PRECISE_UNIT
}

/// Build a precise value from a mantissa and a decimal exponent
/// (`from_decimal(98, 2)` -> `0.98e18`).
///
/// `decimals` must be at most 18.
pub fn from_decimal(mantissa: u64, decimals: u8) -> U256 {
    debug_assert!(decimals <= 18);
    U256::from(mantissa) * U256::from(10u64).pow(U256::from(18 - decimals as u64))
}

/// `a * b / 1e18`, rounded down.
pub fn precise_mul(a: U256, b: U256) -> Result<U256> {
    Ok(checked_mul(a, b)? / PRECISE_UNIT)
}

/// `a * b / 1e18`, rounded up. Zero stays zero.
pub fn precise_mul_ceil(a: U256, b: U256) -> Result<U256> {
    if a.is_zero() || b.is_zero() {
        return Ok(U256::ZERO);
    }
    Ok((checked_mul(a, b)? - U256::from(1)) / PRECISE_UNIT + U256::from(1))
}

/// `a * 1e18 / b`, rounded down.
pub fn precise_div(a: U256, b: U256) -> Result<U256> {
    checked_div(checked_mul(a, PRECISE_UNIT)?, b)
}

pub fn checked_mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b)
        .ok_or(Error::Arithmetic("multiplication overflow"))
}

pub fn checked_div(a: U256, b: U256) -> Result<U256> {
    a.checked_div(b).ok_or(Error::Arithmetic("division by zero"))
}

pub fn checked_sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(Error::Arithmetic("subtraction underflow"))
}

/// Render a precise value as a decimal string with trailing zeros trimmed.
pub fn format_precise(value: U256) -> String {
    let whole = value / PRECISE_UNIT;
    let frac = value % PRECISE_UNIT;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>18}", frac.to_string());
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
