//! Fixed-point decimal rescaling on 256-bit integers.
//!
//! Every amount the engine works with is an integer scaled by a power of
//! ten. Cross-decimal arithmetic (8-decimal collateral against 18-decimal
//! synthetic tokens, say) is only exact once everything sits at one
//! canonical scale, so all conversion goes through `normalize`:
//! lossless multiplication when moving to a higher decimal count,
//! truncating integer division when moving to a lower one. The discarded
//! remainder on the way down is permanently lost, matching on-chain
//! fixed-point conventions.

use alloy::primitives::U256;
use thiserror::Error;

/// Canonical number of decimal places used for all engine arithmetic.
/// 10^18 represents 1.0 (= 100% when the value is a ratio).
pub const CANONICAL_DECIMALS: u8 = 18;

/// Upper bound on accepted decimal counts. 10^36 still leaves headroom for
/// the double fixed-point adjustment in the CR formula inside 256 bits.
pub const MAX_DECIMALS: u8 = 36;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FixedPointError {
    #[error("decimal count {0} exceeds supported maximum of {MAX_DECIMALS}")]
    DecimalsOutOfRange(u8),

    #[error("arithmetic overflow while rescaling amount")]
    Overflow,

    #[error("invalid decimal literal: {0:?}")]
    InvalidDecimal(String),
}

/// 10^n as a `U256`. Caller must keep `n <= MAX_DECIMALS * 2`.
pub fn pow10(n: u8) -> U256 {
    U256::from(10u64).pow(U256::from(n))
}

/// 1.0 at the canonical scale.
pub fn one() -> U256 {
    pow10(CANONICAL_DECIMALS)
}

/// Rescale `amount` from `from_decimals` to `to_decimals`.
///
/// Scaling up is exact. Scaling down truncates toward zero; composing
/// up-then-down at the same factor reproduces the original integer.
pub fn normalize(amount: U256, from_decimals: u8, to_decimals: u8) -> Result<U256, FixedPointError> {
    if from_decimals > MAX_DECIMALS {
        return Err(FixedPointError::DecimalsOutOfRange(from_decimals));
    }
    if to_decimals > MAX_DECIMALS {
        return Err(FixedPointError::DecimalsOutOfRange(to_decimals));
    }

    if from_decimals <= to_decimals {
        amount
            .checked_mul(pow10(to_decimals - from_decimals))
            .ok_or(FixedPointError::Overflow)
    } else {
        Ok(amount / pow10(from_decimals - to_decimals))
    }
}

/// Rescale `amount` from its native decimal count to the canonical scale.
pub fn to_canonical(amount: U256, from_decimals: u8) -> Result<U256, FixedPointError> {
    normalize(amount, from_decimals, CANONICAL_DECIMALS)
}

/// Parse decimal text ("1.5", "0.02", "150") into a canonical-scaled value.
///
/// Fractional digits beyond the canonical 18 are truncated, consistent with
/// the downscaling convention. Used for user-entered CR thresholds so they
/// never pass through a float.
pub fn parse_canonical(text: &str) -> Result<U256, FixedPointError> {
    let invalid = || FixedPointError::InvalidDecimal(text.to_string());

    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let int_value = if int_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(int_part, 10).map_err(|_| invalid())?
    };

    let frac_digits = &frac_part[..frac_part.len().min(CANONICAL_DECIMALS as usize)];
    let frac_value = if frac_digits.is_empty() {
        U256::ZERO
    } else {
        let parsed = U256::from_str_radix(frac_digits, 10).map_err(|_| invalid())?;
        parsed
            .checked_mul(pow10(CANONICAL_DECIMALS - frac_digits.len() as u8))
            .ok_or(FixedPointError::Overflow)?
    };

    int_value
        .checked_mul(one())
        .and_then(|v| v.checked_add(frac_value))
        .ok_or(FixedPointError::Overflow)
}

/// Render a canonical-scaled value as decimal text with between `min_decimals`
/// and `max_decimals` fractional digits, truncating (never rounding up).
pub fn format_canonical(value: U256, min_decimals: usize, max_decimals: usize) -> String {
    let int_part = value / one();
    let frac_part = value % one();

    let digits = frac_part.to_string();
    let mut frac = "0".repeat(CANONICAL_DECIMALS as usize - digits.len()) + &digits;
    frac.truncate(max_decimals);
    while frac.len() > min_decimals && frac.ends_with('0') {
        frac.pop();
    }

    if frac.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac}")
    }
}
