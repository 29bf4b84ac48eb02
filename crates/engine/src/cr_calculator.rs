//! Collateralization-ratio arithmetic.
//!
//! Pure integer math over canonical-scaled (10^18) values:
//!
//!   CR = backingCollateral * 10^36 / (tokensOutstanding * price)
//!
//! The double fixed-point adjustment keeps the truncating division's result
//! itself canonical-scaled, so 1.5 * 10^18 reads as 150%. No floating point
//! anywhere: rounding drift is unacceptable for a liquidation-risk signal.

use alloy::primitives::U256;
use thiserror::Error;

use crate::fixed_point;

/// Collateralization ratio of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cr {
    /// No tokens outstanding; the ratio does not exist and is not alertable.
    Undefined,
    /// Canonical-scaled ratio. `Ratio(0)` is the exact value for a position
    /// with zero backing collateral, not a division result.
    Ratio(U256),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrError {
    #[error("arithmetic overflow in collateralization math")]
    Overflow,

    #[error("price must be positive to compute a ratio")]
    ZeroPrice,

    #[error("collateral requirement must be positive")]
    ZeroRequirement,
}

/// Posted collateral minus the pending withdrawal request.
///
/// `None` means the withdrawal request exceeds the posted collateral: an
/// inconsistent upstream snapshot that must be surfaced as unresolved,
/// never silently clamped to zero.
pub fn backing_collateral(collateral: U256, withdrawal_request: U256) -> Option<U256> {
    collateral.checked_sub(withdrawal_request)
}

/// Compute the collateralization ratio from canonical-scaled inputs.
pub fn collateralization_ratio(
    backing_collateral: U256,
    tokens_outstanding: U256,
    price: U256,
) -> Result<Cr, CrError> {
    if tokens_outstanding.is_zero() {
        return Ok(Cr::Undefined);
    }
    if backing_collateral.is_zero() {
        return Ok(Cr::Ratio(U256::ZERO));
    }
    if price.is_zero() {
        return Err(CrError::ZeroPrice);
    }

    let numerator = backing_collateral
        .checked_mul(fixed_point::one())
        .and_then(|v| v.checked_mul(fixed_point::one()))
        .ok_or(CrError::Overflow)?;
    let denominator = tokens_outstanding
        .checked_mul(price)
        .ok_or(CrError::Overflow)?;

    Ok(Cr::Ratio(numerator / denominator))
}

/// Price level at which backing collateral equals exactly the collateral
/// requirement against outstanding tokens.
///
/// Same formula shape as the ratio with the requirement in the price slot;
/// the result is already at the implicit precision of raw price inputs and
/// is NOT decimal-rescaled afterward.
pub fn liquidation_price(
    backing_collateral: U256,
    tokens_outstanding: U256,
    collateral_requirement: U256,
) -> Result<U256, CrError> {
    if collateral_requirement.is_zero() {
        return Err(CrError::ZeroRequirement);
    }
    if tokens_outstanding.is_zero() {
        return Err(CrError::Overflow);
    }

    let numerator = backing_collateral
        .checked_mul(fixed_point::one())
        .and_then(|v| v.checked_mul(fixed_point::one()))
        .ok_or(CrError::Overflow)?;
    let denominator = tokens_outstanding
        .checked_mul(collateral_requirement)
        .ok_or(CrError::Overflow)?;

    Ok(numerator / denominator)
}

/// Strict comparison: a ratio exactly equal to the threshold does not alert.
pub fn is_below_threshold(cr: U256, threshold: U256) -> bool {
    cr < threshold
}
