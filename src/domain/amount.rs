//! Amount Handling - User Input Parsing and Base-Unit Scaling
//!
//! User-entered amounts arrive as decimal strings. They are parsed with
//! `rust_decimal` (never `f64`) and scaled into `U256` base units once the
//! asset's decimals are known. Formatting goes the other way for display.

use std::str::FromStr;

use alloy::primitives::U256;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why a user-entered amount was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount `{0}` is not a number")]
    NotNumeric(String),
    #[error("amount must be greater than zero, got {0}")]
    NotPositive(String),
    #[error("amount {amount} has more than {decimals} decimal places")]
    TooPrecise { amount: String, decimals: u8 },
    #[error("amount {0} overflows 256-bit base units")]
    Overflow(String),
    #[error("amount {amount} exceeds the available {available}")]
    ExceedsBalance { amount: String, available: String },
}

/// Parse a user-entered amount. Accepts plain decimal notation only.
///
/// Runs before any wallet interaction, so a malformed request never
/// reaches a signing prompt.
pub fn parse_amount(input: &str) -> Result<Decimal, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    let amount =
        Decimal::from_str(trimmed).map_err(|_| AmountError::NotNumeric(trimmed.to_string()))?;

    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(trimmed.to_string()));
    }

    Ok(amount.normalize())
}

/// Scale a parsed amount into base units for an asset with `decimals`.
pub fn scale_amount(amount: Decimal, decimals: u8) -> Result<U256, AmountError> {
    let amount = amount.normalize();
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount.to_string()));
    }

    let scale = amount.scale();
    if scale > u32::from(decimals) {
        return Err(AmountError::TooPrecise {
            amount: amount.to_string(),
            decimals,
        });
    }

    // mantissa is positive after the sign check above
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let exponent = u32::from(decimals) - scale;

    U256::from(10u8)
        .checked_pow(U256::from(exponent))
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| AmountError::Overflow(amount.to_string()))
}

/// Parse and scale in one step.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, AmountError> {
    scale_amount(parse_amount(input)?, decimals)
}

/// Render base units as a decimal string.
///
/// Whole numbers keep one fractional digit (`"1.0"`); trailing zeros are
/// otherwise trimmed (`"1.5"`, `"0.000001"`).
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = usize::from(decimals);

    let (whole, fraction) = if decimals == 0 {
        (digits, String::new())
    } else if digits.len() > decimals {
        let (w, f) = digits.split_at(digits.len() - decimals);
        (w.to_string(), f.to_string())
    } else {
        let padded = format!("{digits:0>decimals$}");
        ("0".to_string(), padded)
    };

    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{fraction}")
    }
}
