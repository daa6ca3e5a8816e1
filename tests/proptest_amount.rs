//! Property-Based Tests - Amount Parsing and Scaling Invariants
//!
//! Uses `proptest` to check that user-entered amounts scale into base
//! units exactly, or are rejected before any wallet call.

use alloy::primitives::U256;
use proptest::prelude::*;
use rust_decimal::Decimal;

use yield_vault_orchestrator::domain::amount::{
    AmountError, format_units, parse_amount, parse_units, scale_amount,
};
use yield_vault_orchestrator::domain::operation::{OperationState, Step};

// ── Parsing ──────────────────────────────────────────────────

proptest! {
    /// Rendered balances can be typed back in and mean the same amount.
    #[test]
    fn formatted_units_parse_back(value in 1u64.., decimals in 0u8..=18) {
        let rendered = format_units(U256::from(value), decimals);
        let parsed = parse_units(&rendered, decimals);
        prop_assert_eq!(parsed, Ok(U256::from(value)), "rendered as {}", rendered);
    }

    /// Negative amounts never reach scaling.
    #[test]
    fn negative_amounts_rejected(whole in -1_000_000i64..0, frac in 0u32..1000) {
        let input = format!("{whole}.{frac:03}");
        let result = parse_amount(&input);
        prop_assert!(matches!(result, Err(AmountError::NotPositive(_))), "{} -> {:?}", input, result);
    }

    /// Anything that is not a number is rejected as such.
    #[test]
    fn garbage_is_not_numeric(input in "[a-zA-Z_]{1,12}") {
        prop_assert!(matches!(parse_amount(&input), Err(AmountError::NotNumeric(_))));
    }
}

#[test]
fn zero_is_not_positive() {
    for input in ["0", "0.0", "0.000", "-0"] {
        assert!(matches!(parse_amount(input), Err(AmountError::NotPositive(_))), "{input}");
    }
}

// ── Scaling ──────────────────────────────────────────────────

proptest! {
    /// More fractional digits than the asset supports is an error, never
    /// a silent truncation.
    #[test]
    fn excess_precision_rejected(mantissa in 1i64..1_000_000, decimals in 0u8..=12, extra in 1u32..=4) {
        // A mantissa ending in a non-zero digit keeps its scale after normalize.
        let mantissa = mantissa * 10 + 1;
        let amount = Decimal::new(mantissa, u32::from(decimals) + extra);
        let is_too_precise = matches!(
            scale_amount(amount, decimals),
            Err(AmountError::TooPrecise { .. })
        );
        prop_assert!(is_too_precise);
    }

    /// Scaling preserves ordering.
    #[test]
    fn scaling_is_monotonic(a in 1u64..1_000_000_000, b in 1u64..1_000_000_000, decimals in 0u8..=18) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo_units = scale_amount(Decimal::from(lo), decimals).expect("in range");
        let hi_units = scale_amount(Decimal::from(hi), decimals).expect("in range");
        prop_assert!(lo_units <= hi_units);
        prop_assert_eq!(lo_units == hi_units, lo == hi);
    }
}

// ── Operation states ─────────────────────────────────────────

proptest! {
    /// Every in-flight step holds the busy flag.
    #[test]
    fn every_step_is_busy(index in 0usize..6) {
        let step = [
            Step::Connecting,
            Step::SwitchingNetwork,
            Step::Wrapping,
            Step::Approving,
            Step::Submitting,
            Step::Confirming,
        ][index];
        prop_assert!(OperationState::entering(step).is_busy());
        prop_assert!(!OperationState::Succeeded.is_busy());
    }
}
