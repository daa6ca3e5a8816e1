//! Amount Handling Benchmarks - Input Validation and Calldata Paths
//!
//! Benchmarks the pure functions that run on every keystroke-level
//! validation and every transaction build.
//!
//! Run with: cargo bench --bench amount_bench

use alloy::primitives::{Address, U256};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use yield_vault_orchestrator::adapters::chain::contracts::{approve_tx, vault_deposit_tx};
use yield_vault_orchestrator::config::VaultKind;
use yield_vault_orchestrator::domain::amount::{format_units, parse_units};

/// Benchmark parsing a typical user-entered deposit amount.
fn bench_parse_units(c: &mut Criterion) {
    c.bench_function("parse_units_18_decimals", |b| {
        b.iter(|| {
            let _units = parse_units(black_box("1234.567890123456789"), black_box(18));
        });
    });
}

/// Benchmark rendering a balance for display.
fn bench_format_units(c: &mut Criterion) {
    let value = U256::from(1_234_567_890_123_456_789_000u128);

    c.bench_function("format_units_18_decimals", |b| {
        b.iter(|| {
            let _text = format_units(black_box(value), black_box(18));
        });
    });
}

/// Benchmark building the approve + deposit transactions.
fn bench_build_transactions(c: &mut Criterion) {
    let from = Address::repeat_byte(0xaa);
    let token = Address::repeat_byte(0xe1);
    let vault = Address::repeat_byte(0xf1);
    let amount = U256::from(1_500_000_000_000_000_000u128);

    c.bench_function("build_approve_and_deposit", |b| {
        b.iter(|| {
            let approve = approve_tx(from, token, vault, black_box(amount), 120_000);
            let deposit = vault_deposit_tx(VaultKind::Erc4626, from, vault, black_box(amount), 250_000);
            black_box((approve.to_params(), deposit.to_params()));
        });
    });
}

criterion_group!(
    benches,
    bench_parse_units,
    bench_format_units,
    bench_build_transactions,
);
criterion_main!(benches);
