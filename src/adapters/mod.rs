//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Builds on the `crate::ports` traits with concrete external
//! dependencies (alloy ABI encoding, Prometheus). Each sub-module groups
//! adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `chain`: wallet RPC helpers, contract bindings, approvals
//! - `metrics`: Prometheus metrics registry

pub mod chain;
pub mod metrics;
