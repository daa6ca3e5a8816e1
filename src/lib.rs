//! Yield Vault Orchestrator - Library Root
//!
//! Drives an injected EIP-1193 wallet through network switching,
//! wrapping, approvals and vault deposits/withdrawals on an EVM chain.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
pub mod usecases;

pub use config::AppConfig;
pub use usecases::Orchestrator;
