//! Chain Adapters - EVM Interaction Through the Injected Wallet
//!
//! Provides on-chain access via alloy-rs 0.9 encoding for:
//! - Typed EIP-1193 requests with receipt polling
//! - ERC-20, wrapped-native and vault contract bindings
//! - ERC-20 approval management (token → vault)

pub mod approvals;
pub mod contracts;
pub mod provider;

pub use approvals::{ApprovalManager, ApprovalPlan};
pub use contracts::TxRequest;
pub use provider::{ProviderAdapter, ReceiptPolling, TxReceipt};
