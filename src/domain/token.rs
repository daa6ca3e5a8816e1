//! ERC-20 token metadata.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Resolved metadata for one ERC-20-like asset. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Cache key: metadata is only valid on the chain it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub chain_id: u64,
    pub address: Address,
}

impl TokenKey {
    pub fn new(chain_id: u64, address: Address) -> Self {
        Self { chain_id, address }
    }
}
