//! Balance snapshot - last known balances for the connected account.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One asset line in a snapshot: either a formatted amount or the error
/// text from the most recent read attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// Token symbol, when metadata resolved.
    pub symbol: Option<String>,
    /// Decimal string in whole units.
    pub amount: Option<String>,
    /// Error text when the last read failed.
    pub error: Option<String>,
}

impl AssetBalance {
    pub fn ok(symbol: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            amount: Some(amount.into()),
            error: None,
        }
    }

    pub fn failed(symbol: Option<String>, error: impl Into<String>) -> Self {
        Self {
            symbol,
            amount: None,
            error: Some(error.into()),
        }
    }
}

/// Last known balances. Only valid for `chain_id` and `account`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub chain_id: u64,
    pub account: Address,
    /// Native balance in whole units.
    pub native: String,
    /// Error text when the native read failed (`native` then keeps the
    /// previous value).
    #[serde(default)]
    pub native_error: Option<String>,
    /// Per-token balances keyed by token address.
    pub per_token: BTreeMap<Address, AssetBalance>,
    /// Vault share balance, when a vault is configured.
    pub vault_shares: Option<AssetBalance>,
    pub updated_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// Empty snapshot for a freshly established session.
    pub fn empty(chain_id: u64, account: Address) -> Self {
        Self {
            chain_id,
            account,
            native: "0.0".to_string(),
            native_error: None,
            per_token: BTreeMap::new(),
            vault_shares: None,
            updated_at: Utc::now(),
        }
    }

    /// Amount for a token, if the last read succeeded.
    pub fn token_amount(&self, token: &Address) -> Option<&str> {
        self.per_token.get(token).and_then(|b| b.amount.as_deref())
    }

    /// Whether this snapshot belongs to the given session.
    pub fn matches(&self, chain_id: u64, account: Address) -> bool {
        self.chain_id == chain_id && self.account == account
    }
}
