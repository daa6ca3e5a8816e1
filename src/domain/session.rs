//! Wallet session model.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// The connected account and the chain the wallet reported for it.
///
/// Both fields are absent when no wallet is connected. A session is never
/// patched in place after an account or chain change; it is reset and
/// re-established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSession {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
}

impl WalletSession {
    /// A fully established session.
    pub fn connected(address: Address, chain_id: u64) -> Self {
        Self {
            address: Some(address),
            chain_id: Some(chain_id),
        }
    }

    /// The `(address, chain_id)` pair if the session is established.
    pub fn active(&self) -> Option<(Address, u64)> {
        self.address.zip(self.chain_id)
    }

    pub fn is_connected(&self) -> bool {
        self.active().is_some()
    }
}

/// Why the session was invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationCause {
    /// The wallet switched to a different account (or exposed none).
    AccountsChanged(Vec<Address>),
    /// The wallet switched to a different chain.
    ChainChanged(u64),
    /// The provider disconnected.
    Disconnected(String),
    /// Events were missed; the session can no longer be trusted.
    EventsLagged(u64),
    /// The caller asked to disconnect.
    UserDisconnect,
}

impl std::fmt::Display for InvalidationCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccountsChanged(accounts) if accounts.is_empty() => {
                write!(f, "wallet locked or account disconnected")
            }
            Self::AccountsChanged(_) => write!(f, "wallet account changed"),
            Self::ChainChanged(id) => write!(f, "wallet switched to chain {id}"),
            Self::Disconnected(reason) => write!(f, "wallet disconnected: {reason}"),
            Self::EventsLagged(n) => write!(f, "missed {n} wallet events"),
            Self::UserDisconnect => write!(f, "disconnected"),
        }
    }
}
