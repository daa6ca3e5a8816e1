//! Observable orchestrator state consumed by the UI layer.

use alloy::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

use super::address::short_address;
use super::balance::BalanceSnapshot;
use super::operation::{OperationKind, OperationState};

/// Wallet connection status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected { address: Address, chain_id: u64 },
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected { address, chain_id } => {
                write!(f, "connected {} on chain {chain_id}", short_address(address))
            }
        }
    }
}

/// Busy flag per operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyFlags {
    pub connecting: bool,
    pub approving: bool,
    pub depositing: bool,
    pub withdrawing: bool,
}

impl BusyFlags {
    /// Flags with exactly the given kind marked busy.
    pub fn only(kind: OperationKind) -> Self {
        let mut flags = Self::default();
        match kind {
            OperationKind::Connect => flags.connecting = true,
            OperationKind::Approve => flags.approving = true,
            OperationKind::Deposit => flags.depositing = true,
            OperationKind::Withdraw => flags.withdrawing = true,
        }
        flags
    }

    pub fn any(&self) -> bool {
        self.connecting || self.approving || self.depositing || self.withdrawing
    }
}

/// Everything the presentation layer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub connection: ConnectionStatus,
    pub operation: OperationState,
    /// Kind of the live (or last) operation.
    pub active: Option<OperationKind>,
    pub busy: BusyFlags,
    /// Last human-readable progress or error line.
    pub message: String,
    /// Most recently submitted transaction, kept after failures.
    pub last_tx_hash: Option<TxHash>,
    pub balances: Option<BalanceSnapshot>,
}

impl Default for StatusView {
    fn default() -> Self {
        Self {
            connection: ConnectionStatus::Disconnected,
            operation: OperationState::Idle,
            active: None,
            busy: BusyFlags::default(),
            message: "Please connect your wallet.".to_string(),
            last_tx_hash: None,
            balances: None,
        }
    }
}
