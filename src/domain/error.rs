//! Orchestrator error taxonomy.
//!
//! Every failure is local to one request. Each variant maps onto the
//! `FailureReason` recorded in `OperationState::Failed` and keeps the
//! underlying message for diagnostics.

use alloy::primitives::{Address, TxHash};
use thiserror::Error;

use super::amount::AmountError;
use super::operation::{FailureReason, OperationKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("wallet is not connected")]
    NotConnected,

    #[error("could not connect wallet: {0}")]
    ConnectionFailed(String),

    #[error("wallet is not on the target network: {0}")]
    NetworkMismatch(String),

    #[error("token {address} is not usable: {message}")]
    InvalidToken { address: Address, message: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("wrapping native currency failed: {0}")]
    WrapFailed(String),

    #[error("approval failed: {0}")]
    ApprovalFailed(String),

    #[error("transaction failed: {message}")]
    TransactionFailed {
        tx_hash: Option<TxHash>,
        message: String,
    },

    #[error("chain read failed: {0}")]
    ReadFailed(String),

    #[error("another operation is in progress ({active:?})")]
    Busy { active: Option<OperationKind> },

    #[error("wallet account or network changed during the operation")]
    SessionChanged,

    #[error("request rejected in wallet: {0}")]
    UserRejected(String),

    #[error("balance refresh error: {0}")]
    BalanceRefresh(String),
}

impl OrchestratorError {
    /// Classification used for `OperationState::Failed` and metrics.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::NotConnected => FailureReason::NotConnected,
            Self::ConnectionFailed(_) => FailureReason::ConnectionFailed,
            Self::NetworkMismatch(_) => FailureReason::NetworkMismatch,
            Self::InvalidToken { .. } => FailureReason::InvalidToken,
            Self::InvalidAmount(_) => FailureReason::InvalidAmount,
            Self::NotConfigured(_) => FailureReason::NotConfigured,
            Self::WrapFailed(_) => FailureReason::WrapFailed,
            Self::ApprovalFailed(_) => FailureReason::ApprovalFailed,
            Self::TransactionFailed { .. } => FailureReason::TransactionFailed,
            Self::ReadFailed(_) | Self::BalanceRefresh(_) => FailureReason::ReadFailed,
            Self::Busy { .. } => FailureReason::Busy,
            Self::SessionChanged => FailureReason::SessionChanged,
            Self::UserRejected(_) => FailureReason::UserRejected,
        }
    }

    /// Status line for the UI. Wallet rejections are reported without
    /// failure wording since the user chose to cancel.
    pub fn status_message(&self, kind: OperationKind) -> String {
        let action = match kind {
            OperationKind::Connect => "Connection",
            OperationKind::Approve => "Approval",
            OperationKind::Deposit => "Deposit",
            OperationKind::Withdraw => "Withdrawal",
        };
        match self {
            Self::UserRejected(_) => format!("{action} cancelled in wallet."),
            Self::NotConnected => "Please connect your wallet first.".to_string(),
            Self::InvalidAmount(_) => "Enter a valid amount.".to_string(),
            Self::Busy { .. } => "Another wallet operation is still in progress.".to_string(),
            Self::SessionChanged => {
                format!("{action} stopped: wallet account or network changed. Please reconnect.")
            }
            other => format!("{action} failed: {other}"),
        }
    }
}
