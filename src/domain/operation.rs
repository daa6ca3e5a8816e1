//! Operation model: requests, lifecycle states and reports.
//!
//! Exactly one `OperationState` is live per orchestrator. A new request is
//! accepted only while the state is `Idle`, `Succeeded` or `Failed`.

use alloy::primitives::{Address, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Connect,
    Approve,
    Deposit,
    Withdraw,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Approve => write!(f, "approve"),
            Self::Deposit => write!(f, "deposit"),
            Self::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Which asset an approve or deposit moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetChoice {
    /// The chain's native currency (wrapped first when the vault needs it).
    Native,
    /// An ERC-20 token at the given address.
    Token(Address),
}

/// Amount carried by a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestedAmount {
    /// User-entered decimal string, validated before execution.
    Exact(String),
    /// Everything the account holds (withdraw only).
    All,
}

/// A validated-on-entry request to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub asset: AssetChoice,
    pub amount: RequestedAmount,
}

impl OperationRequest {
    pub fn deposit(amount: impl Into<String>, asset: AssetChoice) -> Self {
        Self {
            kind: OperationKind::Deposit,
            asset,
            amount: RequestedAmount::Exact(amount.into()),
        }
    }

    pub fn approve(amount: impl Into<String>, asset: AssetChoice) -> Self {
        Self {
            kind: OperationKind::Approve,
            asset,
            amount: RequestedAmount::Exact(amount.into()),
        }
    }

    pub fn withdraw_all() -> Self {
        Self {
            kind: OperationKind::Withdraw,
            asset: AssetChoice::Native,
            amount: RequestedAmount::All,
        }
    }

    pub fn withdraw_shares(amount: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Withdraw,
            asset: AssetChoice::Native,
            amount: RequestedAmount::Exact(amount.into()),
        }
    }
}

/// Failure classification carried by `OperationState::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    NotConnected,
    ConnectionFailed,
    NetworkMismatch,
    InvalidToken,
    InvalidAmount,
    NotConfigured,
    WrapFailed,
    ApprovalFailed,
    TransactionFailed,
    ReadFailed,
    Busy,
    SessionChanged,
    UserRejected,
}

impl FailureReason {
    /// Stable label for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::ConnectionFailed => "connection_failed",
            Self::NetworkMismatch => "network_mismatch",
            Self::InvalidToken => "invalid_token",
            Self::InvalidAmount => "invalid_amount",
            Self::NotConfigured => "not_configured",
            Self::WrapFailed => "wrap_failed",
            Self::ApprovalFailed => "approval_failed",
            Self::TransactionFailed => "transaction_failed",
            Self::ReadFailed => "read_failed",
            Self::Busy => "busy",
            Self::SessionChanged => "session_changed",
            Self::UserRejected => "user_rejected",
        }
    }
}

/// The step an operation was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    Connecting,
    SwitchingNetwork,
    Wrapping,
    Approving,
    Submitting,
    Confirming,
}

/// Terminal failure details. `message` keeps the underlying error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub reason: FailureReason,
    pub step: Option<Step>,
    pub message: String,
}

/// Lifecycle state of the single live operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    #[default]
    Idle,
    Connecting,
    SwitchingNetwork,
    Wrapping,
    Approving,
    Submitting,
    Confirming,
    Succeeded,
    Failed(Failure),
}

impl OperationState {
    /// True while an operation is in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle | Self::Succeeded | Self::Failed(_))
    }

    /// State entered when `step` begins.
    pub fn entering(step: Step) -> Self {
        match step {
            Step::Connecting => Self::Connecting,
            Step::SwitchingNetwork => Self::SwitchingNetwork,
            Step::Wrapping => Self::Wrapping,
            Step::Approving => Self::Approving,
            Step::Submitting => Self::Submitting,
            Step::Confirming => Self::Confirming,
        }
    }

    /// The failure reason, if failed.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Failed(failure) => Some(failure.reason),
            _ => None,
        }
    }
}

/// Outcome of a successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReport {
    pub id: Uuid,
    pub kind: OperationKind,
    /// Every state the operation entered, in order, ending in `Succeeded`.
    pub states: Vec<OperationState>,
    /// Hashes of every transaction submitted, in submission order.
    pub tx_hashes: Vec<TxHash>,
    /// Set when the operation completed without doing anything.
    pub notice: Option<String>,
    /// Whether the post-operation balance refresh surfaced an error.
    pub balance_refresh_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OperationReport {
    /// Whether the operation passed through `state`.
    pub fn visited(&self, state: &OperationState) -> bool {
        self.states.contains(state)
    }
}
