//! Domain layer - Core orchestration models.
//!
//! Pure types for the wallet-and-vault orchestrator: chain descriptors,
//! amounts, sessions, balances, operation lifecycle and the error
//! taxonomy. No I/O happens here; ports and use cases build on these.

pub mod address;
pub mod amount;
pub mod balance;
pub mod chain;
pub mod error;
pub mod operation;
pub mod session;
pub mod status;
pub mod token;

// Re-export core types for convenience
pub use address::ConfiguredAddress;
pub use amount::AmountError;
pub use balance::{AssetBalance, BalanceSnapshot};
pub use chain::{ChainDescriptor, ChainRegistry, NativeCurrency};
pub use error::OrchestratorError;
pub use operation::{
    AssetChoice, Failure, FailureReason, OperationKind, OperationReport, OperationRequest,
    OperationState, RequestedAmount, Step,
};
pub use session::{InvalidationCause, WalletSession};
pub use status::{BusyFlags, ConnectionStatus, StatusView};
pub use token::{TokenInfo, TokenKey};
