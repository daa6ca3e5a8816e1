//! Wallet Provider Port - Injected Wallet Boundary
//!
//! Defines the trait for the external wallet the orchestrator drives.
//! The shape follows EIP-1193: a single request/response call taking a
//! method name and parameter list, plus an optional event stream for
//! `accountsChanged` / `chainChanged`. This is the only path to the
//! chain; no other transport is used for writes.

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// EIP-1193 code for "User Rejected Request".
pub const USER_REJECTED_CODE: i64 = 4001;

/// Error returned by the wallet provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
  /// JSON-RPC / EIP-1193 error object from the wallet.
  #[error("{message} (code {code})")]
  Rpc {
    /// Numeric error code.
    code: i64,
    /// Wallet-supplied message, preserved for display.
    message: String,
    /// Optional structured payload (some wallets nest the real error here).
    data: Option<Value>,
  },
  /// The wallet answered, but not with what the method promises.
  #[error("unexpected response to {method}: {message}")]
  InvalidResponse {
    /// RPC method that was called.
    method: String,
    /// What was wrong with the response.
    message: String,
  },
  /// No receipt appeared before the polling deadline.
  #[error("transaction {0} was not mined before the receipt timeout")]
  ReceiptTimeout(String),
  /// The wallet went away.
  #[error("wallet provider unavailable: {0}")]
  Unavailable(String),
}

impl ProviderError {
  /// Convenience constructor for RPC errors without data.
  pub fn rpc(code: i64, message: impl Into<String>) -> Self {
    Self::Rpc {
      code,
      message: message.into(),
      data: None,
    }
  }

  /// Top-level error code, if this is an RPC error.
  pub fn code(&self) -> Option<i64> {
    match self {
      Self::Rpc { code, .. } => Some(*code),
      _ => None,
    }
  }

  /// Error code nested in `data.originalError.code` (mobile wallets wrap
  /// the real error this way).
  pub fn nested_code(&self) -> Option<i64> {
    match self {
      Self::Rpc { data: Some(data), .. } => data
        .get("originalError")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_i64),
      _ => None,
    }
  }

  /// Message text without the code suffix.
  pub fn message(&self) -> String {
    match self {
      Self::Rpc { message, .. } => message.clone(),
      other => other.to_string(),
    }
  }

  /// Whether the user declined a wallet prompt.
  pub fn is_user_rejection(&self) -> bool {
    self.code() == Some(USER_REJECTED_CODE) || self.nested_code() == Some(USER_REJECTED_CODE)
  }
}

/// Notifications pushed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
  /// `accountsChanged`: the exposed accounts (empty when locked).
  AccountsChanged(Vec<Address>),
  /// `chainChanged`: the new chain id.
  ChainChanged(u64),
  /// `disconnect`: the provider lost its connection.
  Disconnect(String),
}

/// Trait for injected wallet providers.
///
/// `request` is required. `subscribe` is an optional capability: wallets
/// that cannot push events return `None`, and the adapter checks this
/// once when it is constructed.
#[async_trait]
pub trait WalletProvider: Send + Sync + 'static {
  /// Issue a JSON-RPC request through the wallet.
  ///
  /// May suspend indefinitely while the wallet shows a prompt. Dropping
  /// the returned future abandons the wait.
  async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError>;

  /// Subscribe to account/chain notifications, if supported.
  fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>>;
}
