//! Network Guard Use Case - Target Chain Enforcement
//!
//! Makes sure the wallet is on the target chain before anything is
//! read or signed. The flow is:
//! 1. Read `eth_chainId`; nothing to do when it already matches.
//! 2. `wallet_switchEthereumChain` to the target.
//! 3. If the wallet does not know the chain, `wallet_addEthereumChain`
//!    with the full descriptor, then retry the switch exactly once.
//! 4. Re-read `eth_chainId` to confirm.
//!
//! Nothing is spawned: dropping the returned future abandons the wallet
//! prompt and no retry happens afterwards.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::adapters::chain::ProviderAdapter;
use crate::config::NetworkConfig;
use crate::domain::chain::ChainDescriptor;
use crate::domain::error::OrchestratorError;
use crate::ports::wallet_provider::ProviderError;

/// Recognises "this chain was never added to the wallet".
#[derive(Debug, Clone)]
pub struct UnknownChainPolicy {
  codes: Vec<i64>,
  /// Lower-cased substrings.
  patterns: Vec<String>,
  inspect_nested: bool,
}

impl UnknownChainPolicy {
  pub fn from_config(config: &NetworkConfig) -> Self {
    Self {
      codes: config.unknown_chain_codes.clone(),
      patterns: config
        .unknown_chain_patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect(),
      inspect_nested: config.inspect_nested_data,
    }
  }

  /// Whether `err` means the target chain is unknown to the wallet.
  pub fn matches(&self, err: &ProviderError) -> bool {
    if err.code().is_some_and(|code| self.codes.contains(&code)) {
      return true;
    }
    if self.inspect_nested && err.nested_code().is_some_and(|code| self.codes.contains(&code)) {
      return true;
    }
    // A rejected prompt is never "unknown chain", whatever its text says.
    if err.is_user_rejection() {
      return false;
    }
    let message = err.message().to_lowercase();
    self.patterns.iter().any(|p| message.contains(p.as_str()))
  }
}

/// Ensures the wallet is connected to the target chain.
pub struct NetworkGuard {
  provider: Arc<ProviderAdapter>,
  target: ChainDescriptor,
  policy: UnknownChainPolicy,
}

impl NetworkGuard {
  pub fn new(provider: Arc<ProviderAdapter>, target: ChainDescriptor, policy: UnknownChainPolicy) -> Self {
    Self {
      provider,
      target,
      policy,
    }
  }

  /// Switch (and if needed add) the target chain, then verify.
  ///
  /// Returns the verified chain id. Failures keep the wallet's message;
  /// a declined prompt surfaces as `UserRejected`, everything else as
  /// `NetworkMismatch`.
  #[instrument(skip(self), fields(target = self.target.chain_id))]
  pub async fn ensure_target_network(&self) -> Result<u64, OrchestratorError> {
    let target = self.target.chain_id;

    match self.provider.chain_id().await {
      Ok(current) if current == target => {
        debug!("Wallet already on target chain");
        return Ok(current);
      }
      Ok(current) => info!(current, "Switching wallet network"),
      Err(e) => debug!(error = %e, "Could not read current chain, switching anyway"),
    }

    match self.provider.switch_chain(target).await {
      Ok(()) => {}
      Err(e) if self.policy.matches(&e) => {
        info!(error = %e, chain = %self.target.name, "Chain unknown to wallet, adding it");
        let original = e.message();
        let retried = match self.provider.add_chain(&self.target).await {
          Ok(()) => self.provider.switch_chain(target).await,
          Err(add) => Err(add),
        };
        retried.map_err(|later| after_unknown_chain(&original, later))?;
      }
      Err(e) => return Err(network_failure(e)),
    }

    let current = self.provider.chain_id().await.map_err(network_failure)?;
    if current != target {
      warn!(current, "Wallet still on another chain after switch");
      return Err(OrchestratorError::NetworkMismatch(format!(
        "wallet reports chain {current}, expected {target} ({})",
        self.target.name
      )));
    }

    info!("Wallet on target chain");
    Ok(current)
  }
}

fn network_failure(err: ProviderError) -> OrchestratorError {
  if err.is_user_rejection() {
    OrchestratorError::UserRejected(err.message())
  } else {
    OrchestratorError::NetworkMismatch(err.message())
  }
}

/// Keeps the wallet's first "unknown chain" message next to the later one.
fn after_unknown_chain(original: &str, err: ProviderError) -> OrchestratorError {
  match network_failure(err) {
    OrchestratorError::NetworkMismatch(later) => OrchestratorError::NetworkMismatch(format!("{original}; then: {later}")),
    other => other,
  }
}
