//! Balance Tracker Use Case - Native, Token and Share Balances
//!
//! Reads the connected account's balances through the wallet and keeps
//! the last known snapshot. The native balance is always read; tokens
//! are read only when their configured address is usable, and one
//! failing asset never aborts the others. Errors matching the configured
//! noise patterns (name-resolution attempts on chains without such a
//! service) are logged and swallowed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{Address, U256};
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::token_cache::TokenMetadataCache;
use crate::adapters::chain::ProviderAdapter;
use crate::adapters::chain::contracts::{IErc20, IErc4626Vault};
use crate::config::BalanceConfig;
use crate::domain::amount::format_units;
use crate::domain::balance::{AssetBalance, BalanceSnapshot};
use crate::domain::chain::NativeCurrency;
use crate::domain::error::OrchestratorError;
use crate::ports::wallet_provider::ProviderError;

/// Symbol shown for vault shares when the vault exposes no metadata.
const SHARE_SYMBOL: &str = "shares";

/// Tracks balances for the current session.
pub struct BalanceTracker {
  provider: Arc<ProviderAdapter>,
  tokens: Arc<TokenMetadataCache>,
  native: NativeCurrency,
  /// Usable token addresses to read.
  tracked: Vec<Address>,
  /// Usable vault address, if configured.
  vault: Option<Address>,
  /// Share decimals from config; read from the vault otherwise.
  share_decimals: Option<u8>,
  config: BalanceConfig,
  /// Last known snapshot.
  snapshot: RwLock<Option<BalanceSnapshot>>,
  /// Bumped by `clear()`; a refresh started before it is not stored.
  generation: AtomicU64,
}

impl BalanceTracker {
  pub fn new(
    provider: Arc<ProviderAdapter>,
    tokens: Arc<TokenMetadataCache>,
    native: NativeCurrency,
    tracked: Vec<Address>,
    vault: Option<Address>,
    share_decimals: Option<u8>,
    config: BalanceConfig,
  ) -> Self {
    Self {
      provider,
      tokens,
      native,
      tracked,
      vault,
      share_decimals,
      config,
      snapshot: RwLock::new(None),
      generation: AtomicU64::new(0),
    }
  }

  /// The last stored snapshot.
  pub async fn snapshot(&self) -> Option<BalanceSnapshot> {
    self.snapshot.read().await.clone()
  }

  /// Forget the snapshot (session reset).
  pub async fn clear(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
    *self.snapshot.write().await = None;
  }

  /// Read every balance for `account` on `chain_id`.
  ///
  /// The snapshot is stored even when some assets failed. Returns
  /// `BalanceRefresh` when at least one non-noise error occurred.
  #[instrument(skip(self))]
  pub async fn refresh(&self, chain_id: u64, account: Address) -> Result<BalanceSnapshot, OrchestratorError> {
    let generation = self.generation.load(Ordering::SeqCst);
    let previous = self
      .snapshot()
      .await
      .filter(|s| s.matches(chain_id, account));
    let mut surfaced: Vec<String> = Vec::new();

    let (native, native_error) = match self.provider.native_balance(account).await {
      Ok(wei) => (format_units(wei, self.native.decimals), None),
      Err(e) => {
        let kept = previous.as_ref().map_or_else(|| "0.0".to_string(), |s| s.native.clone());
        (kept, self.classify(&self.native.symbol, &e, &mut surfaced))
      }
    };

    let reads = join_all(self.tracked.iter().map(|token| self.token_balance(chain_id, account, *token))).await;
    let mut per_token = BTreeMap::new();
    for (token, read) in self.tracked.iter().zip(reads) {
      let line = match read {
        Ok(line) => line,
        Err((symbol, e)) => {
          let label = symbol.clone().unwrap_or_else(|| token.to_string());
          let error = self.classify_message(&label, e, &mut surfaced);
          AssetBalance {
            symbol,
            amount: None,
            error,
          }
        }
      };
      per_token.insert(*token, line);
    }

    let vault_shares = match self.vault {
      None => None,
      Some(vault) => Some(match self.vault_shares(chain_id, account, vault).await {
        Ok((shares, decimals, symbol)) => AssetBalance::ok(symbol, format_units(shares, decimals)),
        Err(e) => {
          let error = self.classify(SHARE_SYMBOL, &e, &mut surfaced);
          AssetBalance {
            symbol: Some(SHARE_SYMBOL.to_string()),
            amount: None,
            error,
          }
        }
      }),
    };

    let snapshot = BalanceSnapshot {
      chain_id,
      account,
      native,
      native_error,
      per_token,
      vault_shares,
      updated_at: Utc::now(),
    };

    if self.generation.load(Ordering::SeqCst) == generation {
      *self.snapshot.write().await = Some(snapshot.clone());
    } else {
      debug!("Session reset during refresh, snapshot discarded");
    }

    if surfaced.is_empty() {
      info!(native = %snapshot.native, tokens = snapshot.per_token.len(), "Balances refreshed");
      Ok(snapshot)
    } else {
      Err(OrchestratorError::BalanceRefresh(surfaced.join("; ")))
    }
  }

  /// Raw vault share balance for `account`.
  pub async fn read_shares(&self, vault: Address, account: Address) -> Result<U256, ProviderError> {
    let ret = self
      .provider
      .call(vault, &IErc4626Vault::balanceOfCall { account })
      .await?;
    Ok(ret._0)
  }

  /// Share decimals: configured value, else vault metadata, else native.
  pub async fn share_decimals(&self, chain_id: u64, vault: Address) -> u8 {
    self.share_metadata(chain_id, vault).await.1
  }

  async fn share_metadata(&self, chain_id: u64, vault: Address) -> (String, u8) {
    if let Some(decimals) = self.share_decimals {
      return (SHARE_SYMBOL.to_string(), decimals);
    }
    match self.tokens.resolve(chain_id, vault).await {
      Ok(info) => (info.symbol, info.decimals),
      Err(e) => {
        debug!(error = %e, "Vault exposes no share metadata, using native decimals");
        (SHARE_SYMBOL.to_string(), self.native.decimals)
      }
    }
  }

  async fn vault_shares(
    &self,
    chain_id: u64,
    account: Address,
    vault: Address,
  ) -> Result<(U256, u8, String), ProviderError> {
    let shares = self.read_shares(vault, account).await?;
    let (symbol, decimals) = self.share_metadata(chain_id, vault).await;
    Ok((shares, decimals, symbol))
  }

  async fn token_balance(
    &self,
    chain_id: u64,
    account: Address,
    token: Address,
  ) -> Result<AssetBalance, (Option<String>, String)> {
    let info = self
      .tokens
      .resolve(chain_id, token)
      .await
      .map_err(|e| (None, e.to_string()))?;
    let ret = self
      .provider
      .call(token, &IErc20::balanceOfCall { account })
      .await
      .map_err(|e| (Some(info.symbol.clone()), e.message()))?;
    Ok(AssetBalance::ok(info.symbol, format_units(ret._0, info.decimals)))
  }

  fn classify(&self, label: &str, err: &ProviderError, surfaced: &mut Vec<String>) -> Option<String> {
    self.classify_message(label, err.message(), surfaced)
  }

  /// Noise is logged and dropped; anything else is kept per asset and
  /// surfaced.
  fn classify_message(&self, label: &str, message: String, surfaced: &mut Vec<String>) -> Option<String> {
    if self.config.is_noise(&message) {
      debug!(asset = label, error = %message, "Ignoring name-resolution noise");
      return None;
    }
    warn!(asset = label, error = %message, "Balance read failed");
    surfaced.push(format!("{label}: {message}"));
    Some(message)
  }
}
