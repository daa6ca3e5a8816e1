//! Token Metadata Cache Use Case - Symbol/Decimals Memoization
//!
//! Resolves `symbol()` and `decimals()` for every ERC-20 the orchestrator
//! touches and memoizes them per (chain id, address). Concurrent lookups
//! of the same key share one in-flight resolution. Failed resolutions
//! are not cached, and `clear()` (called on every session reset) makes
//! any resolution still in flight finish without populating the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::Address;
use futures_util::future::{BoxFuture, FutureExt, Shared, join_all};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use crate::adapters::chain::ProviderAdapter;
use crate::adapters::chain::contracts::IErc20;
use crate::domain::error::OrchestratorError;
use crate::domain::token::{TokenInfo, TokenKey};

type Resolution = Shared<BoxFuture<'static, Result<TokenInfo, OrchestratorError>>>;

/// Memoized token metadata for the current session.
pub struct TokenMetadataCache {
  provider: Arc<ProviderAdapter>,
  /// Successfully resolved entries.
  resolved: RwLock<HashMap<TokenKey, TokenInfo>>,
  /// Resolutions currently running, shared by every waiter.
  in_flight: Mutex<HashMap<TokenKey, Resolution>>,
  /// Bumped by `clear()`; results from an older generation are dropped.
  generation: AtomicU64,
}

impl TokenMetadataCache {
  pub fn new(provider: Arc<ProviderAdapter>) -> Self {
    Self {
      provider,
      resolved: RwLock::new(HashMap::new()),
      in_flight: Mutex::new(HashMap::new()),
      generation: AtomicU64::new(0),
    }
  }

  /// Cached entry, without touching the chain.
  pub async fn get(&self, chain_id: u64, address: Address) -> Option<TokenInfo> {
    self.resolved.read().await.get(&TokenKey::new(chain_id, address)).cloned()
  }

  /// Resolve metadata for `address` on `chain_id`.
  ///
  /// # Errors
  /// `InvalidToken` when the address has no code or the metadata calls
  /// fail. The failure is not cached.
  #[instrument(skip(self))]
  pub async fn resolve(&self, chain_id: u64, address: Address) -> Result<TokenInfo, OrchestratorError> {
    let key = TokenKey::new(chain_id, address);
    if let Some(info) = self.get(chain_id, address).await {
      return Ok(info);
    }

    let generation = self.generation.load(Ordering::SeqCst);
    let resolution = {
      let mut in_flight = self.in_flight.lock().await;
      // Re-check under the lock: a finished resolution writes `resolved`
      // before leaving `in_flight`.
      if let Some(info) = self.resolved.read().await.get(&key) {
        return Ok(info.clone());
      }
      match in_flight.get(&key) {
        Some(existing) => {
          debug!("Joining in-flight resolution");
          existing.clone()
        }
        None => {
          let fut = fetch(Arc::clone(&self.provider), address).boxed().shared();
          in_flight.insert(key, fut.clone());
          fut
        }
      }
    };

    let result = resolution.clone().await;

    if let Ok(info) = &result {
      if self.generation.load(Ordering::SeqCst) == generation {
        self.resolved.write().await.insert(key, info.clone());
      } else {
        debug!("Session reset during resolution, result discarded");
      }
    }

    let mut in_flight = self.in_flight.lock().await;
    if in_flight.get(&key).is_some_and(|f| f.ptr_eq(&resolution)) {
      in_flight.remove(&key);
    }

    result
  }

  /// Resolve every address, logging failures as warnings only.
  pub async fn prefetch(&self, chain_id: u64, addresses: &[Address]) -> usize {
    let results = join_all(addresses.iter().map(|addr| self.resolve(chain_id, *addr))).await;
    let mut resolved = 0;
    for (addr, result) in addresses.iter().zip(results) {
      match result {
        Ok(info) => {
          debug!(token = %addr, symbol = %info.symbol, decimals = info.decimals, "Token metadata cached");
          resolved += 1;
        }
        Err(e) => warn!(token = %addr, error = %e, "Token metadata prefetch failed"),
      }
    }
    resolved
  }

  /// Drop every entry and orphan in-flight resolutions.
  pub async fn clear(&self) {
    self.generation.fetch_add(1, Ordering::SeqCst);
    self.resolved.write().await.clear();
    self.in_flight.lock().await.clear();
  }

  /// Number of cached entries.
  pub async fn len(&self) -> usize {
    self.resolved.read().await.len()
  }
}

/// One metadata read: code check, then `symbol()` and `decimals()`.
async fn fetch(provider: Arc<ProviderAdapter>, address: Address) -> Result<TokenInfo, OrchestratorError> {
  let invalid = |message: String| OrchestratorError::InvalidToken { address, message };

  let code = provider.code_at(address).await.map_err(|e| invalid(e.message()))?;
  if code.is_empty() {
    return Err(invalid("no contract code at this address".to_string()));
  }

  let symbol_call = IErc20::symbolCall {};
  let decimals_call = IErc20::decimalsCall {};
  let (symbol, decimals) = tokio::try_join!(
    provider.call(address, &symbol_call),
    provider.call(address, &decimals_call),
  )
  .map_err(|e| invalid(e.message()))?;

  Ok(TokenInfo {
    address,
    symbol: symbol._0,
    decimals: decimals._0,
  })
}
