//! Configuration Module - TOML-based Orchestrator Configuration
//!
//! Loads and validates configuration from a TOML file (or string).
//! The target chain, contract addresses, wallet error matching policy
//! and transaction parameters are externalized here - nothing is
//! hardcoded in the use-case layer.

pub mod loader;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::address::ConfiguredAddress;
use crate::domain::chain::{ChainDescriptor, ChainRegistry};

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Logging options for the host application.
  #[serde(default)]
  pub logging: LoggingConfig,
  /// Target chain selection.
  pub chain: ChainConfig,
  /// Vault and token addresses.
  pub contracts: ContractConfig,
  /// Unknown-chain error matching policy.
  #[serde(default)]
  pub network: NetworkConfig,
  /// Transaction submission and confirmation parameters.
  #[serde(default)]
  pub transactions: TransactionConfig,
  /// Balance tracking options.
  #[serde(default)]
  pub balances: BalanceConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Emit JSON lines instead of human-readable output.
  #[serde(default)]
  pub json: bool,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      json: false,
    }
  }
}

/// Target chain: either a built-in registry key or an inline descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  /// Registry key such as `duckchain-mainnet`.
  pub target: Option<String>,
  /// Full descriptor; takes precedence over `target`.
  pub descriptor: Option<ChainDescriptor>,
}

impl ChainConfig {
  /// Resolve the single target descriptor.
  pub fn resolve(&self) -> Result<ChainDescriptor> {
    if let Some(descriptor) = &self.descriptor {
      return Ok(descriptor.clone());
    }
    let key = self
      .target
      .as_deref()
      .context("chain.target or chain.descriptor must be set")?;
    let registry = ChainRegistry::builtin();
    registry.by_key(key).cloned().with_context(|| {
      let known: Vec<_> = registry.keys().collect();
      format!("unknown chain key `{key}` (known: {})", known.join(", "))
    })
  }
}

/// Which vault ABI the configured vault speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultKind {
  /// `deposit(assets, receiver)` / `withdraw(shares, receiver, owner)`.
  #[default]
  Erc4626,
  /// Payable `deposit()` / `withdraw(shares)` taking native currency.
  NativePayable,
}

/// A tracked ERC-20 token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
  /// Display label used until on-chain metadata resolves.
  pub label: String,
  /// Token address (placeholders are tolerated and skipped).
  pub address: String,
}

/// Contract addresses. All of them come from config - never hardcoded.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
  /// Yield vault address.
  pub vault: String,
  /// Vault ABI flavour.
  #[serde(default)]
  pub vault_kind: VaultKind,
  /// Wrapped native token (WETH-style) used when the vault needs ERC-20.
  pub wrapped_native: Option<String>,
  /// Additional ERC-20 tokens the user may deposit.
  #[serde(default)]
  pub tokens: Vec<TokenConfig>,
  /// Vault share decimals; read from the vault when absent.
  pub share_decimals: Option<u8>,
}

/// Contract addresses after placeholder classification.
#[derive(Debug, Clone)]
pub struct ResolvedContracts {
  pub vault: ConfiguredAddress,
  pub vault_kind: VaultKind,
  pub wrapped_native: Option<ConfiguredAddress>,
  pub tokens: Vec<(String, ConfiguredAddress)>,
  pub share_decimals: Option<u8>,
}

impl ResolvedContracts {
  /// Every usable ERC-20 address whose balance should be tracked.
  pub fn tracked_tokens(&self) -> Vec<Address> {
    let mut out: Vec<Address> = self
      .tokens
      .iter()
      .filter_map(|(_, addr)| addr.usable())
      .collect();
    if let Some(wrapped) = self.wrapped_native.and_then(ConfiguredAddress::usable) {
      if !out.contains(&wrapped) {
        out.push(wrapped);
      }
    }
    out
  }

  /// The usable wrapped native address, if configured.
  pub fn wrapped_native(&self) -> Option<Address> {
    self.wrapped_native.and_then(ConfiguredAddress::usable)
  }
}

impl ContractConfig {
  /// Classify every configured address.
  pub fn resolve(&self, placeholders: &[Address]) -> ResolvedContracts {
    ResolvedContracts {
      vault: ConfiguredAddress::classify(&self.vault, placeholders),
      vault_kind: self.vault_kind,
      wrapped_native: self
        .wrapped_native
        .as_deref()
        .map(|raw| ConfiguredAddress::classify(raw, placeholders)),
      tokens: self
        .tokens
        .iter()
        .map(|t| (t.label.clone(), ConfiguredAddress::classify(&t.address, placeholders)))
        .collect(),
      share_decimals: self.share_decimals,
    }
  }
}

/// How to recognise "this chain was never added to the wallet".
///
/// Wallets disagree on the error shape, so codes and message patterns
/// are both configurable.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
  /// Error codes meaning "unknown chain" (EIP-3326 uses 4902).
  #[serde(default = "default_unknown_chain_codes")]
  pub unknown_chain_codes: Vec<i64>,
  /// Case-insensitive substrings meaning "unknown chain".
  #[serde(default = "default_unknown_chain_patterns")]
  pub unknown_chain_patterns: Vec<String>,
  /// Also inspect `data.originalError.code`.
  #[serde(default = "default_true")]
  pub inspect_nested_data: bool,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      unknown_chain_codes: default_unknown_chain_codes(),
      unknown_chain_patterns: default_unknown_chain_patterns(),
      inspect_nested_data: true,
    }
  }
}

/// How much allowance an approval grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
  /// Approve exactly the requested amount.
  #[default]
  Exact,
  /// Approve `type(uint256).max`.
  Unlimited,
}

/// Transaction parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
  /// Receipt polling interval (milliseconds).
  #[serde(default = "default_poll_interval")]
  pub receipt_poll_interval_ms: u64,
  /// Give up waiting for a receipt after this many seconds.
  #[serde(default = "default_receipt_timeout")]
  pub receipt_timeout_secs: u64,
  /// Pause after a wrap confirmation before reading allowance (milliseconds).
  #[serde(default = "default_wrap_settle_delay")]
  pub wrap_settle_delay_ms: u64,
  /// Gas limit for the wrap transaction.
  #[serde(default = "default_gas_wrap")]
  pub gas_limit_wrap: u64,
  /// Gas limit for approvals.
  #[serde(default = "default_gas_approve")]
  pub gas_limit_approve: u64,
  /// Gas limit for vault deposit/withdraw.
  #[serde(default = "default_gas_vault")]
  pub gas_limit_vault: u64,
  /// Approval size policy.
  #[serde(default)]
  pub approval_mode: ApprovalMode,
}

impl Default for TransactionConfig {
  fn default() -> Self {
    Self {
      receipt_poll_interval_ms: default_poll_interval(),
      receipt_timeout_secs: default_receipt_timeout(),
      wrap_settle_delay_ms: default_wrap_settle_delay(),
      gas_limit_wrap: default_gas_wrap(),
      gas_limit_approve: default_gas_approve(),
      gas_limit_vault: default_gas_vault(),
      approval_mode: ApprovalMode::Exact,
    }
  }
}

/// Balance tracking options.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceConfig {
  /// Substrings of errors that are expected noise (name-resolution
  /// attempts on chains without such a service). Case-sensitive.
  #[serde(default = "default_noise_patterns")]
  pub noise_patterns: Vec<String>,
  /// Addresses treated as "not configured yet".
  #[serde(default = "default_placeholders")]
  pub placeholder_addresses: Vec<String>,
}

impl Default for BalanceConfig {
  fn default() -> Self {
    Self {
      noise_patterns: default_noise_patterns(),
      placeholder_addresses: default_placeholders(),
    }
  }
}

impl BalanceConfig {
  /// Parsed placeholder list; entries that do not parse are ignored.
  pub fn placeholders(&self) -> Vec<Address> {
    self
      .placeholder_addresses
      .iter()
      .filter_map(|raw| raw.trim().parse().ok())
      .collect()
  }

  /// Whether an error message is expected noise.
  pub fn is_noise(&self, message: &str) -> bool {
    self.noise_patterns.iter().any(|p| message.contains(p.as_str()))
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_unknown_chain_codes() -> Vec<i64> {
  vec![4902]
}

fn default_unknown_chain_patterns() -> Vec<String> {
  vec!["unrecognized chain".to_string(), "unknown chain".to_string()]
}

fn default_poll_interval() -> u64 {
  1_000
}

fn default_receipt_timeout() -> u64 {
  300
}

fn default_wrap_settle_delay() -> u64 {
  800
}

fn default_gas_wrap() -> u64 {
  150_000
}

fn default_gas_approve() -> u64 {
  120_000
}

fn default_gas_vault() -> u64 {
  250_000
}

fn default_noise_patterns() -> Vec<String> {
  vec!["ENS".to_string(), "name resolution".to_string()]
}

fn default_placeholders() -> Vec<String> {
  vec!["0x1234567890123456789012345678901234567890".to_string()]
}
