//! Configuration Loader - File Loading and Validation
//!
//! Handles loading the orchestrator TOML file, validating all
//! parameters, and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::AppConfig;
use crate::domain::address::ConfiguredAddress;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  load_config_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Parse and validate configuration from TOML text.
pub fn load_config_str(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse configuration TOML")?;

  validate_config(&config)?;

  let chain = config.chain.resolve()?;
  info!(
    chain_id = chain.chain_id,
    chain = %chain.name,
    vault_kind = ?config.contracts.vault_kind,
    tokens = config.contracts.tokens.len(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A resolvable, structurally valid target chain
/// - Positive gas limits and polling parameters
/// - A non-empty unknown-chain matching policy
///
/// Placeholder contract addresses are tolerated (logged, not rejected):
/// the orchestrator refuses the affected operations at call time.
fn validate_config(config: &AppConfig) -> Result<()> {
  let chain = config.chain.resolve()?;
  chain
    .validate()
    .map_err(|e| anyhow::anyhow!("Invalid target chain: {e}"))?;

  // Transaction validation
  let tx = &config.transactions;
  anyhow::ensure!(
    tx.receipt_poll_interval_ms > 0,
    "receipt_poll_interval_ms must be positive"
  );
  anyhow::ensure!(
    tx.receipt_timeout_secs.saturating_mul(1_000) >= tx.receipt_poll_interval_ms,
    "receipt_timeout_secs ({}s) is shorter than one poll interval ({}ms)",
    tx.receipt_timeout_secs,
    tx.receipt_poll_interval_ms
  );
  for (name, limit) in [
    ("gas_limit_wrap", tx.gas_limit_wrap),
    ("gas_limit_approve", tx.gas_limit_approve),
    ("gas_limit_vault", tx.gas_limit_vault),
  ] {
    anyhow::ensure!(limit >= 21_000, "{name} must be at least 21000, got {limit}");
  }

  // Network policy validation
  let network = &config.network;
  anyhow::ensure!(
    !network.unknown_chain_codes.is_empty()
      || network.unknown_chain_patterns.iter().any(|p| !p.trim().is_empty()),
    "network policy needs at least one unknown_chain_code or unknown_chain_pattern"
  );

  anyhow::ensure!(!config.logging.level.trim().is_empty(), "logging.level must not be empty");

  // Contract addresses: warn about placeholders
  let placeholders = config.balances.placeholders();
  let resolved = config.contracts.resolve(&placeholders);
  if resolved.vault.usable().is_none() {
    warn!(vault = %config.contracts.vault, "Vault address is a placeholder; deposits disabled");
  }
  for (label, addr) in &resolved.tokens {
    if !matches!(addr, ConfiguredAddress::Usable(_)) {
      warn!(token = %label, "Token address is a placeholder; balance tracking skipped");
    }
  }

  Ok(())
}
