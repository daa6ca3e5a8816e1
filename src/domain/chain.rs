//! Chain Registry - Static Target Chain Descriptors
//!
//! Immutable descriptions of the EVM chains the orchestrator knows how
//! to target. Exactly one descriptor is selected as the target chain at
//! configuration time; everything else in the crate reads it by reference.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Native currency of a chain (what `eth_getBalance` is denominated in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Immutable description of one supported chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Human-readable chain name shown in wallet prompts.
    pub name: String,
    /// Native currency metadata.
    pub native_currency: NativeCurrency,
    /// RPC endpoints, in preference order.
    pub rpc_urls: Vec<String>,
    /// Block explorer base URLs, in preference order.
    #[serde(default)]
    pub explorer_urls: Vec<String>,
}

impl ChainDescriptor {
    /// The `0x`-prefixed hex chain id expected by wallet RPC methods.
    pub fn hex_chain_id(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// Build the `wallet_addEthereumChain` parameter object.
    pub fn add_chain_params(&self) -> Value {
        json!({
            "chainId": self.hex_chain_id(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.explorer_urls,
        })
    }

    /// Explorer link for a transaction hash, if an explorer is known.
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_urls
            .first()
            .map(|base| format!("{}/tx/{tx_hash}", base.trim_end_matches('/')))
    }

    /// Structural checks run when the descriptor comes from configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.chain_id == 0 {
            return Err("chain_id must be non-zero".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("chain name must not be empty".to_string());
        }
        if self.rpc_urls.is_empty() {
            return Err(format!("chain {} has no RPC URLs", self.name));
        }
        if self.native_currency.symbol.trim().is_empty() {
            return Err(format!("chain {} has no native currency symbol", self.name));
        }
        Ok(())
    }
}

/// Built-in chain descriptors, keyed by a stable registry name.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    entries: Vec<(&'static str, ChainDescriptor)>,
}

impl ChainRegistry {
    /// Registry containing every chain this crate ships a descriptor for.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                ("duckchain-mainnet", duckchain_mainnet()),
                ("duckchain-testnet", duckchain_testnet()),
            ],
        }
    }

    /// Look up a descriptor by registry key (case-insensitive).
    pub fn by_key(&self, key: &str) -> Option<&ChainDescriptor> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, chain)| chain)
    }

    /// Look up a descriptor by chain id.
    pub fn by_chain_id(&self, chain_id: u64) -> Option<&ChainDescriptor> {
        self.entries
            .iter()
            .find(|(_, chain)| chain.chain_id == chain_id)
            .map(|(_, chain)| chain)
    }

    /// Registry keys, in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }
}

fn ton() -> NativeCurrency {
    NativeCurrency {
        name: "TON".to_string(),
        symbol: "TON".to_string(),
        decimals: 18,
    }
}

/// DuckChain mainnet (TON-denominated EVM chain).
pub fn duckchain_mainnet() -> ChainDescriptor {
    ChainDescriptor {
        chain_id: 5545,
        name: "DuckChain Mainnet".to_string(),
        native_currency: ton(),
        rpc_urls: vec![
            "https://rpc.duckchain.io".to_string(),
            "https://duckchain-mainnet.public.blastapi.io".to_string(),
        ],
        explorer_urls: vec!["https://scan.duckchain.io".to_string()],
    }
}

/// DuckChain testnet.
pub fn duckchain_testnet() -> ChainDescriptor {
    ChainDescriptor {
        chain_id: 6545,
        name: "DuckChain Testnet".to_string(),
        native_currency: ton(),
        rpc_urls: vec!["https://testnet-rpc.duckchain.io".to_string()],
        explorer_urls: vec!["https://scan-testnet.duckchain.io".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_chain_id() {
        assert_eq!(duckchain_mainnet().hex_chain_id(), "0x15a9");
    }

    #[test]
    fn test_add_chain_params_shape() {
        let params = duckchain_mainnet().add_chain_params();
        assert_eq!(params["chainId"], "0x15a9");
        assert_eq!(params["chainName"], "DuckChain Mainnet");
        assert_eq!(params["nativeCurrency"]["decimals"], 18);
        assert_eq!(params["rpcUrls"].as_array().map(Vec::len), Some(2));
        assert_eq!(params["blockExplorerUrls"][0], "https://scan.duckchain.io");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ChainRegistry::builtin();
        assert_eq!(registry.by_key("DuckChain-Mainnet").map(|c| c.chain_id), Some(5545));
        assert_eq!(
            registry.by_chain_id(6545).map(|c| c.name.as_str()),
            Some("DuckChain Testnet")
        );
        assert!(registry.by_chain_id(1).is_none());
        assert_eq!(registry.keys().count(), 2);
    }

    #[test]
    fn test_validate_rejects_missing_rpc() {
        let mut chain = duckchain_testnet();
        chain.rpc_urls.clear();
        assert!(chain.validate().is_err());
        assert!(duckchain_testnet().validate().is_ok());
    }

    #[test]
    fn test_tx_url() {
        let url = duckchain_mainnet().tx_url("0xabc");
        assert_eq!(url.as_deref(), Some("https://scan.duckchain.io/tx/0xabc"));
    }
}
