//! Shared test fixtures: an in-memory EVM wallet and a test config.
//!
//! `FakeWallet` answers the EIP-1193 methods the orchestrator uses and
//! keeps just enough chain state (balances, allowances, vault shares) for
//! transactions to have visible effects. Individual methods can be held
//! open with `hold()` to observe in-flight states.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, TxHash, U256, hex};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Notify, broadcast};

use yield_vault_orchestrator::adapters::chain::contracts::{
    IErc20, IErc4626Vault, INativeVault, IWrappedNative,
};
use yield_vault_orchestrator::config::AppConfig;
use yield_vault_orchestrator::config::loader::load_config_str;
use yield_vault_orchestrator::ports::{ProviderError, ProviderEvent, WalletProvider};

pub const TARGET_CHAIN: u64 = 5545;

pub fn vault() -> Address {
    Address::repeat_byte(0xf1)
}

pub fn wrapped() -> Address {
    Address::repeat_byte(0xe1)
}

pub fn usdt() -> Address {
    Address::repeat_byte(0xd1)
}

pub fn alice() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn bob() -> Address {
    Address::repeat_byte(0xbb)
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18))
}

/// Config for an ERC-4626 vault over the wrapped native token.
pub fn erc4626_config() -> AppConfig {
    config_with(&format!(
        r#"
[chain]
target = "duckchain-mainnet"

[contracts]
vault = "{vault}"
vault_kind = "erc4626"
wrapped_native = "{wrapped}"
share_decimals = 18
tokens = [{{ label = "USDT", address = "{usdt}" }}]

[transactions]
receipt_poll_interval_ms = 10
receipt_timeout_secs = 5
wrap_settle_delay_ms = 0
"#,
        vault = vault(),
        wrapped = wrapped(),
        usdt = usdt(),
    ))
}

/// Config for a vault that takes native currency directly.
pub fn native_vault_config() -> AppConfig {
    config_with(&format!(
        r#"
[chain]
target = "duckchain-mainnet"

[contracts]
vault = "{vault}"
vault_kind = "native_payable"
share_decimals = 18

[transactions]
receipt_poll_interval_ms = 10
receipt_timeout_secs = 5
wrap_settle_delay_ms = 0
"#,
        vault = vault(),
    ))
}

pub fn config_with(toml: &str) -> AppConfig {
    load_config_str(toml).expect("test config should load")
}

/// One transaction the wallet signed.
#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub selector: [u8; 4],
    pub data: Bytes,
}

/// Mutable chain state behind the fake wallet.
#[derive(Debug, Default)]
pub struct ChainState {
    pub chain_id: u64,
    pub known_chains: HashSet<u64>,
    pub accounts: Vec<Address>,
    /// Returned by every `wallet_switchEthereumChain` when set.
    pub switch_error: Option<ProviderError>,
    /// Returned by every `wallet_addEthereumChain` when set.
    pub add_error: Option<ProviderError>,
    /// Addresses with contract code.
    pub code: HashSet<Address>,
    /// ERC-20 metadata by address.
    pub tokens: HashMap<Address, (String, u8)>,
    /// Underlying asset of each ERC-4626 vault.
    pub vault_assets: HashMap<Address, Address>,
    pub native: HashMap<Address, U256>,
    /// (contract, holder) -> balance. Vault shares live here too.
    pub balances: HashMap<(Address, Address), U256>,
    /// (token, owner, spender) -> allowance.
    pub allowances: HashMap<(Address, Address, Address), U256>,
    /// Transactions with these selectors are mined with status 0.
    pub revert_selectors: HashSet<[u8; 4]>,
    /// Transactions with these selectors are declined in the wallet.
    pub reject_selectors: HashSet<[u8; 4]>,
    /// Errors returned for `eth_call` to these contracts.
    pub call_errors: HashMap<Address, ProviderError>,
    pub receipts: HashMap<TxHash, bool>,
    pub sent: Vec<SentTx>,
    /// Every method requested, in order (logged before any gate).
    pub log: Vec<String>,
    nonce: u64,
}

/// In-memory EIP-1193 wallet.
pub struct FakeWallet {
    state: Mutex<ChainState>,
    events: broadcast::Sender<ProviderEvent>,
    push_events: bool,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl FakeWallet {
    /// Wallet on the target chain with the standard contracts deployed
    /// and 10 native units on alice.
    pub fn on_target() -> Self {
        let wallet = Self::bare(TARGET_CHAIN);
        wallet.with_state(|s| {
            s.accounts = vec![alice()];
            s.code.extend([vault(), wrapped(), usdt()]);
            s.tokens.insert(wrapped(), ("WDUCK".to_string(), 18));
            s.tokens.insert(usdt(), ("USDT".to_string(), 6));
            s.tokens.insert(vault(), ("vDUCK".to_string(), 18));
            s.vault_assets.insert(vault(), wrapped());
            s.native.insert(alice(), ether(10));
        });
        wallet
    }

    /// Wallet with nothing deployed, sitting on `chain_id`.
    pub fn bare(chain_id: u64) -> Self {
        let (events, _) = broadcast::channel(16);
        let state = ChainState {
            chain_id,
            known_chains: HashSet::from([chain_id]),
            ..ChainState::default()
        };
        Self {
            state: Mutex::new(state),
            events,
            push_events: true,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Same wallet without event support.
    pub fn without_events(mut self) -> Self {
        self.push_events = false;
        self
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        let mut state = self.state.lock().expect("state lock");
        f(&mut state)
    }

    /// Methods requested so far.
    pub fn log(&self) -> Vec<String> {
        self.with_state(|s| s.log.clone())
    }

    pub fn count(&self, method: &str) -> usize {
        self.with_state(|s| s.log.iter().filter(|m| m.as_str() == method).count())
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.with_state(|s| s.sent.clone())
    }

    pub fn balance_of(&self, contract: Address, holder: Address) -> U256 {
        self.with_state(|s| s.balances.get(&(contract, holder)).copied().unwrap_or_default())
    }

    /// Make the next requests for `method` wait until the returned
    /// handle is notified. Remove the gate with `release`.
    pub fn hold(&self, method: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .expect("gate lock")
            .insert(method.to_string(), Arc::clone(&gate));
        gate
    }

    /// Remove a gate and let any waiter through.
    pub fn release(&self, method: &str) {
        if let Some(gate) = self.gates.lock().expect("gate lock").remove(method) {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    /// Push a wallet notification.
    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    fn gate(&self, method: &str) -> Option<Arc<Notify>> {
        self.gates.lock().expect("gate lock").get(method).cloned()
    }

    fn handle(&self, method: &str, params: &[Value]) -> Result<Value, ProviderError> {
        let mut s = self.state.lock().expect("state lock");

        match method {
            "eth_chainId" => Ok(json!(format!("{:#x}", s.chain_id))),
            "eth_requestAccounts" | "eth_accounts" => Ok(json!(
                s.accounts.iter().map(|a| a.to_string()).collect::<Vec<_>>()
            )),
            "wallet_switchEthereumChain" => {
                if let Some(err) = &s.switch_error {
                    return Err(err.clone());
                }
                let chain_id = param_chain_id(params)?;
                if !s.known_chains.contains(&chain_id) {
                    return Err(ProviderError::rpc(
                        4902,
                        format!("Unrecognized chain ID \"{chain_id:#x}\"."),
                    ));
                }
                if s.chain_id != chain_id {
                    s.chain_id = chain_id;
                    let _ = self.events.send(ProviderEvent::ChainChanged(chain_id));
                }
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                if let Some(err) = &s.add_error {
                    return Err(err.clone());
                }
                let chain_id = param_chain_id(params)?;
                s.known_chains.insert(chain_id);
                Ok(Value::Null)
            }
            "eth_getBalance" => {
                let account = param_address(params.first())?;
                let wei = s.native.get(&account).copied().unwrap_or_default();
                Ok(json!(format!("0x{wei:x}")))
            }
            "eth_getCode" => {
                let address = param_address(params.first())?;
                Ok(json!(if s.code.contains(&address) { "0x6080" } else { "0x" }))
            }
            "eth_call" => {
                let call = params.first().ok_or_else(|| bad_params(method))?;
                let to = param_address(call.get("to"))?;
                let data = param_bytes(call.get("data"))?;
                s.eth_call(to, &data).map(|out| json!(hex::encode_prefixed(out)))
            }
            "eth_sendTransaction" => {
                let tx = params.first().ok_or_else(|| bad_params(method))?;
                s.send(tx).map(|hash| json!(hash.to_string()))
            }
            "eth_getTransactionReceipt" => {
                let hash: TxHash = params
                    .first()
                    .and_then(Value::as_str)
                    .and_then(|h| h.parse().ok())
                    .ok_or_else(|| bad_params(method))?;
                Ok(match s.receipts.get(&hash) {
                    None => Value::Null,
                    Some(ok) => json!({
                        "transactionHash": hash.to_string(),
                        "blockNumber": "0x10",
                        "status": if *ok { "0x1" } else { "0x0" },
                    }),
                })
            }
            other => Err(ProviderError::rpc(-32601, format!("method {other} not supported"))),
        }
    }
}

impl ChainState {
    fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, ProviderError> {
        if let Some(err) = self.call_errors.get(&to) {
            return Err(err.clone());
        }
        if !self.code.contains(&to) {
            return Ok(Vec::new());
        }
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(reverted)?;

        if selector == IErc20::symbolCall::SELECTOR {
            let (symbol, _) = self.tokens.get(&to).ok_or_else(reverted)?;
            Ok(IErc20::symbolCall::abi_encode_returns(&(symbol.clone(),)))
        } else if selector == IErc20::decimalsCall::SELECTOR {
            let (_, decimals) = self.tokens.get(&to).ok_or_else(reverted)?;
            Ok(IErc20::decimalsCall::abi_encode_returns(&(*decimals,)))
        } else if selector == IErc20::balanceOfCall::SELECTOR {
            let call = IErc20::balanceOfCall::abi_decode(data, true).map_err(|_| reverted())?;
            let balance = self.balances.get(&(to, call.account)).copied().unwrap_or_default();
            Ok(IErc20::balanceOfCall::abi_encode_returns(&(balance,)))
        } else if selector == IErc20::allowanceCall::SELECTOR {
            let call = IErc20::allowanceCall::abi_decode(data, true).map_err(|_| reverted())?;
            let allowance = self
                .allowances
                .get(&(to, call.owner, call.spender))
                .copied()
                .unwrap_or_default();
            Ok(IErc20::allowanceCall::abi_encode_returns(&(allowance,)))
        } else {
            Err(reverted())
        }
    }

    fn send(&mut self, tx: &Value) -> Result<TxHash, ProviderError> {
        let from = param_address(tx.get("from"))?;
        let to = param_address(tx.get("to"))?;
        let data = param_bytes(tx.get("data"))?;
        let value = match tx.get("value").and_then(Value::as_str) {
            Some(v) => U256::from_str_radix(v.trim_start_matches("0x"), 16)
                .map_err(|_| bad_params("eth_sendTransaction"))?,
            None => U256::ZERO,
        };
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| bad_params("eth_sendTransaction"))?;

        if self.reject_selectors.contains(&selector) {
            return Err(ProviderError::rpc(4001, "User denied transaction signature."));
        }

        self.nonce += 1;
        let hash = TxHash::from(U256::from(self.nonce).to_be_bytes::<32>());
        self.sent.push(SentTx {
            hash,
            from,
            to,
            value,
            selector,
            data: data.clone(),
        });

        let ok = !self.revert_selectors.contains(&selector);
        if ok {
            self.apply(from, to, value, selector, &data);
        }
        self.receipts.insert(hash, ok);
        Ok(hash)
    }

    fn apply(&mut self, from: Address, to: Address, value: U256, selector: [u8; 4], data: &[u8]) {
        let native = self.native.entry(from).or_default();
        *native = native.saturating_sub(value);

        if selector == IWrappedNative::depositCall::SELECTOR {
            // `deposit()` on a wrapper mints tokens; on a payable vault it mints shares.
            *self.balances.entry((to, from)).or_default() += value;
        } else if selector == IErc20::approveCall::SELECTOR {
            if let Ok(call) = IErc20::approveCall::abi_decode(data, true) {
                self.allowances.insert((to, from, call.spender), call.amount);
            }
        } else if selector == IErc4626Vault::depositCall::SELECTOR {
            if let (Ok(call), Some(asset)) = (
                IErc4626Vault::depositCall::abi_decode(data, true),
                self.vault_assets.get(&to).copied(),
            ) {
                let held = self.balances.entry((asset, from)).or_default();
                *held = held.saturating_sub(call.assets);
                let allowed = self.allowances.entry((asset, from, to)).or_default();
                *allowed = allowed.saturating_sub(call.assets);
                *self.balances.entry((to, call.receiver)).or_default() += call.assets;
            }
        } else if selector == IErc4626Vault::withdrawCall::SELECTOR {
            if let Ok(call) = IErc4626Vault::withdrawCall::abi_decode(data, true) {
                let shares = self.balances.entry((to, call.owner)).or_default();
                *shares = shares.saturating_sub(call.shares);
            }
        } else if selector == INativeVault::withdrawCall::SELECTOR {
            if let Ok(call) = INativeVault::withdrawCall::abi_decode(data, true) {
                let shares = self.balances.entry((to, from)).or_default();
                *shares = shares.saturating_sub(call.shares);
                *self.native.entry(from).or_default() += call.shares;
            }
        }
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
        self.with_state(|s| s.log.push(method.to_string()));
        if let Some(gate) = self.gate(method) {
            gate.notified().await;
        }
        self.handle(method, &params)
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        self.push_events.then(|| self.events.subscribe())
    }
}

fn reverted() -> ProviderError {
    ProviderError::rpc(-32000, "execution reverted")
}

fn bad_params(method: &str) -> ProviderError {
    ProviderError::rpc(-32602, format!("invalid params for {method}"))
}

fn param_chain_id(params: &[Value]) -> Result<u64, ProviderError> {
    params
        .first()
        .and_then(|p| p.get("chainId"))
        .and_then(Value::as_str)
        .and_then(|id| u64::from_str_radix(id.trim_start_matches("0x"), 16).ok())
        .ok_or_else(|| bad_params("chain request"))
}

fn param_address(value: Option<&Value>) -> Result<Address, ProviderError> {
    value
        .and_then(Value::as_str)
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| bad_params("address"))
}

fn param_bytes(value: Option<&Value>) -> Result<Bytes, ProviderError> {
    value
        .and_then(Value::as_str)
        .and_then(|d| hex::decode(d).ok())
        .map(Bytes::from)
        .ok_or_else(|| bad_params("data"))
}
