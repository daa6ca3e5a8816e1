//! Wallet Provider Adapter - Typed EIP-1193 Calls
//!
//! Wraps the injected wallet behind typed helpers for every JSON-RPC
//! method the orchestrator needs. Contract reads go through `eth_call`
//! with alloy `sol!` encoding; writes go through `eth_sendTransaction`
//! and are confirmed by polling `eth_getTransactionReceipt`.
//!
//! The provider is stored type-erased (`Arc<dyn WalletProvider>`) so the
//! use-case layer never sees the concrete wallet type.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use alloy::primitives::{Address, Bytes, TxHash, U256, hex};
use alloy::sol_types::SolCall;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use super::contracts::TxRequest;
use crate::adapters::metrics::OrchestratorMetrics;
use crate::config::TransactionConfig;
use crate::domain::chain::ChainDescriptor;
use crate::ports::wallet_provider::{ProviderError, ProviderEvent, WalletProvider};

/// Minimal view of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    /// `status == 0x1`. Pre-Byzantium receipts without a status count as success.
    pub succeeded: bool,
}

/// Receipt polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolling {
    pub interval: Duration,
    pub timeout: Duration,
}

impl ReceiptPolling {
    pub fn from_config(config: &TransactionConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.receipt_poll_interval_ms),
            timeout: Duration::from_secs(config.receipt_timeout_secs),
        }
    }
}

/// Shared adapter over the injected wallet.
///
/// All use cases share one adapter so the event capability is probed
/// exactly once and every request is traced and timed in one place.
pub struct ProviderAdapter {
    /// The injected wallet (type-erased).
    provider: Arc<dyn WalletProvider>,
    /// Event receiver captured at construction; `None` when the wallet
    /// cannot push notifications.
    events: Option<Mutex<broadcast::Receiver<ProviderEvent>>>,
    /// Optional RPC latency / error metrics.
    metrics: Option<Arc<OrchestratorMetrics>>,
}

impl ProviderAdapter {
    /// Wrap a wallet provider, probing its event capability once.
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        let events = provider.subscribe().map(Mutex::new);
        debug!(events = events.is_some(), "Wallet provider attached");
        Self {
            provider,
            events,
            metrics: None,
        }
    }

    /// Attach a metrics registry for RPC timing.
    pub fn with_metrics(mut self, metrics: Arc<OrchestratorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether the wallet can push account/chain notifications.
    pub fn supports_events(&self) -> bool {
        self.events.is_some()
    }

    /// A fresh receiver for wallet notifications, if supported.
    pub fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        let rx = self.events.as_ref()?.lock().ok()?;
        Some(rx.resubscribe())
    }

    /// Raw request, traced and timed.
    #[instrument(skip(self, params), level = "debug")]
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, ProviderError> {
        let started = Instant::now();
        let result = self.provider.request(method, params).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;

        if let Some(metrics) = &self.metrics {
            metrics.observe_rpc(method, elapsed_ms, result.is_ok());
        }
        if let Err(e) = &result {
            debug!(method, error = %e, elapsed_ms, "Wallet request failed");
        }
        result
    }

    /// `eth_chainId`.
    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let raw = self.request("eth_chainId", Vec::new()).await?;
        parse_u64("eth_chainId", &raw)
    }

    /// `eth_requestAccounts`: prompts the user to expose accounts.
    pub async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let raw = self.request("eth_requestAccounts", Vec::new()).await?;
        parse_addresses("eth_requestAccounts", &raw)
    }

    /// `wallet_switchEthereumChain`.
    pub async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        self.request(
            "wallet_switchEthereumChain",
            vec![json!({ "chainId": format!("{chain_id:#x}") })],
        )
        .await
        .map(|_| ())
    }

    /// `wallet_addEthereumChain` with the full descriptor.
    pub async fn add_chain(&self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        self.request("wallet_addEthereumChain", vec![chain.add_chain_params()])
            .await
            .map(|_| ())
    }

    /// `eth_getBalance` at the latest block.
    pub async fn native_balance(&self, account: Address) -> Result<U256, ProviderError> {
        let raw = self
            .request("eth_getBalance", vec![json!(account.to_string()), json!("latest")])
            .await?;
        parse_quantity("eth_getBalance", &raw)
    }

    /// `eth_getCode` at the latest block.
    pub async fn code_at(&self, address: Address) -> Result<Bytes, ProviderError> {
        let raw = self
            .request("eth_getCode", vec![json!(address.to_string()), json!("latest")])
            .await?;
        parse_bytes("eth_getCode", &raw)
    }

    /// Read-only contract call, ABI-encoded and decoded through alloy.
    pub async fn call<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return, ProviderError> {
        let params = vec![
            json!({
                "to": to.to_string(),
                "data": hex::encode_prefixed(call.abi_encode()),
            }),
            json!("latest"),
        ];
        let raw = self.request("eth_call", params).await?;
        let data = parse_bytes("eth_call", &raw)?;
        C::abi_decode_returns(&data, true).map_err(|e| ProviderError::InvalidResponse {
            method: "eth_call".to_string(),
            message: format!("cannot decode {} result: {e}", C::SIGNATURE),
        })
    }

    /// `eth_sendTransaction`: hands the request to the wallet for signing.
    ///
    /// Suspends while the user reviews the prompt.
    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<TxHash, ProviderError> {
        let raw = self.request("eth_sendTransaction", vec![tx.to_params()]).await?;
        raw.as_str()
            .and_then(|s| s.parse::<TxHash>().ok())
            .ok_or_else(|| invalid("eth_sendTransaction", &raw))
    }

    /// `eth_getTransactionReceipt`; `None` while pending.
    pub async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, ProviderError> {
        let raw = self
            .request("eth_getTransactionReceipt", vec![json!(tx_hash.to_string())])
            .await?;
        if raw.is_null() {
            return Ok(None);
        }
        let method = "eth_getTransactionReceipt";
        if !raw.is_object() {
            return Err(invalid(method, &raw));
        }

        let succeeded = match raw.get("status") {
            None | Some(Value::Null) => true,
            Some(status) => parse_u64(method, status)? == 1,
        };
        let block_number = match raw.get("blockNumber") {
            None | Some(Value::Null) => None,
            Some(block) => Some(parse_u64(method, block)?),
        };

        Ok(Some(TxReceipt {
            tx_hash,
            block_number,
            succeeded,
        }))
    }

    /// Poll for a receipt until it appears or `polling.timeout` elapses.
    ///
    /// A timeout means the transaction is treated as dropped.
    #[instrument(skip(self, polling), fields(tx = %tx_hash))]
    pub async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        polling: ReceiptPolling,
    ) -> Result<TxReceipt, ProviderError> {
        let deadline = tokio::time::Instant::now() + polling.timeout;
        loop {
            if let Some(receipt) = self.transaction_receipt(tx_hash).await? {
                debug!(block = ?receipt.block_number, succeeded = receipt.succeeded, "Receipt found");
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ProviderError::ReceiptTimeout(tx_hash.to_string()));
            }
            tokio::time::sleep(polling.interval).await;
        }
    }
}

fn invalid(method: &str, raw: &Value) -> ProviderError {
    ProviderError::InvalidResponse {
        method: method.to_string(),
        message: format!("got {raw}"),
    }
}

/// Hex quantity (`"0x1a"`) or JSON number.
fn parse_u64(method: &str, raw: &Value) -> Result<u64, ProviderError> {
    match raw {
        Value::Number(n) => n.as_u64().ok_or_else(|| invalid(method, raw)),
        Value::String(s) => {
            let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
            match digits {
                Some("") => Ok(0),
                Some(hex) => u64::from_str_radix(hex, 16).map_err(|_| invalid(method, raw)),
                None => s.parse().map_err(|_| invalid(method, raw)),
            }
        }
        _ => Err(invalid(method, raw)),
    }
}

fn parse_quantity(method: &str, raw: &Value) -> Result<U256, ProviderError> {
    let s = raw.as_str().ok_or_else(|| invalid(method, raw))?;
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| invalid(method, raw))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).map_err(|_| invalid(method, raw))
}

fn parse_bytes(method: &str, raw: &Value) -> Result<Bytes, ProviderError> {
    let s = raw.as_str().ok_or_else(|| invalid(method, raw))?;
    hex::decode(s).map(Bytes::from).map_err(|_| invalid(method, raw))
}

fn parse_addresses(method: &str, raw: &Value) -> Result<Vec<Address>, ProviderError> {
    let items = raw.as_array().ok_or_else(|| invalid(method, raw))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|s| s.parse::<Address>().ok())
                .ok_or_else(|| invalid(method, item))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::adapters::chain::contracts::IErc20;

    /// Answers every method with a fixed value.
    struct Fixed(Value);

    #[async_trait]
    impl WalletProvider for Fixed {
        async fn request(&self, _method: &str, _params: Vec<Value>) -> Result<Value, ProviderError> {
            Ok(self.0.clone())
        }

        fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
            None
        }
    }

    fn adapter(answer: Value) -> ProviderAdapter {
        ProviderAdapter::new(Arc::new(Fixed(answer)))
    }

    #[test]
    fn test_parse_u64_forms() {
        assert_eq!(parse_u64("m", &json!("0x15a9")).ok(), Some(5545));
        assert_eq!(parse_u64("m", &json!(6545)).ok(), Some(6545));
        assert_eq!(parse_u64("m", &json!("0x")).ok(), Some(0));
        assert!(parse_u64("m", &json!("0xzz")).is_err());
        assert!(parse_u64("m", &json!(null)).is_err());
    }

    #[test]
    fn test_parse_quantity_large() {
        let wei = parse_quantity("eth_getBalance", &json!("0xde0b6b3a7640000")).expect("valid hex");
        assert_eq!(wei, U256::from(1_000_000_000_000_000_000u128));
        assert!(parse_quantity("eth_getBalance", &json!("1000")).is_err());
    }

    #[tokio::test]
    async fn test_chain_id_and_no_events() {
        let provider = adapter(json!("0x15a9"));
        assert_eq!(provider.chain_id().await.ok(), Some(5545));
        assert!(!provider.supports_events());
        assert!(provider.events().is_none());
    }

    #[tokio::test]
    async fn test_call_decodes_return() {
        let encoded = IErc20::decimalsCall::abi_encode_returns(&(18u8,));
        let provider = adapter(json!(hex::encode_prefixed(encoded)));
        let decimals = provider
            .call(Address::repeat_byte(1), &IErc20::decimalsCall {})
            .await
            .expect("decodes");
        assert_eq!(decimals._0, 18);
    }

    #[tokio::test]
    async fn test_call_empty_result_is_invalid() {
        let provider = adapter(json!("0x"));
        let err = provider
            .call(Address::repeat_byte(1), &IErc20::symbolCall {})
            .await
            .expect_err("empty return data cannot decode");
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_receipt_status() {
        let hash = TxHash::repeat_byte(7);
        let provider = adapter(json!({ "status": "0x0", "blockNumber": "0x10" }));
        let receipt = provider.transaction_receipt(hash).await.expect("ok").expect("mined");
        assert!(!receipt.succeeded);
        assert_eq!(receipt.block_number, Some(16));

        let pending = adapter(Value::Null);
        assert!(pending.transaction_receipt(hash).await.expect("ok").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_receipt_times_out() {
        let provider = adapter(Value::Null);
        let polling = ReceiptPolling {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(1),
        };
        let err = provider
            .wait_for_receipt(TxHash::repeat_byte(1), polling)
            .await
            .expect_err("never mined");
        assert!(matches!(err, ProviderError::ReceiptTimeout(_)));
    }
}
