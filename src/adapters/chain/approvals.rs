//! ERC-20 Approval Manager - Vault Spend Allowances
//!
//! Reads the current allowance for (owner, vault) and only submits an
//! `approve` transaction when it does not already cover the requested
//! amount. Confirmation is left to the caller, which owns the receipt
//! polling policy.

use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use tracing::{info, instrument};

use super::contracts::{IErc20, approve_tx};
use super::provider::ProviderAdapter;
use crate::config::{ApprovalMode, TransactionConfig};
use crate::ports::wallet_provider::ProviderError;

/// Outcome of comparing the current allowance to a requested amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPlan {
    /// Existing allowance covers the amount; no transaction needed.
    Sufficient { current: U256 },
    /// An approval for `amount` must be submitted.
    Required { current: U256, amount: U256 },
}

/// Manages ERC-20 approvals for the connected account.
pub struct ApprovalManager {
    /// Shared wallet adapter.
    provider: Arc<ProviderAdapter>,
    /// Exact or unlimited approvals.
    mode: ApprovalMode,
    /// Gas limit attached to approve transactions.
    gas_limit: u64,
}

impl ApprovalManager {
    pub fn new(provider: Arc<ProviderAdapter>, mode: ApprovalMode, gas_limit: u64) -> Self {
        Self {
            provider,
            mode,
            gas_limit,
        }
    }

    pub fn from_config(provider: Arc<ProviderAdapter>, config: &TransactionConfig) -> Self {
        Self::new(provider, config.approval_mode, config.gas_limit_approve)
    }

    /// `allowance(owner, spender)` on `token`.
    pub async fn current_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ProviderError> {
        let ret = self
            .provider
            .call(token, &IErc20::allowanceCall { owner, spender })
            .await?;
        Ok(ret._0)
    }

    /// Decide whether an approval transaction is needed for `amount`.
    #[instrument(skip(self))]
    pub async fn plan(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<ApprovalPlan, ProviderError> {
        let current = self.current_allowance(token, owner, spender).await?;
        if current >= amount {
            info!(%current, %amount, "Allowance sufficient");
            return Ok(ApprovalPlan::Sufficient { current });
        }

        let amount = match self.mode {
            ApprovalMode::Exact => amount,
            ApprovalMode::Unlimited => U256::MAX,
        };
        Ok(ApprovalPlan::Required { current, amount })
    }

    /// Submit `approve(spender, amount)` and return the hash without
    /// waiting for confirmation.
    #[instrument(skip(self))]
    pub async fn submit(
        &self,
        owner: Address,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ProviderError> {
        let tx = approve_tx(owner, token, spender, amount, self.gas_limit);
        let hash = self.provider.send_transaction(&tx).await?;
        info!(%hash, %spender, %amount, "Approval submitted");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::hex;
    use alloy::sol_types::SolCall;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::broadcast;

    use crate::ports::wallet_provider::{ProviderEvent, WalletProvider};

    /// Wallet whose every `eth_call` returns the same allowance.
    struct AllowanceOf(U256);

    #[async_trait]
    impl WalletProvider for AllowanceOf {
        async fn request(&self, method: &str, _params: Vec<Value>) -> Result<Value, ProviderError> {
            match method {
                "eth_call" => Ok(json!(hex::encode_prefixed(
                    IErc20::allowanceCall::abi_encode_returns(&(self.0,))
                ))),
                other => Err(ProviderError::rpc(-32601, format!("{other} not supported"))),
            }
        }

        fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
            None
        }
    }

    fn manager(allowance: u64, mode: ApprovalMode) -> ApprovalManager {
        let provider = Arc::new(ProviderAdapter::new(Arc::new(AllowanceOf(U256::from(allowance)))));
        ApprovalManager::new(provider, mode, 120_000)
    }

    #[tokio::test]
    async fn test_sufficient_allowance_skips() {
        let m = manager(500, ApprovalMode::Exact);
        let plan = m
            .plan(Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3), U256::from(500))
            .await
            .expect("allowance read");
        assert_eq!(plan, ApprovalPlan::Sufficient { current: U256::from(500) });
    }

    #[tokio::test]
    async fn test_insufficient_allowance_requires() {
        let owner = Address::repeat_byte(2);
        let exact = manager(10, ApprovalMode::Exact)
            .plan(Address::repeat_byte(1), owner, Address::repeat_byte(3), U256::from(500))
            .await
            .expect("allowance read");
        assert_eq!(
            exact,
            ApprovalPlan::Required {
                current: U256::from(10),
                amount: U256::from(500)
            }
        );

        let unlimited = manager(10, ApprovalMode::Unlimited)
            .plan(Address::repeat_byte(1), owner, Address::repeat_byte(3), U256::from(500))
            .await
            .expect("allowance read");
        assert!(matches!(unlimited, ApprovalPlan::Required { amount, .. } if amount == U256::MAX));
    }
}
