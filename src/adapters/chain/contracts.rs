//! Contract Bindings - ERC-20, Wrapped Native and Vault ABIs
//!
//! `sol!` bindings for every contract the orchestrator calls, plus
//! builders that turn a high-level intent (wrap, approve, deposit,
//! withdraw) into an unsigned transaction request for the wallet.
//! Addresses always come from configuration.

use alloy::primitives::{Address, Bytes, U256, hex};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde_json::{Value, json};

use crate::config::VaultKind;

sol! {
    /// Minimal ERC-20 surface.
    #[derive(Debug)]
    interface IErc20 {
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// WETH-style wrapper around the native currency.
    interface IWrappedNative {
        function deposit() external payable;
        function withdraw(uint256 amount) external;
    }

    /// ERC-4626-style vault.
    interface IErc4626Vault {
        function deposit(uint256 assets, address receiver) external returns (uint256 shares);
        function withdraw(uint256 shares, address receiver, address owner) external returns (uint256 assets);
        function balanceOf(address account) external view returns (uint256);
    }

    /// Vault taking native currency directly.
    interface INativeVault {
        function deposit() external payable returns (uint256 shares);
        function withdraw(uint256 shares) external returns (uint256 assets);
        function balanceOf(address account) external view returns (uint256);
    }
}

/// Unsigned transaction handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub gas: u64,
}

impl TxRequest {
    /// `eth_sendTransaction` parameter object.
    pub fn to_params(&self) -> Value {
        let mut params = json!({
            "from": self.from.to_string(),
            "to": self.to.to_string(),
            "data": hex::encode_prefixed(&self.data),
            "gas": format!("{:#x}", self.gas),
        });
        if !self.value.is_zero() {
            params["value"] = Value::String(format!("0x{:x}", self.value));
        }
        params
    }

    /// First four bytes of calldata.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).and_then(|s| s.try_into().ok())
    }
}

fn tx(from: Address, to: Address, value: U256, call: impl SolCall, gas: u64) -> TxRequest {
    TxRequest {
        from,
        to,
        value,
        data: Bytes::from(call.abi_encode()),
        gas,
    }
}

/// Wrap `amount` of native currency into the wrapped token.
pub fn wrap_tx(from: Address, wrapped: Address, amount: U256, gas: u64) -> TxRequest {
    tx(from, wrapped, amount, IWrappedNative::depositCall {}, gas)
}

/// Approve `spender` for `amount` of `token`.
pub fn approve_tx(from: Address, token: Address, spender: Address, amount: U256, gas: u64) -> TxRequest {
    tx(
        from,
        token,
        U256::ZERO,
        IErc20::approveCall { spender, amount },
        gas,
    )
}

/// Deposit into the vault with `from` as receiver.
///
/// For a native-payable vault `amount` travels as transaction value.
pub fn vault_deposit_tx(kind: VaultKind, from: Address, vault: Address, amount: U256, gas: u64) -> TxRequest {
    match kind {
        VaultKind::Erc4626 => tx(
            from,
            vault,
            U256::ZERO,
            IErc4626Vault::depositCall {
                assets: amount,
                receiver: from,
            },
            gas,
        ),
        VaultKind::NativePayable => tx(from, vault, amount, INativeVault::depositCall {}, gas),
    }
}

/// Withdraw `shares` from the vault, with `from` as receiver and owner.
pub fn vault_withdraw_tx(kind: VaultKind, from: Address, vault: Address, shares: U256, gas: u64) -> TxRequest {
    match kind {
        VaultKind::Erc4626 => tx(
            from,
            vault,
            U256::ZERO,
            IErc4626Vault::withdrawCall {
                shares,
                receiver: from,
                owner: from,
            },
            gas,
        ),
        VaultKind::NativePayable => tx(from, vault, U256::ZERO, INativeVault::withdrawCall { shares }, gas),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_encoding() {
        let from = Address::repeat_byte(0x01);
        let token = Address::repeat_byte(0x02);
        let spender = Address::repeat_byte(0x03);
        let req = approve_tx(from, token, spender, U256::from(100u8), 120_000);

        assert_eq!(req.selector(), Some(IErc20::approveCall::SELECTOR));
        assert_eq!(req.to, token);
        let decoded = IErc20::approveCall::abi_decode(&req.data, true).expect("valid calldata");
        assert_eq!(decoded.spender, spender);
        assert_eq!(decoded.amount, U256::from(100u8));
    }

    #[test]
    fn test_wrap_carries_value() {
        let req = wrap_tx(Address::repeat_byte(1), Address::repeat_byte(2), U256::from(5u8), 150_000);
        assert_eq!(req.value, U256::from(5u8));
        assert_eq!(req.to_params()["value"], "0x5");
        assert_eq!(req.to_params()["gas"], "0x249f0");
    }

    #[test]
    fn test_vault_variants() {
        let from = Address::repeat_byte(1);
        let vault = Address::repeat_byte(9);
        let erc = vault_deposit_tx(VaultKind::Erc4626, from, vault, U256::from(7u8), 250_000);
        assert!(erc.value.is_zero());
        assert!(erc.to_params().get("value").is_none());
        let decoded = IErc4626Vault::depositCall::abi_decode(&erc.data, true).expect("valid calldata");
        assert_eq!(decoded.receiver, from);

        let native = vault_deposit_tx(VaultKind::NativePayable, from, vault, U256::from(7u8), 250_000);
        assert_eq!(native.value, U256::from(7u8));
        assert_eq!(native.selector(), Some(INativeVault::depositCall::SELECTOR));

        let withdraw = vault_withdraw_tx(VaultKind::Erc4626, from, vault, U256::from(3u8), 250_000);
        let decoded = IErc4626Vault::withdrawCall::abi_decode(&withdraw.data, true).expect("valid calldata");
        assert_eq!((decoded.shares, decoded.owner), (U256::from(3u8), from));
    }
}
