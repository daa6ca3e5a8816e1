//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use-case layer requires
//! from the outside world. Adapters and host applications implement
//! these traits.
//!
//! Port categories:
//! - `WalletProvider`: EIP-1193 style injected wallet (requests + events)

pub mod wallet_provider;

pub use wallet_provider::{ProviderError, ProviderEvent, WalletProvider};
