//! Use Cases Layer - Application Business Logic
//!
//! Combines domain types with the wallet port to implement the
//! orchestrator's workflows.
//!
//! Use cases:
//! - `Orchestrator`: Operation state machine (connect, approve, deposit, withdraw)
//! - `NetworkGuard`: Switch/add the target chain before any action
//! - `TokenMetadataCache`: Memoized symbol/decimals with in-flight dedup
//! - `BalanceTracker`: Native, token and vault share balances
//! - `SessionStore` / `SessionListener`: Session ownership and invalidation

pub mod balance_tracker;
pub mod network_guard;
pub mod orchestrator;
pub mod session;
pub mod token_cache;

pub use balance_tracker::BalanceTracker;
pub use network_guard::{NetworkGuard, UnknownChainPolicy};
pub use orchestrator::{NO_SHARES_NOTICE, Orchestrator};
pub use session::{SessionListener, SessionSignal, SessionStore};
pub use token_cache::TokenMetadataCache;
