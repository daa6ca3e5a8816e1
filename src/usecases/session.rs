//! Session Use Case - Wallet Session Ownership and Invalidation
//!
//! `SessionStore` is the single owner of the `WalletSession`. It is only
//! changed through `establish` and `reset`, and each change bumps an
//! epoch counter so that in-flight operations can notice that the
//! account or chain they started with is gone.
//!
//! `SessionListener` turns wallet notifications into discrete
//! `SessionSignal`s. It runs as a spawned task owned by the orchestrator
//! and is aborted when dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::Address;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::session::{InvalidationCause, WalletSession};
use crate::ports::wallet_provider::ProviderEvent;

/// Owned wallet session plus its change counter.
pub struct SessionStore {
  session: watch::Sender<WalletSession>,
  epoch: AtomicU64,
}

impl Default for SessionStore {
  fn default() -> Self {
    Self::new()
  }
}

impl SessionStore {
  pub fn new() -> Self {
    Self {
      session: watch::Sender::new(WalletSession::default()),
      epoch: AtomicU64::new(0),
    }
  }

  /// Record a freshly connected session. Returns the new epoch.
  pub fn establish(&self, address: Address, chain_id: u64) -> u64 {
    self.session.send_replace(WalletSession::connected(address, chain_id));
    let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    info!(%address, chain_id, epoch, "Wallet session established");
    epoch
  }

  /// Drop the session entirely. Returns the new epoch.
  pub fn reset(&self) -> u64 {
    self.session.send_replace(WalletSession::default());
    let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    debug!(epoch, "Wallet session reset");
    epoch
  }

  pub fn current(&self) -> WalletSession {
    *self.session.borrow()
  }

  pub fn epoch(&self) -> u64 {
    self.epoch.load(Ordering::SeqCst)
  }
}

/// Signal delivered to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
  /// Shared session state must be reset.
  Invalidated(InvalidationCause),
}

/// Background task converting wallet events into session signals.
pub struct SessionListener {
  handle: JoinHandle<()>,
}

impl SessionListener {
  /// Spawn the listener on the current runtime.
  ///
  /// Events that restate the current session are ignored, as is anything
  /// that arrives while no session is established. A lagged receiver
  /// counts as an invalidation since events were lost.
  pub fn spawn<F, Fut>(
    mut events: broadcast::Receiver<ProviderEvent>,
    store: Arc<SessionStore>,
    on_signal: F,
  ) -> Self
  where
    F: Fn(SessionSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let handle = tokio::spawn(async move {
      loop {
        let cause = match events.recv().await {
          Ok(event) => match invalidation_for(&store.current(), event) {
            Some(cause) => cause,
            None => continue,
          },
          Err(broadcast::error::RecvError::Lagged(missed)) => {
            warn!(missed, "Wallet event stream lagged");
            if !store.current().is_connected() {
              continue;
            }
            InvalidationCause::EventsLagged(missed)
          }
          Err(broadcast::error::RecvError::Closed) => {
            debug!("Wallet event stream closed");
            break;
          }
        };
        info!(%cause, "Wallet session invalidated");
        on_signal(SessionSignal::Invalidated(cause)).await;
      }
    });
    Self { handle }
  }

  pub fn is_finished(&self) -> bool {
    self.handle.is_finished()
  }
}

impl Drop for SessionListener {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

/// `None` when the event leaves the session as it is.
fn invalidation_for(session: &WalletSession, event: ProviderEvent) -> Option<InvalidationCause> {
  let (address, chain_id) = session.active()?;
  match event {
    ProviderEvent::AccountsChanged(accounts) => {
      if accounts.first() == Some(&address) {
        None
      } else {
        Some(InvalidationCause::AccountsChanged(accounts))
      }
    }
    ProviderEvent::ChainChanged(id) if id == chain_id => None,
    ProviderEvent::ChainChanged(id) => Some(InvalidationCause::ChainChanged(id)),
    ProviderEvent::Disconnect(reason) => Some(InvalidationCause::Disconnected(reason)),
  }
}
