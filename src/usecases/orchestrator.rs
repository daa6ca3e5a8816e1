//! Transaction Orchestrator Use Case - Wallet and Vault Operations
//!
//! Sequences every multi-step operation against the vault:
//! network switch → optional wrap → allowance approval → vault
//! deposit/withdraw → balance refresh. Exactly one operation runs at a
//! time; a second request while one is in flight is rejected with
//! `Busy` and leaves the running one untouched.
//!
//! Observable state (`StatusView`) is published on a `watch` channel.
//! Each step checks the session epoch when it finishes, so an account
//! or chain change lands the operation in `Failed(SessionChanged)`
//! instead of letting it continue against a stale account.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::balance_tracker::BalanceTracker;
use super::network_guard::{NetworkGuard, UnknownChainPolicy};
use super::session::{SessionListener, SessionSignal, SessionStore};
use super::token_cache::TokenMetadataCache;
use crate::adapters::chain::contracts::{TxRequest, vault_deposit_tx, vault_withdraw_tx, wrap_tx};
use crate::adapters::chain::{ApprovalManager, ApprovalPlan, ProviderAdapter, ReceiptPolling};
use crate::adapters::metrics::OrchestratorMetrics;
use crate::config::{AppConfig, ResolvedContracts, TransactionConfig, VaultKind};
use crate::domain::address::short_address;
use crate::domain::amount::{AmountError, format_units, parse_amount, scale_amount};
use crate::domain::balance::BalanceSnapshot;
use crate::domain::chain::ChainDescriptor;
use crate::domain::error::OrchestratorError;
use crate::domain::operation::{
  AssetChoice, Failure, OperationKind, OperationReport, OperationRequest, OperationState, RequestedAmount, Step,
};
use crate::domain::session::WalletSession;
use crate::domain::status::{BusyFlags, ConnectionStatus, StatusView};
use crate::domain::token::TokenInfo;
use crate::ports::wallet_provider::{ProviderError, ProviderEvent, WalletProvider};

/// Notice published when a withdraw finds nothing to withdraw.
pub const NO_SHARES_NOTICE: &str = "No shares to withdraw";

/// The wallet-and-vault orchestrator.
///
/// Cheap to share behind an `Arc`; every command takes `&self`.
pub struct Orchestrator {
  inner: Arc<Inner>,
  /// Wallet event listener for the current session (aborted on drop).
  listener: Mutex<Option<SessionListener>>,
}

struct Inner {
  provider: Arc<ProviderAdapter>,
  chain: ChainDescriptor,
  contracts: ResolvedContracts,
  placeholders: Vec<Address>,
  transactions: TransactionConfig,
  polling: ReceiptPolling,
  guard: NetworkGuard,
  tokens: Arc<TokenMetadataCache>,
  balances: BalanceTracker,
  approvals: ApprovalManager,
  session: Arc<SessionStore>,
  status: watch::Sender<StatusView>,
  metrics: Option<Arc<OrchestratorMetrics>>,
}

/// Bookkeeping for the live operation.
struct Run {
  id: Uuid,
  kind: OperationKind,
  /// Session epoch the operation is bound to.
  epoch: u64,
  step: Step,
  states: Vec<OperationState>,
  tx_hashes: Vec<TxHash>,
  started_at: DateTime<Utc>,
}

/// How a deposit is funded.
#[derive(Debug, Clone, Copy)]
enum Funding {
  /// Native value sent straight to a payable vault.
  NativeDirect,
  /// Wrap native currency first, then deposit the wrapped token.
  WrapThenDeposit { wrapped: Address },
  /// Deposit an ERC-20 the account already holds.
  Token { token: Address },
}

impl Funding {
  fn is_native(self) -> bool {
    matches!(self, Funding::NativeDirect | Funding::WrapThenDeposit { .. })
  }
}

/// Successful result of an operation body.
struct Outcome {
  message: String,
  notice: Option<String>,
}

impl Outcome {
  fn done(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      notice: None,
    }
  }

  fn notice(message: impl Into<String>) -> Self {
    let message = message.into();
    Self {
      notice: Some(message.clone()),
      message,
    }
  }
}

impl Orchestrator {
  /// Build an orchestrator for `provider` from validated configuration.
  pub fn new(provider: Arc<dyn WalletProvider>, config: &AppConfig) -> anyhow::Result<Self> {
    Self::build(provider, config, None)
  }

  /// Same as `new`, recording RPC and operation metrics.
  pub fn with_metrics(
    provider: Arc<dyn WalletProvider>,
    config: &AppConfig,
    metrics: Arc<OrchestratorMetrics>,
  ) -> anyhow::Result<Self> {
    Self::build(provider, config, Some(metrics))
  }

  fn build(
    provider: Arc<dyn WalletProvider>,
    config: &AppConfig,
    metrics: Option<Arc<OrchestratorMetrics>>,
  ) -> anyhow::Result<Self> {
    let chain = config.chain.resolve()?;
    chain
      .validate()
      .map_err(|e| anyhow::anyhow!("Invalid target chain: {e}"))?;

    let placeholders = config.balances.placeholders();
    let contracts = config.contracts.resolve(&placeholders);

    let mut adapter = ProviderAdapter::new(provider);
    if let Some(metrics) = &metrics {
      adapter = adapter.with_metrics(Arc::clone(metrics));
    }
    let provider = Arc::new(adapter);

    let guard = NetworkGuard::new(
      Arc::clone(&provider),
      chain.clone(),
      UnknownChainPolicy::from_config(&config.network),
    );
    let tokens = Arc::new(TokenMetadataCache::new(Arc::clone(&provider)));
    let balances = BalanceTracker::new(
      Arc::clone(&provider),
      Arc::clone(&tokens),
      chain.native_currency.clone(),
      contracts.tracked_tokens(),
      contracts.vault.usable(),
      contracts.share_decimals,
      config.balances.clone(),
    );
    let approvals = ApprovalManager::from_config(Arc::clone(&provider), &config.transactions);

    info!(
      chain = %chain.name,
      chain_id = chain.chain_id,
      vault_kind = ?contracts.vault_kind,
      events = provider.supports_events(),
      "Orchestrator ready"
    );

    let inner = Inner {
      provider,
      polling: ReceiptPolling::from_config(&config.transactions),
      transactions: config.transactions.clone(),
      chain,
      contracts,
      placeholders,
      guard,
      tokens,
      balances,
      approvals,
      session: Arc::new(SessionStore::new()),
      status: watch::Sender::new(StatusView::default()),
      metrics,
    };

    Ok(Self {
      inner: Arc::new(inner),
      listener: Mutex::new(None),
    })
  }

  /// Current observable state.
  pub fn status(&self) -> StatusView {
    self.inner.status.borrow().clone()
  }

  /// State of the live (or last) operation.
  pub fn state(&self) -> OperationState {
    self.inner.status.borrow().operation.clone()
  }

  /// Watch every status change.
  pub fn subscribe(&self) -> watch::Receiver<StatusView> {
    self.inner.status.subscribe()
  }

  pub fn session(&self) -> WalletSession {
    self.inner.session.current()
  }

  pub fn target_chain(&self) -> &ChainDescriptor {
    &self.inner.chain
  }

  pub fn metrics(&self) -> Option<&Arc<OrchestratorMetrics>> {
    self.inner.metrics.as_ref()
  }

  /// Dispatch a request to the matching command.
  pub async fn execute(&self, request: OperationRequest) -> Result<OperationReport, OrchestratorError> {
    match (request.kind, request.amount) {
      (OperationKind::Connect, _) => self.connect().await,
      (OperationKind::Approve, RequestedAmount::Exact(amount)) => self.approve_asset(&amount, request.asset).await,
      (OperationKind::Deposit, RequestedAmount::Exact(amount)) => self.deposit(&amount, request.asset).await,
      (OperationKind::Withdraw, RequestedAmount::All) => self.withdraw().await,
      (OperationKind::Withdraw, RequestedAmount::Exact(amount)) => self.withdraw_shares(&amount).await,
      (kind @ (OperationKind::Approve | OperationKind::Deposit), RequestedAmount::All) => Err(
        self
          .inner
          .reject(kind, AmountError::NotNumeric("all".to_string()).into()),
      ),
    }
  }

  /// Connect the wallet: request accounts, enforce the target network,
  /// record the session, prefetch token metadata and read balances.
  pub async fn connect(&self) -> Result<OperationReport, OrchestratorError> {
    let mut run = self.inner.begin(OperationKind::Connect, Step::Connecting, false)?;

    self.stop_listener();
    if self.inner.session.current().is_connected() {
      self.inner.reset_shared_state().await;
    }
    // Subscribe before prompting so nothing sent during connect is lost.
    let events = self.inner.provider.events();

    let result = self.inner.run_connect(&mut run).await;
    if result.is_ok() {
      match events {
        Some(events) => self.start_listener(events),
        None => debug!("Wallet cannot push events; session changes need a manual reconnect"),
      }
    }
    self.inner.finish(run, result).await
  }

  /// Forget the session and every chain-scoped cache.
  pub async fn disconnect(&self) {
    self.stop_listener();
    self.inner.reset_shared_state().await;
    self.inner.status.send_modify(|view| {
      view.connection = ConnectionStatus::Disconnected;
      view.balances = None;
      view.message = "Wallet disconnected.".to_string();
    });
    info!("Wallet disconnected");
  }

  /// Approve the vault to spend `amount` of `asset` (native means the
  /// wrapped token).
  pub async fn approve_asset(&self, amount: &str, asset: AssetChoice) -> Result<OperationReport, OrchestratorError> {
    let kind = OperationKind::Approve;
    let amount = self.inner.validate_amount(kind, amount)?;
    let (vault, token) = self.inner.approval_route(asset).map_err(|e| self.inner.reject(kind, e))?;
    if matches!(asset, AssetChoice::Native) {
      self.inner.validate_native_scale(kind, amount)?;
    }
    let mut run = self.inner.begin(kind, Step::SwitchingNetwork, true)?;

    let result = self.inner.run_approve(&mut run, amount, token, vault).await;
    self.inner.finish(run, result).await
  }

  /// Deposit `amount` of `asset` into the vault.
  pub async fn deposit(&self, amount: &str, asset: AssetChoice) -> Result<OperationReport, OrchestratorError> {
    let kind = OperationKind::Deposit;
    let amount = self.inner.validate_amount(kind, amount)?;
    let (vault, funding) = self.inner.deposit_route(asset).map_err(|e| self.inner.reject(kind, e))?;
    if funding.is_native() {
      self.inner.validate_native_scale(kind, amount)?;
    }
    let mut run = self.inner.begin(kind, Step::SwitchingNetwork, true)?;

    let result = self.inner.run_deposit(&mut run, amount, vault, funding).await;
    self.inner.finish(run, result).await
  }

  /// Withdraw every vault share the account holds.
  pub async fn withdraw(&self) -> Result<OperationReport, OrchestratorError> {
    let kind = OperationKind::Withdraw;
    let vault = self.inner.vault().map_err(|e| self.inner.reject(kind, e))?;
    let mut run = self.inner.begin(kind, Step::SwitchingNetwork, true)?;

    let result = self.inner.run_withdraw(&mut run, vault, None).await;
    self.inner.finish(run, result).await
  }

  /// Withdraw a specific number of shares.
  pub async fn withdraw_shares(&self, amount: &str) -> Result<OperationReport, OrchestratorError> {
    let kind = OperationKind::Withdraw;
    let amount = self.inner.validate_amount(kind, amount)?;
    let vault = self.inner.vault().map_err(|e| self.inner.reject(kind, e))?;
    let mut run = self.inner.begin(kind, Step::SwitchingNetwork, true)?;

    let result = self.inner.run_withdraw(&mut run, vault, Some(amount)).await;
    self.inner.finish(run, result).await
  }

  /// Re-read balances for the current session and publish them.
  pub async fn refresh_balances(&self) -> Result<BalanceSnapshot, OrchestratorError> {
    let (account, chain_id) = self
      .inner
      .session
      .current()
      .active()
      .ok_or(OrchestratorError::NotConnected)?;
    let result = self.inner.refresh_and_publish(chain_id, account).await;
    if let Err(e) = &result {
      let message = format!("Balance refresh failed: {e}");
      self.inner.status.send_modify(|view| view.message = message);
    }
    result
  }

  fn start_listener(&self, events: broadcast::Receiver<ProviderEvent>) {
    let inner = Arc::clone(&self.inner);
    let listener = SessionListener::spawn(events, Arc::clone(&self.inner.session), move |signal| {
      let inner = Arc::clone(&inner);
      async move { inner.on_session_signal(signal).await }
    });
    if let Ok(mut slot) = self.listener.lock() {
      *slot = Some(listener);
    }
  }

  fn stop_listener(&self) {
    let previous = self.listener.lock().ok().and_then(|mut slot| slot.take());
    drop(previous);
  }
}

impl Inner {
  // ---------------------------------------------------------------------
  // Request gating
  // ---------------------------------------------------------------------

  fn validate_amount(&self, kind: OperationKind, raw: &str) -> Result<Decimal, OrchestratorError> {
    parse_amount(raw).map_err(|e| self.reject(kind, e.into()))
  }

  /// Native decimals are static, so precision is checked up front.
  fn validate_native_scale(&self, kind: OperationKind, amount: Decimal) -> Result<(), OrchestratorError> {
    scale_amount(amount, self.chain.native_currency.decimals)
      .map(drop)
      .map_err(|e| self.reject(kind, e.into()))
  }

  /// Report a request refused before it entered the state machine.
  ///
  /// The status line is only touched when nothing is in flight.
  fn reject(&self, kind: OperationKind, err: OrchestratorError) -> OrchestratorError {
    debug!(%kind, error = %err, "Request rejected");
    let message = err.status_message(kind);
    self.status.send_if_modified(|view| {
      if view.operation.is_busy() {
        return false;
      }
      view.message = message;
      true
    });
    err
  }

  fn vault(&self) -> Result<Address, OrchestratorError> {
    self
      .contracts
      .vault
      .usable()
      .ok_or_else(|| OrchestratorError::NotConfigured("vault address".to_string()))
  }

  fn wrapped_native(&self) -> Result<Address, OrchestratorError> {
    self
      .contracts
      .wrapped_native()
      .ok_or_else(|| OrchestratorError::NotConfigured("wrapped native token address".to_string()))
  }

  fn usable_token(&self, token: Address) -> Result<Address, OrchestratorError> {
    if token.is_zero() || self.placeholders.contains(&token) {
      return Err(OrchestratorError::NotConfigured(format!("token address {token}")));
    }
    Ok(token)
  }

  fn deposit_route(&self, asset: AssetChoice) -> Result<(Address, Funding), OrchestratorError> {
    let vault = self.vault()?;
    let funding = match (asset, self.contracts.vault_kind) {
      (AssetChoice::Native, VaultKind::NativePayable) => Funding::NativeDirect,
      (AssetChoice::Native, VaultKind::Erc4626) => Funding::WrapThenDeposit {
        wrapped: self.wrapped_native()?,
      },
      (AssetChoice::Token(token), VaultKind::Erc4626) => Funding::Token {
        token: self.usable_token(token)?,
      },
      (AssetChoice::Token(_), VaultKind::NativePayable) => {
        return Err(OrchestratorError::NotConfigured(
          "ERC-20 deposit route for a native-payable vault".to_string(),
        ));
      }
    };
    Ok((vault, funding))
  }

  fn approval_route(&self, asset: AssetChoice) -> Result<(Address, Address), OrchestratorError> {
    let vault = self.vault()?;
    let token = match asset {
      AssetChoice::Native => self.wrapped_native()?,
      AssetChoice::Token(token) => self.usable_token(token)?,
    };
    Ok((vault, token))
  }

  /// Atomically claim the single operation slot.
  fn begin(&self, kind: OperationKind, first: Step, require_session: bool) -> Result<Run, OrchestratorError> {
    let session = self.session.current();
    let epoch = self.session.epoch();
    let state = OperationState::entering(first);
    let message = self.progress_message(first);
    let mut outcome = Ok(());

    self.status.send_if_modified(|view| {
      if view.operation.is_busy() {
        outcome = Err(OrchestratorError::Busy { active: view.active });
        return false;
      }
      if require_session && !session.is_connected() {
        outcome = Err(OrchestratorError::NotConnected);
        view.message = OrchestratorError::NotConnected.status_message(kind);
        return true;
      }
      view.operation = state.clone();
      view.active = Some(kind);
      view.busy = BusyFlags::only(kind);
      view.message = message;
      if kind == OperationKind::Connect {
        view.connection = ConnectionStatus::Connecting;
      }
      true
    });

    if let Err(e) = outcome {
      debug!(%kind, error = %e, "Request not started");
      return Err(e);
    }

    let id = Uuid::new_v4();
    if let Some(metrics) = &self.metrics {
      metrics.record_started(kind);
    }
    info!(op = %id, %kind, "Operation started");

    Ok(Run {
      id,
      kind,
      epoch,
      step: first,
      states: vec![state],
      tx_hashes: Vec::new(),
      started_at: Utc::now(),
    })
  }

  fn progress_message(&self, step: Step) -> String {
    match step {
      Step::Connecting => "Connecting wallet...".to_string(),
      Step::SwitchingNetwork => format!("Switching to {}...", self.chain.name),
      Step::Wrapping => format!("Wrapping {}...", self.chain.native_currency.symbol),
      Step::Approving => "Approving token spend...".to_string(),
      Step::Submitting => "Confirm the transaction in your wallet...".to_string(),
      Step::Confirming => "Waiting for confirmation...".to_string(),
    }
  }

  // ---------------------------------------------------------------------
  // Step bookkeeping
  // ---------------------------------------------------------------------

  fn enter(&self, run: &mut Run, step: Step) {
    let state = OperationState::entering(step);
    run.step = step;
    run.states.push(state.clone());
    let message = self.progress_message(step);
    self.status.send_modify(|view| {
      view.operation = state;
      view.message = message;
    });
    debug!(op = %run.id, ?step, "Entered step");
  }

  /// Fail when the session changed since the operation started.
  fn checkpoint(&self, run: &Run) -> Result<(), OrchestratorError> {
    if self.session.epoch() == run.epoch {
      return Ok(());
    }
    warn!(op = %run.id, step = ?run.step, "Session changed mid-operation");
    Err(OrchestratorError::SessionChanged)
  }

  fn record_submission(&self, run: &mut Run, hash: TxHash) {
    run.tx_hashes.push(hash);
    let link = self
      .chain
      .tx_url(&hash.to_string())
      .unwrap_or_else(|| hash.to_string());
    self.status.send_modify(|view| {
      view.last_tx_hash = Some(hash);
      view.message = format!("Transaction submitted: {link}");
    });
    info!(op = %run.id, step = ?run.step, tx = %hash, "Transaction submitted");
  }

  async fn submit(&self, run: &mut Run, tx: &TxRequest) -> Result<TxHash, OrchestratorError> {
    let hash = self
      .provider
      .send_transaction(tx)
      .await
      .map_err(|e| step_error(run.step, e, None))?;
    self.record_submission(run, hash);
    Ok(hash)
  }

  async fn confirm(&self, run: &Run, hash: TxHash) -> Result<(), OrchestratorError> {
    let receipt = self
      .provider
      .wait_for_receipt(hash, self.polling)
      .await
      .map_err(|e| step_error(run.step, e, Some(hash)))?;
    if !receipt.succeeded {
      return Err(reverted(run.step, hash));
    }
    debug!(op = %run.id, tx = %hash, block = ?receipt.block_number, "Transaction confirmed");
    Ok(())
  }

  /// Network guard plus session check.
  async fn switch_network(&self, run: &Run) -> Result<u64, OrchestratorError> {
    let chain_id = self.guard.ensure_target_network().await?;
    self.checkpoint(run)?;
    Ok(chain_id)
  }

  fn account(&self, run: &Run) -> Result<Address, OrchestratorError> {
    self.checkpoint(run)?;
    self
      .session
      .current()
      .address
      .ok_or(OrchestratorError::SessionChanged)
  }

  // ---------------------------------------------------------------------
  // Operation bodies
  // ---------------------------------------------------------------------

  #[instrument(skip_all, fields(op = %run.id))]
  async fn run_connect(&self, run: &mut Run) -> Result<Outcome, OrchestratorError> {
    let accounts = self
      .provider
      .request_accounts()
      .await
      .map_err(|e| step_error(Step::Connecting, e, None))?;
    let account = accounts
      .first()
      .copied()
      .ok_or_else(|| OrchestratorError::ConnectionFailed("wallet exposed no accounts".to_string()))?;

    self.enter(run, Step::SwitchingNetwork);
    let chain_id = self.guard.ensure_target_network().await?;

    run.epoch = self.session.establish(account, chain_id);
    self.status.send_modify(|view| {
      view.connection = ConnectionStatus::Connected {
        address: account,
        chain_id,
      };
    });

    let tracked = self.contracts.tracked_tokens();
    let cached = self.tokens.prefetch(chain_id, &tracked).await;
    debug!(cached, tracked = tracked.len(), "Token metadata prefetched");

    Ok(Outcome::done(format!(
      "Connected to {} | {}",
      self.chain.name,
      short_address(&account)
    )))
  }

  #[instrument(skip_all, fields(op = %run.id, token = %token))]
  async fn run_approve(
    &self,
    run: &mut Run,
    amount: Decimal,
    token: Address,
    vault: Address,
  ) -> Result<Outcome, OrchestratorError> {
    let chain_id = self.switch_network(run).await?;
    let account = self.account(run)?;
    let info = self.tokens.resolve(chain_id, token).await?;
    let value = scale_amount(amount, info.decimals)?;

    let approved = self.ensure_allowance(run, account, &info, vault, value).await?;
    if approved {
      Ok(Outcome::done(format!("Approved {amount} {} for the vault.", info.symbol)))
    } else {
      Ok(Outcome::notice(format!(
        "Allowance already covers {amount} {}.",
        info.symbol
      )))
    }
  }

  #[instrument(skip_all, fields(op = %run.id, funding = ?funding))]
  async fn run_deposit(
    &self,
    run: &mut Run,
    amount: Decimal,
    vault: Address,
    funding: Funding,
  ) -> Result<Outcome, OrchestratorError> {
    let chain_id = self.switch_network(run).await?;
    let account = self.account(run)?;
    let kind = self.contracts.vault_kind;

    let symbol = match funding {
      Funding::NativeDirect => {
        let value = scale_amount(amount, self.chain.native_currency.decimals)?;
        let tx = vault_deposit_tx(kind, account, vault, value, self.transactions.gas_limit_vault);
        self.vault_transaction(run, &tx).await?;
        self.chain.native_currency.symbol.clone()
      }
      Funding::WrapThenDeposit { wrapped } => {
        let info = self.tokens.resolve(chain_id, wrapped).await?;
        let value = scale_amount(amount, self.chain.native_currency.decimals)?;

        self.enter(run, Step::Wrapping);
        let tx = wrap_tx(account, wrapped, value, self.transactions.gas_limit_wrap);
        let hash = self.submit(run, &tx).await?;
        self.confirm(run, hash).await?;
        self.checkpoint(run)?;

        // Some nodes serve the pre-wrap balance for a moment.
        let settle = Duration::from_millis(self.transactions.wrap_settle_delay_ms);
        if !settle.is_zero() {
          tokio::time::sleep(settle).await;
        }

        self.ensure_allowance(run, account, &info, vault, value).await?;
        let tx = vault_deposit_tx(kind, account, vault, value, self.transactions.gas_limit_vault);
        self.vault_transaction(run, &tx).await?;
        info.symbol
      }
      Funding::Token { token } => {
        let info = self.tokens.resolve(chain_id, token).await?;
        let value = scale_amount(amount, info.decimals)?;

        self.ensure_allowance(run, account, &info, vault, value).await?;
        let tx = vault_deposit_tx(kind, account, vault, value, self.transactions.gas_limit_vault);
        self.vault_transaction(run, &tx).await?;
        info.symbol
      }
    };

    Ok(Outcome::done(format!("Deposit confirmed: {amount} {symbol}.")))
  }

  #[instrument(skip_all, fields(op = %run.id))]
  async fn run_withdraw(
    &self,
    run: &mut Run,
    vault: Address,
    requested: Option<Decimal>,
  ) -> Result<Outcome, OrchestratorError> {
    let chain_id = self.switch_network(run).await?;
    let account = self.account(run)?;

    let shares = self
      .balances
      .read_shares(vault, account)
      .await
      .map_err(read_error)?;
    if shares.is_zero() {
      info!(op = %run.id, "No vault shares, nothing submitted");
      return Ok(Outcome::notice(NO_SHARES_NOTICE));
    }

    let amount = match requested {
      None => shares,
      Some(requested) => {
        let decimals = self.balances.share_decimals(chain_id, vault).await;
        let value = scale_amount(requested, decimals)?;
        if value > shares {
          return Err(
            AmountError::ExceedsBalance {
              amount: requested.to_string(),
              available: format_units(shares, decimals),
            }
            .into(),
          );
        }
        value
      }
    };

    let tx = vault_withdraw_tx(
      self.contracts.vault_kind,
      account,
      vault,
      amount,
      self.transactions.gas_limit_vault,
    );
    self.vault_transaction(run, &tx).await?;
    Ok(Outcome::done("Withdrawal confirmed."))
  }

  /// Approve `vault` for `amount` unless the allowance already covers it.
  ///
  /// Returns whether an approval transaction was sent. `Approving` is
  /// only entered when one is needed.
  async fn ensure_allowance(
    &self,
    run: &mut Run,
    account: Address,
    token: &TokenInfo,
    vault: Address,
    amount: U256,
  ) -> Result<bool, OrchestratorError> {
    // A failed allowance read is reported against Approving.
    let resumed = std::mem::replace(&mut run.step, Step::Approving);
    let plan = self
      .approvals
      .plan(token.address, account, vault, amount)
      .await
      .map_err(|e| step_error(Step::Approving, e, None))?;

    let approve_amount = match plan {
      ApprovalPlan::Sufficient { current } => {
        run.step = resumed;
        debug!(op = %run.id, %current, "Skipping approval");
        if let Some(metrics) = &self.metrics {
          metrics.approvals_skipped.inc();
        }
        return Ok(false);
      }
      ApprovalPlan::Required { amount, .. } => amount,
    };

    self.enter(run, Step::Approving);
    let hash = self
      .approvals
      .submit(account, token.address, vault, approve_amount)
      .await
      .map_err(|e| step_error(Step::Approving, e, None))?;
    self.record_submission(run, hash);
    self.confirm(run, hash).await?;
    self.checkpoint(run)?;
    Ok(true)
  }

  /// `Submitting` then `Confirming` for a vault call.
  async fn vault_transaction(&self, run: &mut Run, tx: &TxRequest) -> Result<TxHash, OrchestratorError> {
    self.enter(run, Step::Submitting);
    let hash = self.submit(run, tx).await?;
    self.checkpoint(run)?;

    self.enter(run, Step::Confirming);
    self.confirm(run, hash).await?;
    self.checkpoint(run)?;
    Ok(hash)
  }

  // ---------------------------------------------------------------------
  // Completion
  // ---------------------------------------------------------------------

  async fn finish(
    &self,
    mut run: Run,
    result: Result<Outcome, OrchestratorError>,
  ) -> Result<OperationReport, OrchestratorError> {
    let kind = run.kind;
    match result {
      Ok(outcome) => {
        run.states.push(OperationState::Succeeded);
        let message = outcome.message.clone();
        self.status.send_modify(|view| {
          view.operation = OperationState::Succeeded;
          view.busy = BusyFlags::default();
          view.message = message;
        });
        if let Some(metrics) = &self.metrics {
          metrics.record_succeeded(kind);
        }
        info!(op = %run.id, %kind, txs = run.tx_hashes.len(), "Operation succeeded");

        // Unconditional refresh; its failure never downgrades the result.
        let refresh_error = match self.session.current().active() {
          Some((account, chain_id)) if self.session.epoch() == run.epoch => self
            .refresh_and_publish(chain_id, account)
            .await
            .err()
            .map(|e| e.to_string()),
          _ => None,
        };
        if let Some(error) = &refresh_error {
          let message = format!("{} (balances may be stale: {error})", outcome.message);
          self.status.send_modify(|view| view.message = message);
        }

        Ok(OperationReport {
          id: run.id,
          kind,
          states: run.states,
          tx_hashes: run.tx_hashes,
          notice: outcome.notice,
          balance_refresh_error: refresh_error,
          started_at: run.started_at,
          finished_at: Utc::now(),
        })
      }
      Err(err) => {
        let failure = Failure {
          reason: err.reason(),
          step: Some(run.step),
          message: err.to_string(),
        };
        warn!(
          op = %run.id,
          %kind,
          step = ?run.step,
          reason = failure.reason.as_str(),
          error = %err,
          "Operation failed"
        );
        if let Some(metrics) = &self.metrics {
          metrics.record_failed(kind, failure.reason);
        }

        let session = self.session.current();
        let message = err.status_message(kind);
        self.status.send_modify(|view| {
          view.operation = OperationState::Failed(failure);
          view.busy = BusyFlags::default();
          view.message = message;
          if kind == OperationKind::Connect && !session.is_connected() {
            view.connection = ConnectionStatus::Disconnected;
          }
        });
        Err(err)
      }
    }
  }

  async fn refresh_and_publish(&self, chain_id: u64, account: Address) -> Result<BalanceSnapshot, OrchestratorError> {
    let result = self.balances.refresh(chain_id, account).await;
    if result.is_err() {
      if let Some(metrics) = &self.metrics {
        metrics.balance_refresh_failures.inc();
      }
    }
    let snapshot = self.balances.snapshot().await;
    self.status.send_modify(|view| view.balances = snapshot);
    result
  }

  // ---------------------------------------------------------------------
  // Session invalidation
  // ---------------------------------------------------------------------

  async fn on_session_signal(&self, signal: SessionSignal) {
    let SessionSignal::Invalidated(cause) = signal;
    self.reset_shared_state().await;
    let message = format!("Wallet session reset ({cause}). Please reconnect.");
    self.status.send_modify(|view| {
      view.connection = ConnectionStatus::Disconnected;
      view.balances = None;
      view.message = message;
    });
  }

  /// Full reset of every chain-scoped cache.
  async fn reset_shared_state(&self) {
    self.session.reset();
    let discarded = self.tokens.len().await;
    self.tokens.clear().await;
    debug!(discarded, "Chain-scoped caches cleared");
    self.balances.clear().await;
    if let Some(metrics) = &self.metrics {
      metrics.session_resets.inc();
    }
  }
}

/// Classify a wallet error raised while `step` was running.
fn step_error(step: Step, err: ProviderError, tx_hash: Option<TxHash>) -> OrchestratorError {
  if err.is_user_rejection() {
    return OrchestratorError::UserRejected(err.message());
  }
  let message = err.message();
  match step {
    Step::Connecting => OrchestratorError::ConnectionFailed(message),
    Step::SwitchingNetwork => OrchestratorError::NetworkMismatch(message),
    Step::Wrapping => OrchestratorError::WrapFailed(message),
    Step::Approving => OrchestratorError::ApprovalFailed(message),
    Step::Submitting | Step::Confirming => OrchestratorError::TransactionFailed { tx_hash, message },
  }
}

/// A mined transaction whose status is 0.
fn reverted(step: Step, hash: TxHash) -> OrchestratorError {
  let message = format!("transaction {hash} reverted");
  match step {
    Step::Wrapping => OrchestratorError::WrapFailed(message),
    Step::Approving => OrchestratorError::ApprovalFailed(message),
    _ => OrchestratorError::TransactionFailed {
      tx_hash: Some(hash),
      message,
    },
  }
}

fn read_error(err: ProviderError) -> OrchestratorError {
  if err.is_user_rejection() {
    OrchestratorError::UserRejected(err.message())
  } else {
    OrchestratorError::ReadFailed(err.message())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_step_error_classification() {
    let rejected = ProviderError::rpc(4001, "User denied transaction signature.");
    assert_eq!(
      step_error(Step::Wrapping, rejected, None),
      OrchestratorError::UserRejected("User denied transaction signature.".into())
    );

    let revert = ProviderError::rpc(-32000, "execution reverted");
    assert!(matches!(
      step_error(Step::Approving, revert.clone(), None),
      OrchestratorError::ApprovalFailed(_)
    ));
    let hash = TxHash::repeat_byte(4);
    assert_eq!(
      step_error(Step::Confirming, revert, Some(hash)),
      OrchestratorError::TransactionFailed {
        tx_hash: Some(hash),
        message: "execution reverted".into()
      }
    );
  }

  #[test]
  fn test_reverted_keeps_hash() {
    let hash = TxHash::repeat_byte(9);
    assert!(matches!(reverted(Step::Wrapping, hash), OrchestratorError::WrapFailed(_)));
    assert!(matches!(
      reverted(Step::Confirming, hash),
      OrchestratorError::TransactionFailed { tx_hash: Some(h), .. } if h == hash
    ));
  }

  #[test]
  fn test_outcome_notice_doubles_as_message() {
    let outcome = Outcome::notice(NO_SHARES_NOTICE);
    assert_eq!(outcome.notice.as_deref(), Some(NO_SHARES_NOTICE));
    assert_eq!(outcome.message, NO_SHARES_NOTICE);
  }
}
