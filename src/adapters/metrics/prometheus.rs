//! Prometheus Metrics Registry - Orchestrator Observability
//!
//! Registers counters and histograms for wallet operations, RPC calls
//! and balance refreshes. The host application decides how to expose
//! them; `gather_text` renders the standard text exposition format.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use crate::domain::operation::{FailureReason, OperationKind};

/// Centralized Prometheus metrics for the orchestrator.
///
/// All metrics follow the naming convention `vault_orchestrator_*`.
pub struct OrchestratorMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Operations accepted, by kind.
    pub operations_started: IntCounterVec,
    /// Operations finished, by kind and outcome.
    pub operations_finished: IntCounterVec,
    /// Failures, by reason.
    pub failures: IntCounterVec,
    /// Wallet RPC latency histogram (milliseconds), by method.
    pub rpc_latency_ms: HistogramVec,
    /// Wallet RPC errors, by method.
    pub rpc_errors: IntCounterVec,
    /// Approvals skipped because the allowance already covered the amount.
    pub approvals_skipped: IntCounter,
    /// Balance refreshes that surfaced an error.
    pub balance_refresh_failures: IntCounter,
    /// Session resets triggered by wallet events.
    pub session_resets: IntCounter,
}

impl OrchestratorMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let operations_started = IntCounterVec::new(
            Opts::new(
                "vault_orchestrator_operations_started_total",
                "Operations accepted by the orchestrator",
            ),
            &["kind"],
        )?;

        let operations_finished = IntCounterVec::new(
            Opts::new(
                "vault_orchestrator_operations_finished_total",
                "Operations that reached a terminal state",
            ),
            &["kind", "outcome"],
        )?;

        let failures = IntCounterVec::new(
            Opts::new("vault_orchestrator_failures_total", "Operation failures by reason"),
            &["reason"],
        )?;

        let rpc_latency_ms = HistogramVec::new(
            HistogramOpts::new(
                "vault_orchestrator_rpc_latency_ms",
                "Wallet RPC round-trip latency in milliseconds",
            )
            .buckets(vec![5.0, 25.0, 100.0, 250.0, 1_000.0, 5_000.0, 30_000.0, 120_000.0]),
            &["method"],
        )?;

        let rpc_errors = IntCounterVec::new(
            Opts::new("vault_orchestrator_rpc_errors_total", "Wallet RPC errors"),
            &["method"],
        )?;

        let approvals_skipped = IntCounter::new(
            "vault_orchestrator_approvals_skipped_total",
            "Approvals skipped because allowance was sufficient",
        )?;

        let balance_refresh_failures = IntCounter::new(
            "vault_orchestrator_balance_refresh_failures_total",
            "Balance refreshes that surfaced an error",
        )?;

        let session_resets = IntCounter::new(
            "vault_orchestrator_session_resets_total",
            "Session resets caused by wallet events or disconnects",
        )?;

        registry.register(Box::new(operations_started.clone()))?;
        registry.register(Box::new(operations_finished.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(rpc_latency_ms.clone()))?;
        registry.register(Box::new(rpc_errors.clone()))?;
        registry.register(Box::new(approvals_skipped.clone()))?;
        registry.register(Box::new(balance_refresh_failures.clone()))?;
        registry.register(Box::new(session_resets.clone()))?;

        Ok(Self {
            registry,
            operations_started,
            operations_finished,
            failures,
            rpc_latency_ms,
            rpc_errors,
            approvals_skipped,
            balance_refresh_failures,
            session_resets,
        })
    }

    /// Record an accepted operation.
    pub fn record_started(&self, kind: OperationKind) {
        let kind = kind.to_string();
        self.operations_started
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Record a successful terminal state.
    pub fn record_succeeded(&self, kind: OperationKind) {
        let kind = kind.to_string();
        self.operations_finished
            .with_label_values(&[kind.as_str(), "succeeded"])
            .inc();
    }

    /// Record a failed terminal state.
    pub fn record_failed(&self, kind: OperationKind, reason: FailureReason) {
        let kind = kind.to_string();
        self.operations_finished
            .with_label_values(&[kind.as_str(), "failed"])
            .inc();
        self.failures.with_label_values(&[reason.as_str()]).inc();
    }

    /// Record one RPC round trip.
    pub fn observe_rpc(&self, method: &str, elapsed_ms: f64, ok: bool) {
        self.rpc_latency_ms
            .with_label_values(&[method])
            .observe(elapsed_ms);
        if !ok {
            self.rpc_errors.with_label_values(&[method]).inc();
        }
    }

    /// Render all metrics in the Prometheus text format.
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
