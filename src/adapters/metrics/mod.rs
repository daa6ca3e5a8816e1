//! Metrics Adapters
//!
//! Prometheus counters and histograms for orchestrator operations and
//! wallet RPC traffic. Exposition is left to the host application.

pub mod prometheus;

pub use self::prometheus::OrchestratorMetrics;
