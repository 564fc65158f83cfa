//! Observability for the pool.
//!
//! Counter and latency collection lives behind the `telemetry`
//! feature; with the feature off a no-op stub keeps the call sites
//! free of conditional compilation.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    /// No-op metrics collector.
    #[derive(Debug, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }
        pub fn record_task_submitted(&self) {}
        pub fn record_task_execution(&self, _duration_ns: u64) {}
        pub fn record_task_panic(&self) {}
        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }

    /// Empty snapshot used when telemetry is compiled out.
    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub tasks_submitted: u64,
        pub tasks_executed: u64,
        pub tasks_panicked: u64,
        pub avg_latency_ns: u64,
        pub p50_latency_ns: u64,
        pub p99_latency_ns: u64,
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
