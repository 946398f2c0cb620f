//! Prometheus metrics definitions for StratForge
//!
//! All metrics use the `stratforge_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the generation and optimization pipeline
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Provider calls by provider and outcome
    pub provider_requests_total: CounterVec,
    /// Provider call latency in seconds
    pub provider_latency_seconds: HistogramVec,
    /// Validation findings by stage and severity
    pub validation_findings_total: CounterVec,
    /// Optimization trials by method and outcome
    pub optimization_trials_total: CounterVec,
    /// Best objective value of the most recent run
    pub best_objective: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let provider_requests_total = CounterVec::new(
            Opts::new(
                "stratforge_provider_requests_total",
                "Provider calls by provider and outcome",
            ),
            &["provider", "outcome"],
        )?;
        registry.register(Box::new(provider_requests_total.clone()))?;

        let provider_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "stratforge_provider_latency_seconds",
                "Provider call latency in seconds",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
            &["provider"],
        )?;
        registry.register(Box::new(provider_latency_seconds.clone()))?;

        let validation_findings_total = CounterVec::new(
            Opts::new(
                "stratforge_validation_findings_total",
                "Validation findings by stage and severity",
            ),
            &["stage", "severity"],
        )?;
        registry.register(Box::new(validation_findings_total.clone()))?;

        let optimization_trials_total = CounterVec::new(
            Opts::new(
                "stratforge_optimization_trials_total",
                "Optimization trials by method and outcome",
            ),
            &["method", "outcome"],
        )?;
        registry.register(Box::new(optimization_trials_total.clone()))?;

        let best_objective = Gauge::with_opts(Opts::new(
            "stratforge_best_objective",
            "Best objective value of the most recent run",
        ))?;
        registry.register(Box::new(best_objective.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            provider_requests_total,
            provider_latency_seconds,
            validation_findings_total,
            optimization_trials_total,
            best_objective,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    /// Increment provider request counter
    pub fn inc_provider_requests(&self, provider: &str, outcome: &str) {
        self.provider_requests_total
            .with_label_values(&[provider, outcome])
            .inc();
    }

    /// Observe provider call latency
    pub fn observe_provider_latency(&self, provider: &str, latency: f64) {
        self.provider_latency_seconds
            .with_label_values(&[provider])
            .observe(latency);
    }

    /// Increment validation finding counter
    pub fn inc_validation_finding(&self, stage: &str, severity: &str) {
        self.validation_findings_total
            .with_label_values(&[stage, severity])
            .inc();
    }

    /// Increment optimization trial counter
    pub fn inc_trial(&self, method: &str, outcome: &str) {
        self.optimization_trials_total
            .with_label_values(&[method, outcome])
            .inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create default Metrics")
    }
}
