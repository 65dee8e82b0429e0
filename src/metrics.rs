//! Metrics for the prober

use std::{fmt, sync::atomic::AtomicU64, time::Duration};

use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

/// Labels identifying a metric series.
///
/// One series exists per (probing host, looked up name, DNS server) tuple.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    /// Hostname of the machine running the prober.
    pub host: String,
    /// The name that is being looked up.
    pub url: String,
    /// The DNS server the lookup was sent to, as configured.
    pub dns_server: String,
}

/// Sink for measurement outcomes.
///
/// The prober reports every probe through this trait, which lets tests
/// capture outcomes without going through a registry.
pub trait ProbeSink: Send + Sync + 'static {
    /// Record a successful lookup and its duration.
    fn record_lookup(&self, labels: &ProbeLabels, duration: Duration);
    /// Record a failed lookup.
    fn record_failure(&self, labels: &ProbeLabels);
}

/// Metrics kept by the prober.
///
/// The latency gauge holds the duration of the most recent successful lookup
/// per series. Failed lookups only increment the error counter and leave the
/// gauge untouched, so a series that never succeeded has no gauge sample.
#[derive(Clone)]
pub struct Metrics {
    lookup_speed: Family<ProbeLabels, Gauge<f64, AtomicU64>>,
    errors: Family<ProbeLabels, Counter>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

impl Metrics {
    /// Register the probe metrics in `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let sub_registry = registry.sub_registry_with_prefix("dns_metrics");

        let lookup_speed = Family::default();
        sub_registry.register(
            "dns_lookup_speed",
            "Duration of the last successful DNS lookup in seconds",
            lookup_speed.clone(),
        );

        let errors = Family::default();
        sub_registry.register("dns_errors", "Number of failed DNS lookups", errors.clone());

        Self {
            lookup_speed,
            errors,
        }
    }
}

impl ProbeSink for Metrics {
    fn record_lookup(&self, labels: &ProbeLabels, duration: Duration) {
        self.lookup_speed
            .get_or_create(labels)
            .set(duration.as_secs_f64());
    }

    fn record_failure(&self, labels: &ProbeLabels) {
        self.errors.get_or_create(labels).inc();
    }
}
