use prometheus::{opts, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Registry};
use tokio::time::Instant;

use crate::errors::Error;

#[derive(Clone)]
pub struct Metrics {
    pub reconcile: ReconcileMetrics,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        let registry = Registry::new_custom(Some("edgelb_ctrl".to_string()), None)
            .expect("valid metrics prefix");
        let reconcile = ReconcileMetrics::default().register(&registry);
        Self {
            registry,
            reconcile,
        }
    }
}

#[derive(Clone)]
pub struct ReconcileMetrics {
    pub runs: IntCounter,
    pub failures: IntCounterVec,
    pub duration: HistogramVec,
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self {
            runs: IntCounter::new("reconcile_runs", "reconciliations").expect("valid metric"),
            failures: IntCounterVec::new(
                opts!("reconcile_failures", "reconciliation errors"),
                &["kind", "error"],
            )
            .expect("valid metric"),
            duration: HistogramVec::new(
                HistogramOpts::new("reconcile_duration_seconds", "reconcile duration")
                    .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
                &["kind"],
            )
            .expect("valid metric"),
        }
    }
}

impl ReconcileMetrics {
    pub fn register(self, registry: &Registry) -> Self {
        registry
            .register(Box::new(self.runs.clone()))
            .expect("metric registers once");
        registry
            .register(Box::new(self.failures.clone()))
            .expect("metric registers once");
        registry
            .register(Box::new(self.duration.clone()))
            .expect("metric registers once");
        self
    }

    pub fn set_failure(&self, kind: &str, e: &Error) {
        self.failures.with_label_values(&[kind, &e.metric_label()]).inc();
    }

    pub fn count_and_measure(&self, kind: &str) -> ReconcileMeasurer {
        self.runs.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            kind: kind.to_string(),
            metric: self.duration.clone(),
        }
    }
}

/// Relies on `Drop` to calculate duration and register the observation in the histogram.
pub struct ReconcileMeasurer {
    start: Instant,
    kind: String,
    metric: HistogramVec,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.with_label_values(&[&self.kind]).observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_counter_increments_per_kind_and_reason() {
        let metrics = Metrics::default();
        metrics
            .reconcile
            .set_failure("Service", &Error::NotFound("x".to_string()));
        let families = metrics.registry.gather();
        let failures = families
            .iter()
            .find(|f| f.get_name() == "edgelb_ctrl_reconcile_failures")
            .expect("failures metric registered");
        assert_eq!(failures.get_metric().len(), 1);
    }
}
