//! Counters recorded by the state-transition code.
//!
//! Callers pick [`StateMetrics::live`] when a registry exists and
//! [`StateMetrics::discard`] otherwise; the recording side is identical.

use metrics::{Counter, Key};

use crate::telemetry::MetricsRegistry;
use crate::telemetry::registry::to_labels;

/// Upper bound on a single transaction's execution period.
pub const MAX_TX_EXEC_PERIOD: u64 = 2_000_000;

const SUBSYSTEM: &str = "state";
const TXN_EXCEED_PERIOD: &str = "txn_exceed_period";
const TXN_EXCEED_PERIOD_HELP: &str =
    "Number of transactions whose execution period exceeds MAX_TX_EXEC_PERIOD.";

#[derive(Clone)]
pub struct StateMetrics {
    txn_exceed_period: Counter,
}

impl StateMetrics {
    /// Counters registered under `<namespace>.state.*` with `labels` attached.
    pub fn live(registry: &MetricsRegistry, namespace: &str, labels: &[(&str, &str)]) -> Self {
        let name = format!("{namespace}.{SUBSYSTEM}.{TXN_EXCEED_PERIOD}");
        registry.describe_counter(name.clone(), TXN_EXCEED_PERIOD_HELP);
        let txn_exceed_period = registry.register_counter(&Key::from_parts(name, to_labels(labels)));
        Self { txn_exceed_period }
    }

    /// Counters that record nothing.
    pub fn discard() -> Self {
        Self { txn_exceed_period: Counter::noop() }
    }

    pub fn txn_exceed_period(&self) -> &Counter {
        &self.txn_exceed_period
    }

    pub fn record_txn_exceed_period(&self) {
        self.txn_exceed_period.increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{InmemSink, METRICS_NAMESPACE};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::time::Duration;

    fn registry() -> MetricsRegistry {
        let inmem = InmemSink::new(Duration::from_secs(10), Duration::from_secs(60));
        MetricsRegistry::new(METRICS_NAMESPACE, inmem, PrometheusBuilder::new().build_recorder())
    }

    #[test]
    fn live_counter_is_exported_with_labels_and_help() {
        let registry = registry();
        let metrics = StateMetrics::live(&registry, METRICS_NAMESPACE, &[("chain", "foundation")]);
        metrics.record_txn_exceed_period();
        metrics.record_txn_exceed_period();

        let text = registry.render_prometheus();
        assert!(
            text.contains("minimal_state_txn_exceed_period{chain=\"foundation\"} 2"),
            "{text}"
        );
        assert!(text.contains("# HELP minimal_state_txn_exceed_period Number of transactions"));

        let recorded = registry
            .inmem()
            .data()
            .iter()
            .filter_map(|i| i.counters.get("minimal.state.txn_exceed_period;chain=foundation").copied())
            .map(|agg| agg.sum)
            .sum::<f64>();
        assert_eq!(recorded, 2.0);
    }

    #[test]
    fn discard_leaves_no_trace() {
        let registry = registry();
        let metrics = StateMetrics::discard();
        for _ in 0..10 {
            metrics.record_txn_exceed_period();
        }
        metrics.txn_exceed_period().increment(5);

        assert!(!registry.render_prometheus().contains("txn_exceed_period"));
        assert!(registry.inmem().data().is_empty());
    }

    #[test]
    fn threshold_is_two_million() {
        assert_eq!(MAX_TX_EXEC_PERIOD, 2_000_000);
    }
}
