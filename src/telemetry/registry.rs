//! Explicit metrics registry.
//!
//! Built once by [`crate::telemetry::start`] and passed by reference (or
//! cheap clone) to whoever records or reads metrics. Nothing is installed as
//! a process-global recorder.
//!
//! Every name handed to the namespaced helpers (`counter`, `gauge`,
//! `histogram`) is prefixed with the registry namespace. No host label is
//! ever attached.

use std::sync::Arc;

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, SharedString};
use metrics_exporter_prometheus::{PrometheusHandle, PrometheusRecorder};

use super::fanout::FanoutSink;
use super::inmem::InmemSink;

/// Namespace every agent metric is registered under.
pub const METRICS_NAMESPACE: &str = "minimal";

#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    namespace: String,
    fanout: FanoutSink,
    prometheus: PrometheusHandle,
    inmem: InmemSink,
}

impl MetricsRegistry {
    /// Combine the in-memory sink and the Prometheus recorder behind one fan-out.
    pub fn new(namespace: impl Into<String>, inmem: InmemSink, prometheus: PrometheusRecorder) -> Self {
        let handle = prometheus.handle();
        let fanout = FanoutSink::new()
            .with_sink(Arc::new(prometheus))
            .with_sink(Arc::new(inmem.clone()));
        Self {
            inner: Arc::new(Inner {
                namespace: namespace.into(),
                fanout,
                prometheus: handle,
                inmem,
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// `<namespace>.<name>` counter with the given labels.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> Counter {
        self.register_counter(&self.key(name, labels))
    }

    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Gauge {
        self.inner.fanout.register_gauge(&self.key(name, labels), &metadata())
    }

    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Histogram {
        self.inner.fanout.register_histogram(&self.key(name, labels), &metadata())
    }

    /// Register a counter under an already fully-qualified key.
    pub fn register_counter(&self, key: &Key) -> Counter {
        self.inner.fanout.register_counter(key, &metadata())
    }

    /// Attach help text to a fully-qualified counter name.
    pub fn describe_counter(&self, full_name: impl Into<String>, description: impl Into<SharedString>) {
        self.inner
            .fanout
            .describe_counter(KeyName::from(full_name.into()), None, description.into());
    }

    /// Attach help text to a fully-qualified gauge name.
    pub fn describe_gauge(&self, full_name: impl Into<String>, description: impl Into<SharedString>) {
        self.inner
            .fanout
            .describe_gauge(KeyName::from(full_name.into()), None, description.into());
    }

    /// Drain pending histogram samples into their summaries.
    pub fn run_upkeep(&self) {
        self.inner.prometheus.run_upkeep();
    }

    /// Prometheus exposition-format text for everything registered so far.
    pub fn render_prometheus(&self) -> String {
        self.inner.prometheus.render()
    }

    pub fn inmem(&self) -> &InmemSink {
        &self.inner.inmem
    }

    fn key(&self, name: &str, labels: &[(&str, &str)]) -> Key {
        Key::from_parts(format!("{}.{name}", self.inner.namespace), to_labels(labels))
    }
}

pub(crate) fn to_labels(pairs: &[(&str, &str)]) -> Vec<Label> {
    pairs
        .iter()
        .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
        .collect()
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::time::Duration;

    fn registry() -> MetricsRegistry {
        let inmem = InmemSink::new(Duration::from_secs(10), Duration::from_secs(60));
        MetricsRegistry::new(METRICS_NAMESPACE, inmem, PrometheusBuilder::new().build_recorder())
    }

    #[test]
    fn counter_reaches_both_sinks() {
        let registry = registry();
        registry.counter("bootstrap.chain.resolved", &[("source", "registry")]).increment(1);

        let text = registry.render_prometheus();
        assert!(text.contains("minimal_bootstrap_chain_resolved{source=\"registry\"} 1"), "{text}");

        let data = registry.inmem().data();
        assert!(data
            .iter()
            .any(|i| i.counters.contains_key("minimal.bootstrap.chain.resolved;source=registry")));
    }

    #[test]
    fn help_text_is_rendered() {
        let registry = registry();
        registry.describe_counter("minimal.peers.dropped", "Peers dropped");
        registry.counter("peers.dropped", &[]).increment(1);

        let text = registry.render_prometheus();
        assert!(text.contains("# HELP minimal_peers_dropped Peers dropped"), "{text}");
    }

    #[test]
    fn no_host_label_is_attached() {
        let registry = registry();
        registry.gauge("agent.up", &[]).set(1.0);
        let text = registry.render_prometheus();
        assert!(text.contains("minimal_agent_up 1"), "{text}");
        assert!(!text.contains("host="));
    }

    #[test]
    fn upkeep_folds_histogram_samples() {
        let registry = registry();
        let histogram = registry.histogram("import.ms", &[]);
        histogram.record(4.0);
        histogram.record(8.0);
        registry.run_upkeep();

        let text = registry.render_prometheus();
        assert!(text.contains("minimal_import_ms_count 2"), "{text}");
        assert!(text.contains("minimal_import_ms_sum 12"), "{text}");
    }

    #[test]
    fn gauge_help_text_is_rendered() {
        let registry = registry();
        registry.describe_gauge("minimal.telemetry.up", "Telemetry is serving");
        registry.gauge("telemetry.up", &[]).set(1.0);
        let text = registry.render_prometheus();
        assert!(text.contains("# HELP minimal_telemetry_up Telemetry is serving"), "{text}");
    }

    #[test]
    fn clones_share_state() {
        let registry = registry();
        let clone = registry.clone();
        clone.counter("shared", &[]).increment(3);
        assert!(registry.render_prometheus().contains("minimal_shared 3"));
    }
}
