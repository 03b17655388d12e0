//! Fan-out recorder: every registration and measurement is forwarded to all
//! underlying sinks.

use std::sync::Arc;

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};

pub type SharedRecorder = Arc<dyn Recorder + Send + Sync>;

#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<SharedRecorder>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: SharedRecorder) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

struct FanoutCounter(Vec<Counter>);

impl CounterFn for FanoutCounter {
    fn increment(&self, value: u64) {
        for counter in &self.0 {
            counter.increment(value);
        }
    }

    fn absolute(&self, value: u64) {
        for counter in &self.0 {
            counter.absolute(value);
        }
    }
}

struct FanoutGauge(Vec<Gauge>);

impl GaugeFn for FanoutGauge {
    fn increment(&self, value: f64) {
        for gauge in &self.0 {
            gauge.increment(value);
        }
    }

    fn decrement(&self, value: f64) {
        for gauge in &self.0 {
            gauge.decrement(value);
        }
    }

    fn set(&self, value: f64) {
        for gauge in &self.0 {
            gauge.set(value);
        }
    }
}

struct FanoutHistogram(Vec<Histogram>);

impl HistogramFn for FanoutHistogram {
    fn record(&self, value: f64) {
        for histogram in &self.0 {
            histogram.record(value);
        }
    }
}

impl Recorder for FanoutSink {
    fn describe_counter(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        for sink in &self.sinks {
            sink.describe_counter(key.clone(), unit, description.clone());
        }
    }

    fn describe_gauge(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        for sink in &self.sinks {
            sink.describe_gauge(key.clone(), unit, description.clone());
        }
    }

    fn describe_histogram(&self, key: KeyName, unit: Option<Unit>, description: SharedString) {
        for sink in &self.sinks {
            sink.describe_histogram(key.clone(), unit, description.clone());
        }
    }

    fn register_counter(&self, key: &Key, metadata: &Metadata<'_>) -> Counter {
        let counters = self.sinks.iter().map(|s| s.register_counter(key, metadata)).collect();
        Counter::from_arc(Arc::new(FanoutCounter(counters)))
    }

    fn register_gauge(&self, key: &Key, metadata: &Metadata<'_>) -> Gauge {
        let gauges = self.sinks.iter().map(|s| s.register_gauge(key, metadata)).collect();
        Gauge::from_arc(Arc::new(FanoutGauge(gauges)))
    }

    fn register_histogram(&self, key: &Key, metadata: &Metadata<'_>) -> Histogram {
        let histograms = self.sinks.iter().map(|s| s.register_histogram(key, metadata)).collect();
        Histogram::from_arc(Arc::new(FanoutHistogram(histograms)))
    }
}
