//! In-memory metrics sink with rolling intervals.
//!
//! Every measurement lands in the interval bucket that contains "now"
//! (wall-clock time truncated to the interval width). Only the most recent
//! `retain / interval` buckets are kept, so the sink holds roughly the last
//! `retain` worth of data for local introspection.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};

/// Running aggregate of every value seen for one key within one interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSample {
    pub count: u64,
    pub sum: f64,
    pub sum_sq: f64,
    pub min: f64,
    pub max: f64,
    pub last: f64,
}

impl AggregateSample {
    fn new(value: f64) -> Self {
        Self { count: 1, sum: value, sum_sq: value * value, min: value, max: value, last: value }
    }

    fn ingest(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.last = value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.sum / self.count as f64 }
    }

    /// Sample standard deviation; zero with fewer than two values.
    pub fn stddev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let variance = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);
        variance.max(0.0).sqrt()
    }
}

/// Everything recorded during one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalMetrics {
    pub start: SystemTime,
    pub gauges: BTreeMap<String, f64>,
    pub counters: BTreeMap<String, AggregateSample>,
    pub samples: BTreeMap<String, AggregateSample>,
}

impl IntervalMetrics {
    fn new(start: SystemTime) -> Self {
        Self {
            start,
            gauges: BTreeMap::new(),
            counters: BTreeMap::new(),
            samples: BTreeMap::new(),
        }
    }
}

struct State {
    intervals: VecDeque<IntervalMetrics>,
    /// Latest absolute value per gauge, so increments carry across intervals.
    gauge_values: HashMap<String, f64>,
}

struct Shared {
    interval: Duration,
    max_intervals: usize,
    state: Mutex<State>,
}

/// Cheap to clone; clones share the same buckets.
#[derive(Clone)]
pub struct InmemSink {
    shared: Arc<Shared>,
}

impl InmemSink {
    /// `interval` is the bucket width; `retain` how much history to keep.
    pub fn new(interval: Duration, retain: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let max_intervals = retain.as_nanos().div_ceil(interval.as_nanos()).max(1) as usize;
        Self {
            shared: Arc::new(Shared {
                interval,
                max_intervals,
                state: Mutex::new(State {
                    intervals: VecDeque::with_capacity(max_intervals),
                    gauge_values: HashMap::new(),
                }),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    pub fn max_intervals(&self) -> usize {
        self.shared.max_intervals
    }

    /// Snapshot of the retained intervals, oldest first.
    pub fn data(&self) -> Vec<IntervalMetrics> {
        self.lock().intervals.iter().cloned().collect()
    }

    pub fn set_gauge(&self, key: &str, value: f64) {
        self.set_gauge_at(key, value, SystemTime::now());
    }

    pub fn adjust_gauge(&self, key: &str, delta: f64) {
        self.adjust_gauge_at(key, delta, SystemTime::now());
    }

    pub fn incr_counter(&self, key: &str, value: f64) {
        self.incr_counter_at(key, value, SystemTime::now());
    }

    pub fn add_sample(&self, key: &str, value: f64) {
        self.add_sample_at(key, value, SystemTime::now());
    }

    pub(crate) fn set_gauge_at(&self, key: &str, value: f64, now: SystemTime) {
        let mut state = self.lock();
        state.gauge_values.insert(key.to_string(), value);
        self.current(&mut state, now).gauges.insert(key.to_string(), value);
    }

    pub(crate) fn adjust_gauge_at(&self, key: &str, delta: f64, now: SystemTime) {
        let mut state = self.lock();
        let value = state.gauge_values.get(key).copied().unwrap_or(0.0) + delta;
        state.gauge_values.insert(key.to_string(), value);
        self.current(&mut state, now).gauges.insert(key.to_string(), value);
    }

    pub(crate) fn incr_counter_at(&self, key: &str, value: f64, now: SystemTime) {
        let mut state = self.lock();
        ingest(&mut self.current(&mut state, now).counters, key, value);
    }

    pub(crate) fn add_sample_at(&self, key: &str, value: f64, now: SystemTime) {
        let mut state = self.lock();
        ingest(&mut self.current(&mut state, now).samples, key, value);
    }

    /// Human-readable dump of every retained interval.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for intv in self.lock().intervals.iter() {
            let ts = DateTime::<Utc>::from(intv.start).format("%Y-%m-%d %H:%M:%S %z");
            for (name, value) in &intv.gauges {
                let _ = writeln!(out, "[{ts}][G] '{name}': {value:.3}");
            }
            for (name, agg) in &intv.counters {
                let _ = writeln!(out, "[{ts}][C] '{name}': {}", format_aggregate(agg));
            }
            for (name, agg) in &intv.samples {
                let _ = writeln!(out, "[{ts}][S] '{name}': {}", format_aggregate(agg));
            }
        }
        out
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bucket for `now`, opening a new one and evicting the oldest as needed.
    fn current<'a>(&self, state: &'a mut State, now: SystemTime) -> &'a mut IntervalMetrics {
        let start = truncate(now, self.shared.interval);
        let needs_new = match state.intervals.back() {
            Some(last) => start > last.start,
            None => true,
        };
        if needs_new {
            state.intervals.push_back(IntervalMetrics::new(start));
            while state.intervals.len() > self.shared.max_intervals {
                state.intervals.pop_front();
            }
        }
        // Clock stepping backwards keeps writing into the newest bucket.
        let last = state.intervals.len() - 1;
        &mut state.intervals[last]
    }
}

fn ingest(map: &mut BTreeMap<String, AggregateSample>, key: &str, value: f64) {
    match map.get_mut(key) {
        Some(agg) => agg.ingest(value),
        None => {
            map.insert(key.to_string(), AggregateSample::new(value));
        }
    }
}

fn format_aggregate(agg: &AggregateSample) -> String {
    format!(
        "Count: {} Min: {:.3} Mean: {:.3} Max: {:.3} Stddev: {:.3} Sum: {:.3}",
        agg.count,
        agg.min,
        agg.mean(),
        agg.max,
        agg.stddev(),
        agg.sum
    )
}

fn truncate(now: SystemTime, interval: Duration) -> SystemTime {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    let width = interval.as_nanos();
    let start = since_epoch - since_epoch % width;
    UNIX_EPOCH + Duration::from_nanos(start as u64)
}

/// `name;k=v;k2=v2`, labels in registration order.
fn flatten_key(key: &Key) -> String {
    let mut flat = key.name().to_string();
    for label in key.labels() {
        let _ = write!(flat, ";{}={}", label.key(), label.value());
    }
    flat
}

// ── metrics::Recorder ────────────────────────────────────────────────────────

struct InmemHandle {
    sink: InmemSink,
    key: String,
}

impl CounterFn for InmemHandle {
    fn increment(&self, value: u64) {
        self.sink.incr_counter(&self.key, value as f64);
    }

    // Absolute values are folded into the interval like increments.
    fn absolute(&self, value: u64) {
        self.sink.incr_counter(&self.key, value as f64);
    }
}

impl GaugeFn for InmemHandle {
    fn increment(&self, value: f64) {
        self.sink.adjust_gauge(&self.key, value);
    }

    fn decrement(&self, value: f64) {
        self.sink.adjust_gauge(&self.key, -value);
    }

    fn set(&self, value: f64) {
        self.sink.set_gauge(&self.key, value);
    }
}

impl HistogramFn for InmemHandle {
    fn record(&self, value: f64) {
        self.sink.add_sample(&self.key, value);
    }
}

impl InmemSink {
    fn handle(&self, key: &Key) -> Arc<InmemHandle> {
        Arc::new(InmemHandle { sink: self.clone(), key: flatten_key(key) })
    }
}

impl Recorder for InmemSink {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.handle(key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.handle(key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.handle(key))
    }
}
