//! Telemetry pipeline.
//!
//! [`start`] builds the sinks, combines them behind a fan-out, wraps that in a
//! [`MetricsRegistry`] and begins serving `/metrics` in the background:
//!
//! ```text
//!                ┌── PrometheusRecorder ──► GET /metrics
//! registry ─► fanout
//!                └── InmemSink (10s × 6) ──► SIGUSR1 dump
//! ```
//!
//! Call it once per process; the returned [`Telemetry`] owns the only
//! registry and the handle that stops the background tasks.

pub mod fanout;
pub mod inmem;
pub mod registry;
pub mod server;
#[cfg(unix)]
mod signal;

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TelemetryConfig;
use crate::error::AppError;

pub use inmem::InmemSink;
pub use registry::{METRICS_NAMESPACE, MetricsRegistry};

/// In-memory bucket width.
pub const INMEM_INTERVAL: Duration = Duration::from_secs(10);
/// How long in-memory buckets are kept.
pub const INMEM_RETAIN: Duration = Duration::from_secs(60);
/// Period of the Prometheus upkeep tick that drains histogram samples.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Running telemetry: the registry plus the handle to its background tasks.
pub struct Telemetry {
    pub registry: MetricsRegistry,
    pub handle: TelemetryHandle,
}

/// Owns the background tasks started by [`start`].
pub struct TelemetryHandle {
    local_addr: SocketAddr,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TelemetryHandle {
    /// Address the `/metrics` listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop serving and wait for the background tasks to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "telemetry task ended abnormally");
            }
        }
    }
}

/// Build the sinks and start serving `localhost:<prometheus_port>/metrics`.
///
/// Tasks stop when either `shutdown` or the returned handle is cancelled.
pub async fn start(config: &TelemetryConfig, shutdown: CancellationToken) -> Result<Telemetry, AppError> {
    let inmem = InmemSink::new(INMEM_INTERVAL, INMEM_RETAIN);
    let prometheus = PrometheusBuilder::new().build_recorder();
    let registry = MetricsRegistry::new(METRICS_NAMESPACE, inmem.clone(), prometheus);
    register_baseline(&registry);

    let listener = server::bind(config.prometheus_port).await?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| AppError::io("cannot read metrics listener address", e))?;

    let token = shutdown.child_token();
    let mut tasks = Vec::with_capacity(3);

    #[cfg(unix)]
    tasks.push(signal::spawn_dump_on_signal(inmem, token.clone())?);
    #[cfg(not(unix))]
    drop(inmem);

    tasks.push(spawn_upkeep(registry.clone(), token.clone()));
    tasks.push(server::spawn(listener, registry.clone(), token.clone()));

    info!(%local_addr, namespace = METRICS_NAMESPACE, "telemetry started");

    Ok(Telemetry {
        registry,
        handle: TelemetryHandle { local_addr, token, tasks },
    })
}

/// Gauges present from the first scrape on.
fn register_baseline(registry: &MetricsRegistry) {
    let ns = registry.namespace().to_string();
    registry.describe_gauge(format!("{ns}.telemetry.up"), "1 while the telemetry pipeline is serving.");
    registry.gauge("telemetry.up", &[]).set(1.0);
    registry.describe_gauge(format!("{ns}.build.info"), "Build information; the value is always 1.");
    registry
        .gauge("build.info", &[("version", env!("CARGO_PKG_VERSION"))])
        .set(1.0);
}

fn spawn_upkeep(registry: MetricsRegistry, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(UPKEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => registry.run_upkeep(),
            }
        }
        debug!("metrics upkeep stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn baseline_gauges_are_registered_before_serving() {
        let telemetry = start(&TelemetryConfig { prometheus_port: 0 }, CancellationToken::new())
            .await
            .unwrap();

        let text = telemetry.registry.render_prometheus();
        assert!(text.contains("minimal_telemetry_up 1"), "{text}");
        let build = format!("minimal_build_info{{version=\"{}\"}} 1", env!("CARGO_PKG_VERSION"));
        assert!(text.contains(&build), "{text}");
        assert!(text.contains("# HELP minimal_telemetry_up"), "{text}");

        telemetry.handle.shutdown().await;
    }

    #[tokio::test]
    async fn upkeep_task_exits_on_cancel() {
        let inmem = InmemSink::new(INMEM_INTERVAL, INMEM_RETAIN);
        let registry = MetricsRegistry::new(METRICS_NAMESPACE, inmem, PrometheusBuilder::new().build_recorder());
        let token = CancellationToken::new();
        let task = spawn_upkeep(registry, token.clone());

        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        token.cancel();
        time::timeout(Duration::from_secs(5), task)
            .await
            .expect("upkeep did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn parent_token_stops_every_task() {
        let parent = CancellationToken::new();
        let telemetry = start(&TelemetryConfig { prometheus_port: 0 }, parent.clone())
            .await
            .unwrap();

        parent.cancel();
        time::timeout(Duration::from_secs(5), telemetry.handle.shutdown())
            .await
            .expect("telemetry tasks did not stop");
    }
}
