//! Bootstrap orchestrator.
//!
//! Startup sequence run by [`Agent::start`]:
//!   1. Start telemetry (`/metrics` serves from here on)
//!   2. Resolve the chain reference
//!   3. Ensure the data-directory layout
//!   4. Load or create the node identity
//!   5. Assemble the [`NodeConfig`] and launch the node runtime
//!
//! The first failing step aborts the sequence and its error is returned.
//! Telemetry that was already running is left for [`Agent::close`].

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bootstrap::{chain, datadir, identity};
use crate::bootstrap::identity::IdentityOrigin;
use crate::config::AgentConfig;
use crate::error::AppError;
use crate::node::{NodeConfig, NodeRuntime, ProtocolRegistry, RunningNode};
use crate::telemetry::{self, MetricsRegistry, TelemetryHandle};

pub struct Agent {
    config: AgentConfig,
    runtime: Box<dyn NodeRuntime>,
    protocols: ProtocolRegistry,
    shutdown: CancellationToken,
    metrics: Option<MetricsRegistry>,
    telemetry: Option<TelemetryHandle>,
    node: Option<Box<dyn RunningNode>>,
}

impl Agent {
    pub fn new(config: AgentConfig, runtime: Box<dyn NodeRuntime>, protocols: ProtocolRegistry) -> Self {
        Self {
            config,
            runtime,
            protocols,
            shutdown: CancellationToken::new(),
            metrics: None,
            telemetry: None,
            node: None,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Registry created by [`Agent::start`]; `None` before that.
    pub fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }

    /// Address of the `/metrics` listener once telemetry is running.
    pub fn telemetry_addr(&self) -> Option<std::net::SocketAddr> {
        self.telemetry.as_ref().map(TelemetryHandle::local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.node.is_some()
    }

    pub async fn start(&mut self) -> Result<(), AppError> {
        if self.metrics.is_some() {
            return Err(AppError::Telemetry("already started".into()));
        }

        let telemetry = telemetry::start(&self.config.telemetry, self.shutdown.clone()).await?;
        let metrics = telemetry.registry.clone();
        self.metrics = Some(telemetry.registry);
        self.telemetry = Some(telemetry.handle);

        let resolved = chain::resolve(&self.config.chain)?;
        info!(
            chain = %resolved.spec.name,
            source = %resolved.source,
            reference = %self.config.chain,
            "chain resolved"
        );
        metrics
            .counter("bootstrap.chain.resolved", &[("source", resolved.source.as_str())])
            .increment(1);

        let layout = datadir::ensure_layout(&self.config.data_dir, datadir::NODE_SUBDIRS)?;
        info!(data_dir = %layout.root().display(), "data directory ready");

        let identity = identity::load_or_create(&self.config.data_dir)?;
        if identity.origin == IdentityOrigin::Generated {
            metrics.counter("bootstrap.identity.generated", &[]).increment(1);
        }
        info!(node_id = %identity.node_id, origin = ?identity.origin, "identity ready");

        let node_config = NodeConfig {
            identity,
            chain: resolved.spec,
            data_dir: self.config.data_dir.clone(),
            layout,
            bind_addr: self.config.bind_addr.clone(),
            bind_port: self.config.bind_port,
            service_name: self.config.service_name.clone(),
            protocols: self.protocols.clone(),
            seal: self.config.seal,
        };

        self.node = Some(self.runtime.launch(node_config, metrics)?);
        info!(service = %self.config.service_name, "agent started");
        Ok(())
    }

    /// Close the node, then stop telemetry. Safe to call after a failed start.
    pub async fn close(&mut self) -> Result<(), AppError> {
        let closed = match self.node.take() {
            Some(node) => node.close().await,
            None => Ok(()),
        };
        self.shutdown.cancel();
        if let Some(handle) = self.telemetry.take() {
            handle.shutdown().await;
        }
        info!("agent closed");
        closed
    }
}
