//! Runtime used when no protocol engine is linked in.
//!
//! It accepts the handed-over configuration, registers the state counters so
//! `/metrics` carries them, and then does nothing until closed.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::AppError;
use crate::state::StateMetrics;
use crate::telemetry::MetricsRegistry;

use super::{CloseFuture, NodeConfig, NodeRuntime, RunningNode};

#[derive(Debug, Default)]
pub struct StandbyRuntime;

impl StandbyRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Register the node's metrics and park an idle task until closed.
    pub fn start(&self, config: NodeConfig, metrics: MetricsRegistry) -> StandbyNode {
        info!(
            node_id = %config.identity.node_id,
            chain = %config.chain.name,
            chain_id = config.chain.params.chain_id,
            data_dir = %config.data_dir.display(),
            bind = %format!("{}:{}", config.bind_addr, config.bind_port),
            service = %config.service_name,
            protocols = ?config.protocols.names(),
            seal = config.seal,
            "node configuration received; running in standby"
        );

        let state = StateMetrics::live(&metrics, metrics.namespace(), &[("chain", config.chain.name.as_str())]);
        metrics
            .gauge("node.protocols", &[])
            .set(config.protocols.len() as f64);

        let token = CancellationToken::new();
        let idle = token.clone();
        let task = tokio::spawn(async move {
            idle.cancelled().await;
            debug!("standby node stopped");
        });

        StandbyNode { config, state, token, task }
    }
}

impl NodeRuntime for StandbyRuntime {
    fn launch(
        &self,
        config: NodeConfig,
        metrics: MetricsRegistry,
    ) -> Result<Box<dyn RunningNode>, AppError> {
        Ok(Box::new(self.start(config, metrics)))
    }
}

pub struct StandbyNode {
    config: NodeConfig,
    state: StateMetrics,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl StandbyNode {
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn state_metrics(&self) -> &StateMetrics {
        &self.state
    }
}

impl RunningNode for StandbyNode {
    fn close(self: Box<Self>) -> CloseFuture {
        let StandbyNode { config, token, task, .. } = *self;
        Box::pin(async move {
            token.cancel();
            task.await
                .map_err(|e| AppError::Node(format!("standby task failed: {e}")))?;
            info!(service = %config.service_name, "node closed");
            Ok(())
        })
    }
}
