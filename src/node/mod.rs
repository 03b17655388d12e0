//! Contract between the bootstrap sequence and the node runtime.
//!
//! The agent resolves everything a node needs, packs it into a
//! [`NodeConfig`], and hands it to a [`NodeRuntime`]. Protocol backends are
//! looked up through a [`ProtocolRegistry`] value built by the caller rather
//! than a global table.

pub mod standby;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::bootstrap::datadir::DirectoryLayout;
use crate::bootstrap::identity::Identity;
use crate::chain::ChainSpec;
use crate::error::AppError;
use crate::telemetry::MetricsRegistry;

pub use standby::StandbyRuntime;

// ── Protocol backends ────────────────────────────────────────────────────────

/// A protocol backend the node runtime can instantiate by name.
pub trait ProtocolFactory: Send + Sync {
    /// Registry key, e.g. `"ethereum"`.
    fn name(&self) -> &str;

    /// Wire versions this backend speaks, newest first.
    fn versions(&self) -> &[u32];
}

/// The `eth` wire protocol backend.
#[derive(Debug, Default)]
pub struct EthereumFactory;

impl ProtocolFactory for EthereumFactory {
    fn name(&self) -> &str {
        "ethereum"
    }

    fn versions(&self) -> &[u32] {
        &[63, 62]
    }
}

/// Backend name → factory.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    factories: BTreeMap<String, Arc<dyn ProtocolFactory>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every backend compiled into this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.factories.insert("ethereum".to_string(), Arc::new(EthereumFactory));
        registry
    }

    /// Add a backend. Names must be unique.
    pub fn register(&mut self, factory: Arc<dyn ProtocolFactory>) -> Result<(), AppError> {
        let name = factory.name().to_string();
        if self.factories.contains_key(&name) {
            return Err(AppError::Node(format!("duplicate protocol backend: {name}")));
        }
        debug!(%name, "registering protocol backend");
        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ProtocolFactory>> {
        self.factories.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

// ── Handoff ──────────────────────────────────────────────────────────────────

/// Everything the node runtime receives from bootstrap.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub identity: Identity,
    pub chain: ChainSpec,
    pub data_dir: PathBuf,
    pub layout: DirectoryLayout,
    pub bind_addr: String,
    pub bind_port: u16,
    pub service_name: String,
    pub protocols: ProtocolRegistry,
    pub seal: bool,
}

/// Boxed future returned by [`RunningNode::close`].
pub type CloseFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// Starts a node from a fully bootstrapped configuration.
pub trait NodeRuntime: Send + Sync {
    /// Start the node. Must be called from within a Tokio runtime.
    fn launch(
        &self,
        config: NodeConfig,
        metrics: MetricsRegistry,
    ) -> Result<Box<dyn RunningNode>, AppError>;
}

/// A node started by [`NodeRuntime::launch`].
pub trait RunningNode: Send {
    /// Stop the node and wait for it to wind down.
    fn close(self: Box<Self>) -> CloseFuture;
}
