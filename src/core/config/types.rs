//! Public configuration structs consumed by the agent.

use std::path::PathBuf;

/// Telemetry configuration (`[telemetry]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Port the `/metrics` endpoint listens on (bound to `localhost`).
    pub prometheus_port: u16,
}

/// Fully-resolved agent configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Chain reference: a path to a chain file or a well-known chain name.
    pub chain: String,
    /// Data directory root (already expanded, no `~`).
    pub data_dir: PathBuf,
    /// Address the node's own network service binds to.
    pub bind_addr: String,
    pub bind_port: u16,
    pub service_name: String,
    /// Whether this node participates in block sealing.
    pub seal: bool,
    pub log_level: String,
    pub telemetry: TelemetryConfig,
}
