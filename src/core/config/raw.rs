//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

/// Raw TOML shape: serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub agent: RawAgent,
    #[serde(default)]
    pub telemetry: RawTelemetry,
}

#[derive(Deserialize)]
pub(super) struct RawAgent {
    #[serde(default = "default_chain")]
    pub chain: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub seal: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RawAgent {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            data_dir: default_data_dir(),
            bind_addr: default_bind_addr(),
            bind_port: default_bind_port(),
            service_name: default_service_name(),
            seal: false,
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawTelemetry {
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for RawTelemetry {
    fn default() -> Self {
        Self { prometheus_port: default_prometheus_port() }
    }
}

pub(super) fn default_chain() -> String {
    "foundation".to_string()
}
pub(super) fn default_data_dir() -> String {
    "./test-chain".to_string()
}
pub(super) fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}
pub(super) fn default_bind_port() -> u16 {
    30303
}
pub(super) fn default_service_name() -> String {
    "minimal".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_prometheus_port() -> u16 {
    8080
}
