//! Agent configuration.
//!
//! `config/default.toml` (relative to the working directory) is used when no
//! path is given; without it the built-in defaults apply. `MINIMAL_*` env
//! vars override the file.
//!
//! - **types**: resolved structs handed to the rest of the crate.
//! - **raw**: serde mirror of the file, with per-field defaults.
//! - **load**: `[meta] base` chains, env overrides, `~` expansion.

mod load;
mod raw;
mod types;

pub use load::{Overrides, expand_home, load, load_from};
pub use types::*;

impl AgentConfig {
    /// Built-in defaults rooted at `data_dir`, with the telemetry port set
    /// to `0` so tests can bind an ephemeral port.
    pub fn with_data_dir(data_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            chain: raw::default_chain(),
            data_dir: data_dir.into(),
            bind_addr: raw::default_bind_addr(),
            bind_port: raw::default_bind_port(),
            service_name: raw::default_service_name(),
            seal: false,
            log_level: raw::default_log_level(),
            telemetry: TelemetryConfig { prometheus_port: 0 },
        }
    }
}
