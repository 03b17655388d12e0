//! Configuration loading.
//!
//! A file may name a parent with `[meta] base = "<path>"` (relative paths are
//! resolved against the file's own directory). The chain is walked up to its
//! root, then folded back down so each child overrides its parent key by key.
//! `MINIMAL_DATA_DIR`, `MINIMAL_CHAIN` and `MINIMAL_LOG_LEVEL` are applied
//! last.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::{Table, Value};

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Values that take precedence over whatever the TOML file says.
/// `load` fills this from the environment; tests build it directly.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<String>,
    pub chain: Option<String>,
    pub log_level: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var("MINIMAL_DATA_DIR").ok(),
            chain: env::var("MINIMAL_CHAIN").ok(),
            log_level: env::var("MINIMAL_LOG_LEVEL").ok(),
        }
    }
}

/// Load `config_path`, or `config/default.toml` when it exists, or the
/// built-in defaults. Env overrides apply in every case.
pub fn load(config_path: Option<&str>) -> Result<AgentConfig, AppError> {
    let overrides = Overrides::from_env();
    match config_path {
        Some(path) => load_from(Path::new(path), &overrides),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            load_from(Path::new(DEFAULT_CONFIG_PATH), &overrides)
        }
        None => resolve(RawConfig::default(), &overrides),
    }
}

/// Load an explicit file (following its `base` chain) with `overrides`.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<AgentConfig, AppError> {
    let merged = read_chain(path)?;
    let raw = RawConfig::deserialize(Value::Table(merged))
        .map_err(|e| AppError::Config(format!("invalid values in {}: {e}", path.display())))?;
    resolve(raw, overrides)
}

/// Read `path` and every ancestor it names, then merge root-first.
fn read_chain(path: &Path) -> Result<Table, AppError> {
    let mut seen = HashSet::new();
    let mut layers = Vec::new();
    let mut next = Some(path.to_path_buf());

    while let Some(current) = next.take() {
        let key = current.canonicalize().unwrap_or_else(|_| current.clone());
        if !seen.insert(key) {
            return Err(AppError::Config(format!(
                "circular base reference at {}",
                current.display()
            )));
        }
        let table = read_table(&current)?;
        next = base_of(&table).map(|base| {
            let base = Path::new(base);
            if base.is_absolute() {
                base.to_path_buf()
            } else {
                current.parent().unwrap_or(Path::new(".")).join(base)
            }
        });
        layers.push(table);
    }

    let mut merged = Table::new();
    for layer in layers.into_iter().rev() {
        merge_into(&mut merged, layer);
    }
    Ok(merged)
}

fn read_table(path: &Path) -> Result<Table, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
    text.parse::<Table>()
        .map_err(|e| AppError::Config(format!("cannot parse {}: {e}", path.display())))
}

fn base_of(table: &Table) -> Option<&str> {
    table.get("meta")?.get("base")?.as_str()
}

/// Overlay `layer` onto `target`. Nested tables merge; anything else replaces.
fn merge_into(target: &mut Table, layer: Table) {
    for (key, value) in layer {
        match value {
            Value::Table(incoming) => match target.get_mut(&key) {
                Some(Value::Table(existing)) => merge_into(existing, incoming),
                _ => {
                    target.insert(key, Value::Table(incoming));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

fn resolve(raw: RawConfig, overrides: &Overrides) -> Result<AgentConfig, AppError> {
    let agent = raw.agent;

    let chain = overrides.chain.clone().unwrap_or(agent.chain);
    if chain.trim().is_empty() {
        return Err(AppError::Config("agent.chain must not be empty".into()));
    }
    let data_dir = overrides.data_dir.as_deref().unwrap_or(&agent.data_dir);
    if data_dir.trim().is_empty() {
        return Err(AppError::Config("agent.data_dir must not be empty".into()));
    }

    Ok(AgentConfig {
        chain,
        data_dir: expand_home(data_dir),
        bind_addr: agent.bind_addr,
        bind_port: agent.bind_port,
        service_name: agent.service_name,
        seal: agent.seal,
        log_level: overrides.log_level.clone().unwrap_or(agent.log_level),
        telemetry: TelemetryConfig { prometheus_port: raw.telemetry.prometheus_port },
    })
}

/// Expand a leading `~` to the user's home directory.
/// Paths without one are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix('~') {
        Some("") => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        Some(rest) if rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(&rest[1..]),
            None => PathBuf::from(path),
        },
        _ => PathBuf::from(path),
    }
}
