//! Chain definitions: the `ChainSpec` type and its two importers.
//!
//! A chain is either read from a JSON file on disk ([`import_from_file`]) or
//! looked up in the static registry of well-known chains compiled into the
//! binary ([`import_from_name`]). Deciding which importer applies to a chain
//! reference is the job of [`crate::bootstrap::chain`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known chains, keyed by name. Definitions are embedded at build time.
const WELL_KNOWN_CHAINS: &[(&str, &str)] = &[
    ("foundation", include_str!("chains/foundation.json")),
    ("goerli", include_str!("chains/goerli.json")),
];

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid chain definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("not an existing file and not a known chain name '{0}'")]
    UnknownChain(String),
}

/// Resolved chain definition.
///
/// Beyond deserialisation the bootstrap layer treats this as opaque; the node
/// runtime owns the meaning of every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub name: String,
    pub genesis: Genesis,
    pub params: Params,
    #[serde(default)]
    pub bootnodes: Vec<String>,
}

/// Genesis block parameters, kept as the hex strings found in the definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    pub nonce: String,
    pub timestamp: String,
    pub extra_data: String,
    pub gas_limit: String,
    pub difficulty: String,
    #[serde(default)]
    pub mix_hash: Option<String>,
    #[serde(default)]
    pub coinbase: Option<String>,
}

/// Network rules: chain id, fork activation blocks, consensus engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(rename = "chainID")]
    pub chain_id: u64,
    #[serde(default)]
    pub forks: BTreeMap<String, u64>,
    #[serde(default)]
    pub engine: BTreeMap<String, serde_json::Value>,
}

impl ChainSpec {
    /// Name of the consensus engine, if the definition names exactly one.
    pub fn engine_name(&self) -> Option<&str> {
        let mut names = self.params.engine.keys();
        match (names.next(), names.next()) {
            (Some(name), None) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Parse a chain definition from a JSON file.
pub fn import_from_file(path: &Path) -> Result<ChainSpec, ChainError> {
    let raw = fs::read_to_string(path).map_err(|source| ChainError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Look up a chain in the well-known registry.
pub fn import_from_name(name: &str) -> Result<ChainSpec, ChainError> {
    let (_, raw) = WELL_KNOWN_CHAINS
        .iter()
        .find(|(known, _)| *known == name)
        .ok_or_else(|| ChainError::UnknownChain(name.to_string()))?;
    Ok(serde_json::from_str(raw)?)
}

/// Names accepted by [`import_from_name`].
pub fn known_chains() -> impl Iterator<Item = &'static str> {
    WELL_KNOWN_CHAINS.iter().map(|(name, _)| *name)
}
