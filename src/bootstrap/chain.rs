//! Chain reference resolution.
//!
//! A chain reference is tried as a filesystem path first. Only when the path
//! does not exist is it looked up as a well-known chain name; any other stat
//! failure (permissions, I/O) stops resolution.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::chain::{self, ChainSpec};
use crate::error::AppError;

/// Which importer produced a [`ResolvedChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSource {
    File,
    Registry,
}

impl ChainSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainSource::File => "file",
            ChainSource::Registry => "registry",
        }
    }
}

impl fmt::Display for ChainSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedChain {
    pub spec: ChainSpec,
    pub source: ChainSource,
}

/// Resolve `reference` to a chain specification.
pub fn resolve(reference: &str) -> Result<ResolvedChain, AppError> {
    let path = Path::new(reference);

    let (source, imported) = match fs::metadata(path) {
        Ok(_) => (ChainSource::File, chain::import_from_file(path)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            (ChainSource::Registry, chain::import_from_name(reference))
        }
        Err(e) => return Err(AppError::io(format!("failed to stat ({reference})"), e)),
    };

    debug!(%reference, %source, "chain importer selected");

    let spec = imported.map_err(|source| AppError::Resolution {
        reference: reference.to_string(),
        source,
    })?;

    Ok(ResolvedChain { spec, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;
    use tempfile::TempDir;

    #[test]
    fn well_known_name_uses_registry() {
        let resolved = resolve("foundation").unwrap();
        assert_eq!(resolved.source, ChainSource::Registry);
        assert_eq!(resolved.spec.name, "foundation");
    }

    #[test]
    fn existing_path_uses_file_importer() {
        let tmp = TempDir::new().unwrap();
        let spec = chain::import_from_name("goerli").unwrap();
        let path = tmp.path().join("chain.json");
        fs::write(&path, serde_json::to_string(&spec).unwrap()).unwrap();

        let resolved = resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved.source, ChainSource::File);
        assert_eq!(resolved.spec, spec);
    }

    #[test]
    fn file_takes_precedence_over_name() {
        // A file literally named like a well-known chain must win.
        let tmp = TempDir::new().unwrap();
        let mut spec = chain::import_from_name("goerli").unwrap();
        spec.name = "local-foundation".into();
        let path = tmp.path().join("foundation");
        fs::write(&path, serde_json::to_string(&spec).unwrap()).unwrap();

        let resolved = resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved.source, ChainSource::File);
        assert_eq!(resolved.spec.name, "local-foundation");
    }

    #[test]
    fn neither_file_nor_name_is_resolution_error() {
        let err = resolve("no-such-chain").unwrap_err();
        match err {
            AppError::Resolution { reference, source } => {
                assert_eq!(reference, "no-such-chain");
                assert!(matches!(source, ChainError::UnknownChain(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn broken_file_keeps_reference_in_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, "not json").unwrap();
        let reference = path.to_str().unwrap();

        let err = resolve(reference).unwrap_err();
        assert!(matches!(err, AppError::Resolution { .. }));
        assert!(err.to_string().contains(reference));
    }

    #[cfg(unix)]
    #[test]
    fn stat_failure_other_than_not_found_is_io_error() {
        // A path that traverses a regular file fails with ENOTDIR, not ENOENT.
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain");
        fs::write(&file, "x").unwrap();
        let reference = file.join("chain.json");

        let err = resolve(reference.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }), "got {err}");
    }
}
