//! Data directory layout.
//!
//! ```text
//! <data_dir>/
//! ├── key           (node identity, see `bootstrap::identity`)
//! ├── blockchain/   (block storage)
//! └── trie/         (state trie storage)
//! ```
//!
//! [`ensure_layout`] is a sequential best-effort ensure: if directory N fails,
//! directories 1..N-1 stay created.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AppError;

pub const BLOCKCHAIN_DIR: &str = "blockchain";
pub const TRIE_DIR: &str = "trie";

/// Subdirectories every node data directory must contain.
pub const NODE_SUBDIRS: &[&str] = &[BLOCKCHAIN_DIR, TRIE_DIR];

/// A data directory whose root and subdirectories are known to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    root: PathBuf,
    subdirs: Vec<PathBuf>,
}

impl DirectoryLayout {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute-or-root-relative paths of every ensured subdirectory.
    pub fn subdirs(&self) -> &[PathBuf] {
        &self.subdirs
    }

    pub fn blockchain_dir(&self) -> PathBuf {
        self.root.join(BLOCKCHAIN_DIR)
    }

    pub fn trie_dir(&self) -> PathBuf {
        self.root.join(TRIE_DIR)
    }
}

/// Ensure `root` and every `root/<subdir>` exist as directories.
pub fn ensure_layout<S: AsRef<Path>>(root: &Path, subdirs: &[S]) -> Result<DirectoryLayout, AppError> {
    create_dir(root)
        .map_err(|e| AppError::io(format!("failed to create data dir ({})", root.display()), e))?;

    let mut ensured = Vec::with_capacity(subdirs.len());
    for sub in subdirs {
        let path = root.join(sub);
        create_dir(&path)
            .map_err(|e| AppError::io(format!("failed to create path ({})", path.display()), e))?;
        ensured.push(path);
    }

    Ok(DirectoryLayout { root: root.to_path_buf(), subdirs: ensured })
}

fn create_dir(path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(ErrorKind::AlreadyExists, "exists but is not a directory")),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "creating directory");
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o755);
            }
            builder.create(path)
        }
        Err(e) => Err(e),
    }
}
