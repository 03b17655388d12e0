//! Node identity: ed25519 keypair generation, persistence, and `node_id` derivation.
//!
//! Layout under `data_dir`:
//! ```text
//! <data_dir>/
//! └── key       (hex-encoded 32-byte signing key seed, mode 0600)
//! ```
//!
//! Once `key` exists it is the identity: a file that cannot be read or decoded
//! is an error and is never replaced by a fresh key.
//!
//! `node_id` is the first 16 hex characters of `SHA256(verifying_key_bytes)`.

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::AppError;

/// File name of the persisted key, relative to the data directory.
pub const KEY_FILE: &str = "key";

/// Whether [`load_or_create`] found an existing key or generated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOrigin {
    Loaded,
    Generated,
}

/// Loaded node identity.
#[derive(Clone)]
pub struct Identity {
    /// First 16 hex chars of `SHA256(verifying_key)`.
    pub node_id: String,
    pub origin: IdentityOrigin,
    signing_key: SigningKey,
}

impl Identity {
    fn from_signing_key(signing_key: SigningKey, origin: IdentityOrigin) -> Self {
        let node_id = compute_node_id(&signing_key.verifying_key());
        Self { node_id, origin, signing_key }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }
}

/// Two identities are equal when they hold the same key; origin is ignored.
impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.signing_key.to_bytes() == other.signing_key.to_bytes()
    }
}

impl Eq for Identity {}

// Never print key material.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("node_id", &self.node_id)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Path of the key file under `data_dir`.
pub fn key_path(data_dir: &Path) -> PathBuf {
    data_dir.join(KEY_FILE)
}

/// Load the node key from `data_dir/key`, or generate and persist one if the
/// file does not exist.
pub fn load_or_create(data_dir: &Path) -> Result<Identity, AppError> {
    let path = key_path(data_dir);

    match fs::metadata(&path) {
        Ok(_) => {
            let signing_key = load_key(&path)?;
            debug!(path = %path.display(), "loaded node key");
            Ok(Identity::from_signing_key(signing_key, IdentityOrigin::Loaded))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let signing_key = SigningKey::generate(&mut OsRng);
            save_key(&path, &signing_key)?;
            let identity = Identity::from_signing_key(signing_key, IdentityOrigin::Generated);
            info!(node_id = %identity.node_id, path = %path.display(), "generated new node key");
            Ok(identity)
        }
        Err(e) => Err(AppError::io(format!("failed to stat ({})", path.display()), e)),
    }
}

/// Derive `node_id`: first 16 hex chars of `SHA256(verifying_key_bytes)`.
pub fn compute_node_id(verifying_key: &VerifyingKey) -> String {
    let digest = Sha256::digest(verifying_key.as_bytes());
    hex::encode(&digest[..8])
}

// ── internals ────────────────────────────────────────────────────────────────

fn load_key(path: &Path) -> Result<SigningKey, AppError> {
    let data = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("cannot read node key ({})", path.display()), e))?;

    let bytes = hex::decode(data.trim())
        .map_err(|e| AppError::Decode(format!("node key {} is not valid hex: {e}", path.display())))?;

    let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
        AppError::Decode(format!(
            "node key {} has {} bytes, expected 32",
            path.display(),
            b.len()
        ))
    })?;

    Ok(SigningKey::from_bytes(&seed))
}

/// Write the hex seed with owner-only permissions. `create_new` refuses to
/// clobber a key that appeared after the stat.
fn save_key(path: &Path, signing_key: &SigningKey) -> Result<(), AppError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| AppError::io(format!("cannot create node key ({})", path.display()), e))?;

    file.write_all(hex::encode(signing_key.to_bytes()).as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| AppError::io(format!("cannot write node key ({})", path.display()), e))
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn node_id_is_16_hex_chars() {
        let key = SigningKey::generate(&mut OsRng);
        let id = compute_node_id(&key.verifying_key());
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fresh_dir_generates_and_persists() {
        let tmp = TempDir::new().unwrap();
        let identity = load_or_create(tmp.path()).unwrap();

        assert_eq!(identity.origin, IdentityOrigin::Generated);
        let stored = fs::read_to_string(key_path(tmp.path())).unwrap();
        assert_eq!(stored, hex::encode(identity.signing_key().to_bytes()));
    }

    #[test]
    fn reload_returns_same_identity() {
        let tmp = TempDir::new().unwrap();
        let first = load_or_create(tmp.path()).unwrap();
        let second = load_or_create(tmp.path()).unwrap();

        assert_eq!(second.origin, IdentityOrigin::Loaded);
        assert_eq!(first, second);
        assert_eq!(first.node_id, second.node_id);
    }

    #[test]
    fn trailing_newline_is_tolerated() {
        let tmp = TempDir::new().unwrap();
        let key = SigningKey::generate(&mut OsRng);
        fs::write(key_path(tmp.path()), format!("{}\n", hex::encode(key.to_bytes()))).unwrap();

        let identity = load_or_create(tmp.path()).unwrap();
        assert_eq!(identity.verifying_key_bytes(), key.verifying_key().to_bytes());
    }

    #[test]
    fn non_hex_key_is_decode_error_and_file_is_kept() {
        let tmp = TempDir::new().unwrap();
        let path = key_path(tmp.path());
        fs::write(&path, "this is not hex").unwrap();

        let err = load_or_create(tmp.path()).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)), "got {err}");
        assert_eq!(fs::read_to_string(&path).unwrap(), "this is not hex");
    }

    #[test]
    fn short_key_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(key_path(tmp.path()), "deadbeef").unwrap();

        let err = load_or_create(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("expected 32"));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let tmp = TempDir::new().unwrap();
        let identity = load_or_create(tmp.path()).unwrap();
        let secret_hex = hex::encode(identity.signing_key().to_bytes());
        assert!(!format!("{identity:?}").contains(&secret_hex));
    }

    #[test]
    fn missing_data_dir_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_or_create(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn data_dir_that_is_a_file_fails_to_stat() {
        let tmp = TempDir::new().unwrap();
        let not_a_dir = tmp.path().join("plain");
        fs::write(&not_a_dir, b"").unwrap();

        let err = load_or_create(&not_a_dir).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }), "{err:?}");
        assert!(err.to_string().contains("failed to stat"), "{err}");
        assert!(!not_a_dir.join(KEY_FILE).exists());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_mode_is_0600() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        load_or_create(tmp.path()).unwrap();
        let mode = fs::metadata(key_path(tmp.path())).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
