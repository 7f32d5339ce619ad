//! Identity credential management
//!
//! A device session authenticates with a persistent ed25519 key pair,
//! stored as two hex-encoded artifacts under an application-private
//! directory. The pair is created lazily on first use and cached in
//! memory for the rest of the process.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use devlink_core::error::IdentityError;
use devlink_core::transport::TransportCredential;

/// File name of the private-key artifact
pub const PRIVATE_KEY_FILE: &str = "identity_key";
/// File name of the public-key artifact
pub const PUBLIC_KEY_FILE: &str = "identity_key.pub";

/// An ed25519 key pair used to authenticate device sessions.
///
/// Immutable once created; cloning shares the same key material.
#[derive(Clone)]
pub struct IdentityCredential {
    signing: SigningKey,
}

impl IdentityCredential {
    fn new(signing: SigningKey) -> Self {
        Self { signing }
    }

    /// Public half of the key pair.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Hex-encoded public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().to_bytes())
    }

    /// SHA-256 fingerprint of the public key, hex-encoded.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.verifying_key().to_bytes()))
    }

    /// Credential form handed to transport dialers.
    pub fn transport_credential(&self) -> TransportCredential {
        TransportCredential {
            public_key: self.public_key_hex(),
        }
    }
}

impl fmt::Debug for IdentityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        f.debug_struct("IdentityCredential")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Loads or generates the process-wide identity credential
pub struct IdentityManager {
    storage_dir: Option<PathBuf>,
    cached: Mutex<Option<IdentityCredential>>,
}

impl IdentityManager {
    /// Manager backed by a persistent storage directory, or purely
    /// in-memory when `storage_dir` is `None`.
    pub fn new(storage_dir: Option<PathBuf>) -> Self {
        Self {
            storage_dir,
            cached: Mutex::new(None),
        }
    }

    /// Manager persisting artifacts under `dir`.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self::new(Some(dir.into()))
    }

    /// Manager with no persistent storage: the key pair is generated into
    /// a throwaway location, cached, and the artifacts deleted
    /// immediately. The in-memory cache is the source of truth for the
    /// rest of the process.
    pub fn ephemeral() -> Self {
        Self::new(None)
    }

    /// Directory the artifacts are persisted under, if any.
    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    /// Return the cached credential, loading or generating it on first
    /// use. A single critical section prevents duplicate generation under
    /// concurrent first use.
    pub fn get_or_create(&self) -> Result<IdentityCredential, IdentityError> {
        let mut cached = self.lock_cache();
        if let Some(credential) = cached.as_ref() {
            return Ok(credential.clone());
        }

        let credential = match &self.storage_dir {
            Some(dir) => load_or_generate(dir)?,
            None => {
                tracing::warn!("No key storage configured, using throwaway key generation");
                generate_throwaway()?.0
            }
        };

        *cached = Some(credential.clone());
        Ok(credential)
    }

    /// Discard the cached credential and any persisted artifacts, then
    /// generate a fresh pair.
    pub fn rotate(&self) -> Result<IdentityCredential, IdentityError> {
        {
            let mut cached = self.lock_cache();
            *cached = None;
        }
        if let Some(dir) = &self.storage_dir {
            for name in [PRIVATE_KEY_FILE, PUBLIC_KEY_FILE] {
                let path = dir.join(name);
                if path.exists() {
                    fs::remove_file(&path).map_err(|source| IdentityError::Write {
                        path: path.clone(),
                        source,
                    })?;
                }
            }
        }
        self.get_or_create()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<IdentityCredential>> {
        match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn load_or_generate(dir: &Path) -> Result<IdentityCredential, IdentityError> {
    let private_path = dir.join(PRIVATE_KEY_FILE);
    let public_path = dir.join(PUBLIC_KEY_FILE);

    if private_path.exists() && public_path.exists() {
        tracing::info!("Loading identity key pair from {}", dir.display());
        return load_key_pair(&private_path, &public_path);
    }

    tracing::info!("No identity key pair found, generating a new one");
    generate_key_pair(&private_path, &public_path)?;
    load_key_pair(&private_path, &public_path)
}

/// Generate a fresh key pair directly into the given artifact paths.
fn generate_key_pair(private_path: &Path, public_path: &Path) -> Result<(), IdentityError> {
    if let Some(parent) = private_path.parent() {
        fs::create_dir_all(parent).map_err(|source| IdentityError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let signing = SigningKey::generate(&mut OsRng);

    write_artifact(private_path, &hex::encode(signing.to_bytes()))?;
    restrict_permissions(private_path)?;
    write_artifact(public_path, &hex::encode(signing.verifying_key().to_bytes()))?;

    Ok(())
}

fn write_artifact(path: &Path, contents: &str) -> Result<(), IdentityError> {
    fs::write(path, format!("{}\n", contents)).map_err(|source| IdentityError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Private keys are readable by the owning user only.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), IdentityError> {
    use std::os::unix::fs::PermissionsExt;

    let map_err = |source| IdentityError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut perms = fs::metadata(path).map_err(map_err)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms).map_err(map_err)
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), IdentityError> {
    Ok(())
}

fn load_key_pair(
    private_path: &Path,
    public_path: &Path,
) -> Result<IdentityCredential, IdentityError> {
    let signing = SigningKey::from_bytes(&decode_artifact(private_path)?);

    let public_bytes = decode_artifact(public_path)?;
    let expected = VerifyingKey::from_bytes(&public_bytes).map_err(|e| IdentityError::Malformed {
        path: public_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if signing.verifying_key() != expected {
        return Err(IdentityError::Malformed {
            path: public_path.to_path_buf(),
            reason: "public key does not match private key".to_string(),
        });
    }

    Ok(IdentityCredential::new(signing))
}

fn decode_artifact(path: &Path) -> Result<[u8; 32], IdentityError> {
    let text = fs::read_to_string(path).map_err(|source| IdentityError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let bytes = hex::decode(text.trim()).map_err(|e| IdentityError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    bytes.try_into().map_err(|_| IdentityError::Malformed {
        path: path.to_path_buf(),
        reason: "expected 32 bytes of key material".to_string(),
    })
}

/// Generate into a throwaway directory, load, then delete the artifacts.
/// Returns the directory so tests can verify the cleanup.
fn generate_throwaway() -> Result<(IdentityCredential, PathBuf), IdentityError> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("devlink-keys-{}-{}", std::process::id(), nanos));

    let private_path = dir.join(PRIVATE_KEY_FILE);
    let public_path = dir.join(PUBLIC_KEY_FILE);

    generate_key_pair(&private_path, &public_path)?;
    let credential = load_key_pair(&private_path, &public_path)?;

    for path in [&private_path, &public_path] {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete throwaway key artifact {}: {}", path.display(), e);
        }
    }
    if let Err(e) = fs::remove_dir(&dir) {
        tracing::warn!("Failed to delete throwaway key directory {}: {}", dir.display(), e);
    }

    Ok((credential, dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let first = IdentityManager::persistent(dir.path());
        let generated = first.get_or_create().unwrap();
        assert!(dir.path().join(PRIVATE_KEY_FILE).exists());
        assert!(dir.path().join(PUBLIC_KEY_FILE).exists());

        let second = IdentityManager::persistent(dir.path());
        let loaded = second.get_or_create().unwrap();
        assert_eq!(generated.fingerprint(), loaded.fingerprint());
    }

    #[test]
    fn test_cached_credential_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let manager = IdentityManager::persistent(dir.path());

        let first = manager.get_or_create().unwrap();

        // Corrupt the artifacts; the cache must still win.
        fs::write(dir.path().join(PRIVATE_KEY_FILE), "not hex").unwrap();
        let second = manager.get_or_create().unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_throwaway_generation_deletes_artifacts() {
        let (credential, dir) = generate_throwaway().unwrap();
        assert!(!dir.join(PRIVATE_KEY_FILE).exists());
        assert!(!dir.join(PUBLIC_KEY_FILE).exists());
        assert_eq!(credential.public_key_hex().len(), 64);
    }

    #[test]
    fn test_malformed_private_artifact() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PRIVATE_KEY_FILE), "zz not hex").unwrap();
        fs::write(dir.path().join(PUBLIC_KEY_FILE), "00").unwrap();

        let manager = IdentityManager::persistent(dir.path());
        let err = manager.get_or_create().unwrap_err();
        assert!(matches!(err, IdentityError::Malformed { .. }));
    }

    #[test]
    fn test_mismatched_public_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let manager = IdentityManager::persistent(dir.path());
        manager.get_or_create().unwrap();

        // Replace the public half with a different (valid) key.
        let other = SigningKey::generate(&mut OsRng);
        fs::write(
            dir.path().join(PUBLIC_KEY_FILE),
            hex::encode(other.verifying_key().to_bytes()),
        )
        .unwrap();

        let fresh = IdentityManager::persistent(dir.path());
        let err = fresh.get_or_create().unwrap_err();
        assert!(matches!(err, IdentityError::Malformed { .. }));
    }

    #[test]
    fn test_rotate_produces_new_key() {
        let dir = tempfile::tempdir().unwrap();
        let manager = IdentityManager::persistent(dir.path());

        let first = manager.get_or_create().unwrap();
        let rotated = manager.rotate().unwrap();
        assert_ne!(first.fingerprint(), rotated.fingerprint());
        assert!(dir.path().join(PRIVATE_KEY_FILE).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let manager = IdentityManager::persistent(dir.path());
        manager.get_or_create().unwrap();

        let mode = fs::metadata(dir.path().join(PRIVATE_KEY_FILE))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
