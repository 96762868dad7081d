use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::{KeysConfig, DEFAULT_RSA_BITS};
use crate::error::{KeyError, LoadErrorKind};
use crate::generate::KeyGenerator;
use crate::jwk::{pem_to_jwk, Jwk, JwkSet, KeyUse};
use crate::paths::{KeyPairPaths, KeyPaths};

const STAGING_PREFIX: &str = ".staging-";

/// PEM text of one key pair, exactly as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemKeyPair {
    pub public: String,
    pub private: String,
}

/// Everything a token service needs: both PEM pairs and the public JWKS.
#[derive(Debug, Clone)]
pub struct KeyPairs {
    pub sig: PemKeyPair,
    pub enc: PemKeyPair,
    pub jwks: JwkSet,
}

/// Generates and loads the signature and encryption key pairs.
///
/// Nothing is cached: every load re-reads the files, so keys replaced on
/// disk by another process are picked up on the next call.
#[derive(Clone)]
pub struct KeyPairManager {
    paths: KeyPaths,
    generator: Arc<dyn KeyGenerator>,
    rsa_bits: usize,
}

impl KeyPairManager {
    pub fn new(base_dir: impl AsRef<Path>, generator: Arc<dyn KeyGenerator>) -> Self {
        Self {
            paths: KeyPaths::new(base_dir),
            generator,
            rsa_bits: DEFAULT_RSA_BITS,
        }
    }

    pub fn from_config(config: &KeysConfig) -> Self {
        Self::new(&config.base_dir, config.build_generator()).with_rsa_bits(config.rsa_bits)
    }

    /// Override the modulus size. Not validated here; `KeysConfig` enforces
    /// the bounds for configured values.
    pub fn with_rsa_bits(mut self, rsa_bits: usize) -> Self {
        self.rsa_bits = rsa_bits;
        self
    }

    pub fn paths(&self) -> &KeyPaths {
        &self.paths
    }

    /// Generate one key pair in place: private key first, then the public key
    /// derived from it.
    pub fn generate_key_pair(&self, pair: &KeyPairPaths) -> Result<(), KeyError> {
        for path in [&pair.private, &pair.public] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    KeyError::generation(parent, format!("Failed to create directory: {e}"))
                })?;
            }
        }

        self.generator.generate_private_key(&pair.private, self.rsa_bits)?;
        restrict_permissions(&pair.private)?;
        self.generator.write_public_key(&pair.private, &pair.public)?;

        Ok(())
    }

    /// Generate both pairs, signature first.
    ///
    /// All four files are written into a staging directory and only moved to
    /// their final paths once both pairs exist. A failure leaves the existing
    /// key files untouched.
    pub fn generate_key_pairs(&self) -> Result<(), KeyError> {
        let directory = self.paths.directory();
        fs::create_dir_all(directory).map_err(|e| {
            KeyError::generation(directory, format!("Failed to create key directory: {e}"))
        })?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(directory)
            .map_err(|e| {
                KeyError::generation(directory, format!("Failed to create staging directory: {e}"))
            })?;
        let staged = KeyPaths::from_keys_dir(staging.path().to_path_buf());

        self.generate_key_pair(&staged.sig)?;
        self.generate_key_pair(&staged.enc)?;

        for (from, to) in [
            (&staged.sig, &self.paths.sig),
            (&staged.enc, &self.paths.enc),
        ] {
            promote(&from.private, &to.private)?;
            promote(&from.public, &to.public)?;
        }

        tracing::info!(
            directory = %directory.display(),
            bits = self.rsa_bits,
            "Generated signature and encryption key pairs"
        );

        Ok(())
    }

    /// Read one pair and convert its public half to a JWK tagged with `key_use`.
    pub fn load_key_pair(
        &self,
        pair: &KeyPairPaths,
        key_use: KeyUse,
    ) -> Result<(PemKeyPair, Jwk), KeyError> {
        let public = fs::read_to_string(&pair.public).map_err(|e| {
            KeyError::load(LoadErrorKind::PublicKeyUnreadable, &pair.public, e.to_string())
        })?;

        let private = fs::read_to_string(&pair.private).map_err(|e| {
            KeyError::load(LoadErrorKind::PrivateKeyUnreadable, &pair.private, e.to_string())
        })?;

        let jwk = pem_to_jwk(&public, key_use)
            .map_err(|e| KeyError::load(LoadErrorKind::JwkConversion, &pair.public, e))?;

        Ok((PemKeyPair { public, private }, jwk))
    }

    /// Load the signature pair, then the encryption pair. Stops at the first
    /// failure.
    pub fn load_key_pairs(&self) -> Result<KeyPairs, KeyError> {
        let (sig, sig_jwk) = self.load_key_pair(&self.paths.sig, KeyUse::Sig)?;
        let (enc, enc_jwk) = self.load_key_pair(&self.paths.enc, KeyUse::Enc)?;

        tracing::debug!(
            directory = %self.paths.directory().display(),
            sig_kid = %sig_jwk.thumbprint(),
            enc_kid = %enc_jwk.thumbprint(),
            "Loaded key pairs"
        );

        Ok(KeyPairs {
            sig,
            enc,
            jwks: JwkSet::new(sig_jwk, enc_jwk),
        })
    }

    /// Load the key pairs, generating both and retrying exactly once if the
    /// first load fails. A second failure is unrecoverable.
    pub fn load_or_generate(&self) -> Result<KeyPairs, KeyError> {
        match self.load_key_pairs() {
            Ok(keys) => Ok(keys),
            Err(err) => {
                tracing::warn!(error = %err, "Key pairs unavailable, generating new ones");
                self.generate_key_pairs()?;

                self.load_key_pairs()
                    .map_err(|e| KeyError::Unrecoverable {
                        directory: self.paths.directory().to_path_buf(),
                        source: Box::new(e),
                    })
            }
        }
    }
}

fn promote(from: &Path, to: &Path) -> Result<(), KeyError> {
    fs::rename(from, to)
        .map_err(|e| KeyError::generation(to, format!("Failed to move key into place: {e}")))
}

#[cfg(unix)]
fn restrict_permissions(private_path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(private_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        KeyError::generation(private_path, format!("Failed to restrict permissions: {e}"))
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_private_path: &Path) -> Result<(), KeyError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::generate::NativeRsa;

    fn test_manager(base: &Path) -> KeyPairManager {
        KeyPairManager::new(base, Arc::new(NativeRsa)).with_rsa_bits(2048)
    }

    #[test]
    fn test_load_missing_pair_reports_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        let err = manager
            .load_key_pair(&manager.paths().sig, KeyUse::Sig)
            .unwrap_err();

        assert_eq!(err.load_kind(), Some(LoadErrorKind::PublicKeyUnreadable));
        assert_eq!(err.path(), Some(manager.paths().sig.public.as_path()));
    }

    #[test]
    fn test_load_missing_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        let pair = manager.paths().sig.clone();
        manager.generate_key_pair(&pair).unwrap();
        fs::remove_file(&pair.private).unwrap();

        let err = manager.load_key_pair(&pair, KeyUse::Sig).unwrap_err();

        assert_eq!(err.load_kind(), Some(LoadErrorKind::PrivateKeyUnreadable));
        assert_eq!(err.path(), Some(pair.private.as_path()));
    }

    #[test]
    fn test_generate_single_pair_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(&dir.path().join("nested/base"));
        let pair = manager.paths().enc.clone();

        manager.generate_key_pair(&pair).unwrap();

        let (pem, jwk) = manager.load_key_pair(&pair, KeyUse::Enc).unwrap();
        assert_eq!(pem.public, fs::read_to_string(&pair.public).unwrap());
        assert_eq!(jwk.key_use, KeyUse::Enc);
        assert!(!manager.paths().sig.public.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        manager.generate_key_pairs().unwrap();

        let mode = fs::metadata(&manager.paths().sig.private)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_generate_key_pairs_leaves_no_staging_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        manager.generate_key_pairs().unwrap();

        let leftovers: Vec<_> = fs::read_dir(manager.paths().directory())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
    }

    #[test]
    fn test_sig_and_enc_keys_differ() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        manager.generate_key_pairs().unwrap();

        let keys = manager.load_key_pairs().unwrap();

        assert_ne!(keys.sig, keys.enc);
        assert_ne!(keys.jwks.keys[0].n, keys.jwks.keys[1].n);
    }
}
