use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use rand_core::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::error::KeyError;

const OPENSSL_HINT: &str = "Please ensure you have OpenSSL installed and configured on your system.";

/// Key-generation capability used by the key pair manager.
///
/// Implementations write PEM files; they never hand key material back to the
/// caller.
pub trait KeyGenerator: Send + Sync {
    /// Create a new RSA private key of `bits` bits at `private_path`.
    fn generate_private_key(&self, private_path: &Path, bits: usize) -> Result<(), KeyError>;

    /// Derive the public key of the private key at `private_path` and write it
    /// to `public_path`.
    fn write_public_key(&self, private_path: &Path, public_path: &Path) -> Result<(), KeyError>;
}

/// Shells out to the `openssl` command-line tool.
#[derive(Debug, Clone)]
pub struct OpenSsl {
    program: PathBuf,
}

impl OpenSsl {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&OsStr], target: &Path) -> Result<(), KeyError> {
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                KeyError::generation(
                    target,
                    format!("failed to run {}: {e}. {OPENSSL_HINT}", self.program.display()),
                )
            })?;

        tracing::debug!(
            program = %self.program.display(),
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "openssl finished"
        );

        if !output.status.success() {
            return Err(KeyError::generation(
                target,
                format!(
                    "{} exited with {}. {OPENSSL_HINT}",
                    self.program.display(),
                    output.status
                ),
            ));
        }

        Ok(())
    }
}

impl Default for OpenSsl {
    fn default() -> Self {
        Self::new("openssl")
    }
}

impl KeyGenerator for OpenSsl {
    fn generate_private_key(&self, private_path: &Path, bits: usize) -> Result<(), KeyError> {
        let bits = bits.to_string();
        self.run(
            &[
                OsStr::new("genrsa"),
                OsStr::new("-out"),
                private_path.as_os_str(),
                OsStr::new(&bits),
            ],
            private_path,
        )
    }

    fn write_public_key(&self, private_path: &Path, public_path: &Path) -> Result<(), KeyError> {
        self.run(
            &[
                OsStr::new("rsa"),
                OsStr::new("-pubout"),
                OsStr::new("-in"),
                private_path.as_os_str(),
                OsStr::new("-out"),
                public_path.as_os_str(),
            ],
            public_path,
        )
    }
}

/// In-process generation with the `rsa` crate. Writes a PKCS#8 private key
/// and an SPKI public key, the same formats OpenSSL 3 produces.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRsa;

impl KeyGenerator for NativeRsa {
    fn generate_private_key(&self, private_path: &Path, bits: usize) -> Result<(), KeyError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| {
            KeyError::generation(private_path, format!("Failed to generate RSA key: {e}"))
        })?;

        let pem = private_key.to_pkcs8_pem(LineEnding::LF).map_err(|e| {
            KeyError::generation(private_path, format!("Failed to encode private key: {e}"))
        })?;

        create_private_file(private_path)
            .and_then(|mut file| file.write_all(pem.as_bytes()))
            .map_err(|e| {
                KeyError::generation(private_path, format!("Failed to write private key: {e}"))
            })
    }

    fn write_public_key(&self, private_path: &Path, public_path: &Path) -> Result<(), KeyError> {
        let private_pem = fs::read_to_string(private_path).map_err(|e| {
            KeyError::generation(private_path, format!("Failed to read private key: {e}"))
        })?;

        let private_key = RsaPrivateKey::from_pkcs8_pem(&private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&private_pem))
            .map_err(|e| {
                KeyError::generation(private_path, format!("Failed to parse private key: {e}"))
            })?;

        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| {
                KeyError::generation(public_path, format!("Failed to encode public key: {e}"))
            })?;

        fs::write(public_path, public_pem).map_err(|e| {
            KeyError::generation(public_path, format!("Failed to write public key: {e}"))
        })
    }
}

/// Open `path` for writing. New files are created owner-only on Unix.
fn create_private_file(path: &Path) -> std::io::Result<fs::File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
