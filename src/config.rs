use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::KeyError;
use crate::generate::{KeyGenerator, NativeRsa, OpenSsl};

pub const DEFAULT_RSA_BITS: usize = 4096;
const MIN_RSA_BITS: usize = 2048;
const MAX_RSA_BITS: usize = 16384;
/// The `rsa` crate caps the modulus size of the keys it parses.
const MAX_NATIVE_RSA_BITS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    OpenSsl,
    Native,
}

/// Settings for the key pair manager, normally read from `AUTHKEYS_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysConfig {
    pub base_dir: PathBuf,
    pub generator: GeneratorKind,
    pub openssl_program: PathBuf,
    pub rsa_bits: usize,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            generator: GeneratorKind::OpenSsl,
            openssl_program: PathBuf::from("openssl"),
            rsa_bits: DEFAULT_RSA_BITS,
        }
    }
}

impl KeysConfig {
    pub fn from_env() -> Result<Self, KeyError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup. A relative base
    /// directory is resolved against the current working directory here, once.
    pub fn from_vars<F>(lookup: F) -> Result<Self, KeyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_dir = lookup("AUTHKEYS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.base_dir);
        let base_dir = if base_dir.is_absolute() {
            base_dir
        } else {
            env::current_dir()
                .map_err(|e| KeyError::Config(format!("Cannot resolve working directory: {e}")))?
                .join(base_dir)
        };

        let generator = match lookup("AUTHKEYS_GENERATOR").as_deref() {
            None | Some("openssl") => GeneratorKind::OpenSsl,
            Some("native") => GeneratorKind::Native,
            Some(other) => {
                return Err(KeyError::Config(format!(
                    "AUTHKEYS_GENERATOR must be \"openssl\" or \"native\", got {other:?}"
                )))
            }
        };

        let openssl_program = lookup("AUTHKEYS_OPENSSL")
            .map(PathBuf::from)
            .unwrap_or(defaults.openssl_program);

        let rsa_bits = match lookup("AUTHKEYS_RSA_BITS") {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                KeyError::Config(format!("AUTHKEYS_RSA_BITS is not a number: {e}"))
            })?,
            None => defaults.rsa_bits,
        };
        let max_bits = match generator {
            GeneratorKind::OpenSsl => MAX_RSA_BITS,
            GeneratorKind::Native => MAX_NATIVE_RSA_BITS,
        };
        if !(MIN_RSA_BITS..=max_bits).contains(&rsa_bits) {
            return Err(KeyError::Config(format!(
                "AUTHKEYS_RSA_BITS must be between {MIN_RSA_BITS} and {max_bits}, got {rsa_bits}"
            )));
        }

        Ok(Self {
            base_dir,
            generator,
            openssl_program,
            rsa_bits,
        })
    }

    pub fn build_generator(&self) -> Arc<dyn KeyGenerator> {
        match self.generator {
            GeneratorKind::OpenSsl => Arc::new(OpenSsl::new(&self.openssl_program)),
            GeneratorKind::Native => Arc::new(NativeRsa),
        }
    }
}
