use std::fmt;
use std::path::{Path, PathBuf};

/// Why a key pair could not be loaded from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorKind {
    PublicKeyUnreadable,
    PrivateKeyUnreadable,
    JwkConversion,
}

impl fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadErrorKind::PublicKeyUnreadable => write!(f, "public key unreadable"),
            LoadErrorKind::PrivateKeyUnreadable => write!(f, "private key unreadable"),
            LoadErrorKind::JwkConversion => write!(f, "JWK conversion failed"),
        }
    }
}

/// Unified error type for key generation and loading.
///
/// Every variant that touches the filesystem carries the offending path.
#[derive(Debug)]
pub enum KeyError {
    Generation {
        path: PathBuf,
        message: String,
    },
    Load {
        kind: LoadErrorKind,
        path: PathBuf,
        message: String,
    },
    Config(String),
    Unrecoverable {
        directory: PathBuf,
        source: Box<KeyError>,
    },
}

impl KeyError {
    pub fn generation(path: &Path, message: impl Into<String>) -> Self {
        KeyError::Generation {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn load(kind: LoadErrorKind, path: &Path, message: impl Into<String>) -> Self {
        KeyError::Load {
            kind,
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// The load failure kind, looking through `Unrecoverable`.
    pub fn load_kind(&self) -> Option<LoadErrorKind> {
        match self {
            KeyError::Load { kind, .. } => Some(*kind),
            KeyError::Unrecoverable { source, .. } => source.load_kind(),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            KeyError::Generation { path, .. } | KeyError::Load { path, .. } => Some(path),
            KeyError::Unrecoverable { directory, .. } => Some(directory),
            KeyError::Config(_) => None,
        }
    }
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Generation { path, message } => {
                write!(f, "Failed to generate keys at {}: {message}", path.display())
            }
            KeyError::Load {
                kind,
                path,
                message,
            } => write!(f, "{kind}: {}: {message}", path.display()),
            KeyError::Config(msg) => write!(f, "Invalid configuration: {msg}"),
            KeyError::Unrecoverable { directory, source } => write!(
                f,
                "Unable to read the token-signing key pair from {}: {source}",
                directory.display()
            ),
        }
    }
}

impl std::error::Error for KeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyError::Unrecoverable { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display_names_kind_and_path() {
        let err = KeyError::load(
            LoadErrorKind::PublicKeyUnreadable,
            Path::new("/srv/keys/sig.rsa.pub.pem"),
            "No such file or directory",
        );

        assert_eq!(
            err.to_string(),
            "public key unreadable: /srv/keys/sig.rsa.pub.pem: No such file or directory"
        );
        assert_eq!(err.load_kind(), Some(LoadErrorKind::PublicKeyUnreadable));
        assert_eq!(err.path(), Some(Path::new("/srv/keys/sig.rsa.pub.pem")));
    }

    #[test]
    fn test_generation_error_display() {
        let err = KeyError::generation(Path::new("/srv/keys/sig.rsa.prv.pem"), "disk full");

        assert_eq!(
            err.to_string(),
            "Failed to generate keys at /srv/keys/sig.rsa.prv.pem: disk full"
        );
        assert_eq!(err.load_kind(), None);
    }

    #[test]
    fn test_unrecoverable_exposes_source() {
        let inner = KeyError::load(
            LoadErrorKind::JwkConversion,
            Path::new("/srv/keys/enc.rsa.pub.pem"),
            "bad pem",
        );
        let err = KeyError::Unrecoverable {
            directory: PathBuf::from("/srv/keys"),
            source: Box::new(inner),
        };

        assert_eq!(err.load_kind(), Some(LoadErrorKind::JwkConversion));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("Unable to read the token-signing key pair"));
    }
}
