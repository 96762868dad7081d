use std::path::{Path, PathBuf};

const KEYS_DIR: &str = "keys";
const SETUP_TOKEN_FILE: &str = "setup.token";

/// Public/private file locations of one RSA key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairPaths {
    pub public: PathBuf,
    pub private: PathBuf,
}

impl KeyPairPaths {
    fn in_dir(dir: &Path, prefix: &str) -> Self {
        Self {
            public: dir.join(format!("{prefix}.rsa.pub.pem")),
            private: dir.join(format!("{prefix}.rsa.prv.pem")),
        }
    }
}

/// Canonical key file layout under `<base>/keys/`.
///
/// Pure path arithmetic: nothing here touches the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    directory: PathBuf,
    pub sig: KeyPairPaths,
    pub enc: KeyPairPaths,
    setup_token: PathBuf,
}

impl KeyPaths {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self::from_keys_dir(base_dir.as_ref().join(KEYS_DIR))
    }

    /// Same file names, rooted directly at `directory` (no `keys/` suffix).
    pub(crate) fn from_keys_dir(directory: PathBuf) -> Self {
        Self {
            sig: KeyPairPaths::in_dir(&directory, "sig"),
            enc: KeyPairPaths::in_dir(&directory, "enc"),
            setup_token: directory.join(SETUP_TOKEN_FILE),
            directory,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn setup_token(&self) -> &Path {
        &self.setup_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn test_layout_under_keys_dir() {
        let paths = KeyPaths::new("/srv/idp");

        assert_eq!(paths.directory(), Path::new("/srv/idp/keys"));
        assert_eq!(paths.sig.public, Path::new("/srv/idp/keys/sig.rsa.pub.pem"));
        assert_eq!(paths.sig.private, Path::new("/srv/idp/keys/sig.rsa.prv.pem"));
        assert_eq!(paths.enc.public, Path::new("/srv/idp/keys/enc.rsa.pub.pem"));
        assert_eq!(paths.enc.private, Path::new("/srv/idp/keys/enc.rsa.prv.pem"));
        assert_eq!(paths.setup_token(), Path::new("/srv/idp/keys/setup.token"));
    }

    #[test]
    fn test_paths_are_deterministic() {
        assert_eq!(KeyPaths::new("relative/base"), KeyPaths::new("relative/base"));
    }

    #[test]
    fn test_paths_are_distinct() {
        for base in ["/", "/srv/idp", "relative", "with space/dir"] {
            let paths = KeyPaths::new(base);
            let all: HashSet<&Path> = [
                paths.sig.public.as_path(),
                paths.sig.private.as_path(),
                paths.enc.public.as_path(),
                paths.enc.private.as_path(),
                paths.setup_token(),
            ]
            .into_iter()
            .collect();

            assert_eq!(all.len(), 5, "aliased paths for base {base:?}");
            assert_ne!(paths.sig, paths.enc);
        }
    }
}
