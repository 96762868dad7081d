pub mod config;
pub mod error;
pub mod generate;
pub mod jwk;
pub mod manager;
pub mod paths;

pub use config::KeysConfig;
pub use error::{KeyError, LoadErrorKind};
pub use generate::{KeyGenerator, NativeRsa, OpenSsl};
pub use jwk::{Jwk, JwkSet, KeyUse};
pub use manager::{KeyPairManager, KeyPairs, PemKeyPair};
pub use paths::{KeyPairPaths, KeyPaths};
