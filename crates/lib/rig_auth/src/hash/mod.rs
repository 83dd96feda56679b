//! Pluggable password and secret hashing.
//!
//! A [`HashingConfig`] is chosen per project; every hash produced is stored as
//! a [`HashingInstance`] that carries the config it was made with, so stored
//! hashes keep verifying after a project switches schemes.

mod bcrypt;
mod scrypt;

use serde::{Deserialize, Serialize};

use crate::error::AuthResult;

pub use self::bcrypt::{BcryptConfig, BcryptHasher};
pub use self::scrypt::{ScryptConfig, ScryptHasher};

/// Hashing method and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum HashingConfig {
    Bcrypt(BcryptConfig),
    Scrypt(ScryptConfig),
}

impl Default for HashingConfig {
    fn default() -> Self {
        HashingConfig::Bcrypt(BcryptConfig::default())
    }
}

impl HashingConfig {
    /// Hash `password` with this configuration.
    pub fn generate(&self, password: &str) -> AuthResult<HashingInstance> {
        new(self).generate(password)
    }
}

/// A stored hash together with the config and salt that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingInstance {
    pub config: HashingConfig,
    pub hash: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<Vec<u8>>,
}

impl HashingInstance {
    /// Check `password` against this hash. A mismatch is `Unauthenticated`.
    pub fn compare(&self, password: &str) -> AuthResult<()> {
        new(&self.config).compare(password, self)
    }
}

/// A hashing scheme.
pub trait Hasher: Send + Sync {
    fn generate(&self, password: &str) -> AuthResult<HashingInstance>;

    fn compare(&self, password: &str, instance: &HashingInstance) -> AuthResult<()>;
}

/// Build the hasher for a config.
pub fn new(config: &HashingConfig) -> Box<dyn Hasher> {
    match config {
        HashingConfig::Bcrypt(cfg) => Box::new(BcryptHasher::new(cfg.clone())),
        HashingConfig::Scrypt(cfg) => Box::new(ScryptHasher::new(cfg.clone())),
    }
}
