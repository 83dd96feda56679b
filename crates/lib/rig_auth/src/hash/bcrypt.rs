//! Password hashing via bcrypt.

use serde::{Deserialize, Serialize};

use super::{Hasher, HashingConfig, HashingInstance};
use crate::error::{AuthError, AuthResult};

/// Default bcrypt cost factor.
pub const DEFAULT_COST: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BcryptConfig {
    pub cost: u32,
}

impl Default for BcryptConfig {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

pub struct BcryptHasher {
    cfg: BcryptConfig,
}

impl BcryptHasher {
    pub fn new(cfg: BcryptConfig) -> Self {
        Self { cfg }
    }
}

impl Hasher for BcryptHasher {
    fn generate(&self, password: &str) -> AuthResult<HashingInstance> {
        let hash = ::bcrypt::hash(password, self.cfg.cost)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))?;
        Ok(HashingInstance {
            config: HashingConfig::Bcrypt(self.cfg.clone()),
            hash: hash.into_bytes(),
            salt: None,
        })
    }

    fn compare(&self, password: &str, instance: &HashingInstance) -> AuthResult<()> {
        let hash = std::str::from_utf8(&instance.hash)
            .map_err(|e| AuthError::Internal(format!("bcrypt hash is not utf-8: {e}")))?;
        let ok = ::bcrypt::verify(password, hash)
            .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))?;
        if ok {
            Ok(())
        } else {
            Err(AuthError::Unauthenticated("wrong password".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> BcryptHasher {
        BcryptHasher::new(BcryptConfig { cost: 4 })
    }

    #[test]
    fn generate_then_compare() {
        let h = hasher();
        let stored = h.generate("correct horse").unwrap();
        assert!(stored.salt.is_none());
        assert!(h.compare("correct horse", &stored).is_ok());
        assert!(matches!(
            h.compare("wrong horse", &stored),
            Err(AuthError::Unauthenticated(_))
        ));
    }

    #[test]
    fn hashes_are_salted() {
        let h = hasher();
        let a = h.generate("same").unwrap();
        let b = h.generate("same").unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn garbage_hash_is_internal_error() {
        let h = hasher();
        let bogus = HashingInstance {
            config: HashingConfig::Bcrypt(BcryptConfig::default()),
            hash: b"not-a-bcrypt-hash".to_vec(),
            salt: None,
        };
        assert!(matches!(
            h.compare("x", &bogus),
            Err(AuthError::Internal(_))
        ));
    }
}
