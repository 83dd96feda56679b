//! Scrypt hashing in the legacy format of an external identity provider.
//!
//! Imported users keep their original hashes: the password is run through
//! scrypt with `salt || salt_separator`, the derived key is used as an AES
//! key in CTR mode with a zero IV, and the resulting keystream is XORed over
//! the project's signer key. The ciphertext is the stored hash.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{Hasher, HashingConfig, HashingInstance};
use crate::error::{AuthError, AuthResult};

/// Salt length for newly generated hashes.
const SALT_SIZE: usize = 12;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;
type Aes192Ctr = ctr::Ctr128BE<aes::Aes192>;
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Scrypt parameters. `signer_key` and `salt_separator` are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptConfig {
    pub signer_key: String,
    pub salt_separator: String,
    /// Block size (`r`).
    pub rounds: u32,
    /// log2 of the CPU/memory cost (`N = 1 << mem_cost`).
    pub mem_cost: u32,
    /// Parallelism (`p`).
    pub p: u32,
    /// Derived key length in bytes; also selects AES-128/192/256.
    pub key_len: u32,
}

impl Default for ScryptConfig {
    fn default() -> Self {
        Self {
            signer_key: String::new(),
            salt_separator: "Bw==".to_string(),
            rounds: 8,
            mem_cost: 14,
            p: 1,
            key_len: 32,
        }
    }
}

pub struct ScryptHasher {
    cfg: ScryptConfig,
}

impl ScryptHasher {
    pub fn new(cfg: ScryptConfig) -> Self {
        Self { cfg }
    }

    fn encode(&self, password: &[u8], salt: &[u8]) -> AuthResult<Vec<u8>> {
        let signer_key = decode_b64("signer key", &self.cfg.signer_key)?;
        if signer_key.is_empty() {
            return Err(AuthError::FailedPrecondition(
                "scrypt signer key is not configured".into(),
            ));
        }
        let salt_separator = decode_b64("salt separator", &self.cfg.salt_separator)?;
        key(password, salt, &signer_key, &salt_separator, &self.cfg)
    }
}

impl Hasher for ScryptHasher {
    fn generate(&self, password: &str) -> AuthResult<HashingInstance> {
        let mut salt = vec![0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut salt);
        let hash = self.encode(password.as_bytes(), &salt)?;
        Ok(HashingInstance {
            config: HashingConfig::Scrypt(self.cfg.clone()),
            hash,
            salt: Some(salt),
        })
    }

    fn compare(&self, password: &str, instance: &HashingInstance) -> AuthResult<()> {
        let salt = instance
            .salt
            .as_deref()
            .ok_or_else(|| AuthError::Internal("scrypt hash is missing its salt".into()))?;
        let computed = self.encode(password.as_bytes(), salt)?;
        if constant_time_eq(&computed, &instance.hash) {
            Ok(())
        } else {
            Err(AuthError::Unauthenticated("wrong password".into()))
        }
    }
}

fn key(
    password: &[u8],
    salt: &[u8],
    signer_key: &[u8],
    salt_separator: &[u8],
    cfg: &ScryptConfig,
) -> AuthResult<Vec<u8>> {
    let mut full_salt = Vec::with_capacity(salt.len() + salt_separator.len());
    full_salt.extend_from_slice(salt);
    full_salt.extend_from_slice(salt_separator);

    let log_n = u8::try_from(cfg.mem_cost)
        .map_err(|_| AuthError::InvalidArgument(format!("scrypt mem cost {}", cfg.mem_cost)))?;
    let key_len = cfg.key_len as usize;
    let params = ::scrypt::Params::new(log_n, cfg.rounds, cfg.p, key_len)
        .map_err(|e| AuthError::InvalidArgument(format!("scrypt params: {e}")))?;

    let mut derived = vec![0u8; key_len];
    ::scrypt::scrypt(password, &full_salt, &params, &mut derived)
        .map_err(|e| AuthError::Internal(format!("scrypt: {e}")))?;

    let mut out = signer_key.to_vec();
    apply_keystream(&derived, &mut out)?;
    Ok(out)
}

/// XOR the AES-CTR keystream (zero IV) for `key` over `buf`.
fn apply_keystream(key: &[u8], buf: &mut [u8]) -> AuthResult<()> {
    let iv = [0u8; 16];
    let invalid = |e: ctr::cipher::InvalidLength| {
        AuthError::InvalidArgument(format!("scrypt key length: {e}"))
    };
    match key.len() {
        16 => Aes128Ctr::new_from_slices(key, &iv)
            .map_err(invalid)?
            .apply_keystream(buf),
        24 => Aes192Ctr::new_from_slices(key, &iv)
            .map_err(invalid)?
            .apply_keystream(buf),
        32 => Aes256Ctr::new_from_slices(key, &iv)
            .map_err(invalid)?
            .apply_keystream(buf),
        n => {
            return Err(AuthError::InvalidArgument(format!(
                "scrypt key length {n} is not an AES key size"
            )));
        }
    }
    Ok(())
}

fn decode_b64(what: &str, value: &str) -> AuthResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| AuthError::InvalidArgument(format!("scrypt {what}: {e}")))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
