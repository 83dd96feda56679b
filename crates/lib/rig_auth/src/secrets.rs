//! AES-256-GCM sealing for blobs kept in the secret store.
//!
//! Sealed layout is `nonce || ciphertext || tag` with a random 12-byte nonce.
//! The key is the SHA-256 of the configured passphrase.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AuthError, AuthResult};

/// Nonce size for AES-256-GCM (12 bytes).
const NONCE_SIZE: usize = 12;
/// GCM tag size (16 bytes).
const TAG_SIZE: usize = 16;

fn cipher(passphrase: &str) -> AuthResult<Aes256Gcm> {
    let key = Sha256::digest(passphrase.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(|e| AuthError::Internal(format!("key init: {e}")))
}

/// Encrypt `plaintext` under `passphrase`.
pub fn seal(plaintext: &[u8], passphrase: &str) -> AuthResult<Vec<u8>> {
    let cipher = cipher(passphrase)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| AuthError::Internal(format!("encryption failed: {e}")))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypt a blob produced by [`seal`].
pub fn open(sealed: &[u8], passphrase: &str) -> AuthResult<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(AuthError::Internal("sealed secret too short".into()));
    }

    let cipher = cipher(passphrase)?;
    let nonce = Nonce::from_slice(&sealed[..NONCE_SIZE]);
    cipher
        .decrypt(nonce, &sealed[NONCE_SIZE..])
        .map_err(|e| AuthError::Internal(format!("decryption failed: {e}")))
}
