//! Random value generation for codes, nonces and client secrets.

use std::fmt::Write;

use rand::distr::Alphanumeric;
use rand::{Rng, RngCore, rng};

/// Length of verification and reset codes.
pub const CODE_LENGTH: usize = 6;

/// Raw bytes of entropy in a service-account client secret.
const CLIENT_SECRET_BYTES: usize = 32;

/// Generate a numeric code of `len` digits.
pub fn generate_numeric_code(len: usize) -> String {
    let mut r = rng();
    (0..len)
        .map(|_| char::from(b'0' + r.random_range(0..10u8)))
        .collect()
}

/// Generate a random alphanumeric string of `len` chars.
pub fn generate_alphanumeric(len: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a client secret: `secret_` followed by 64 hex chars.
pub fn generate_client_secret() -> String {
    let mut raw = [0u8; CLIENT_SECRET_BYTES];
    rng().fill_bytes(&mut raw);
    let mut secret = String::with_capacity(7 + CLIENT_SECRET_BYTES * 2);
    secret.push_str("secret_");
    for b in raw {
        // Writing to a String cannot fail.
        let _ = write!(secret, "{b:02x}");
    }
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_code_has_only_digits() {
        let code = generate_numeric_code(CODE_LENGTH);
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn alphanumeric_is_unique() {
        let a = generate_alphanumeric(15);
        let b = generate_alphanumeric(15);
        assert_eq!(a.len(), 15);
        assert_ne!(a, b);
    }

    #[test]
    fn client_secret_shape() {
        let s = generate_client_secret();
        let hex = s.strip_prefix("secret_").unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
