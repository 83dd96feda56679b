//! Password policy.

use crate::error::{AuthError, AuthResult};

/// Minimum number of characters.
const MIN_LENGTH: usize = 8;

/// Check a new password against the policy: no surrounding whitespace, at
/// least eight characters, at least one digit and one symbol, and only
/// letters, digits, punctuation and symbols.
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.trim() != password {
        return Err(AuthError::InvalidArgument(
            "invalid password; starts or ends with a whitespace".into(),
        ));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidArgument("invalid password; empty".into()));
    }

    let (mut digit, mut symbol, mut total) = (false, false, 0usize);
    for c in password.chars() {
        match c {
            c if c.is_alphabetic() => {}
            c if c.is_numeric() => digit = true,
            c if is_symbol(c) => symbol = true,
            _ => {
                return Err(AuthError::InvalidArgument(
                    "invalid password; contains invalid characters".into(),
                ));
            }
        }
        total += 1;
    }

    if !digit || !symbol || total < MIN_LENGTH {
        return Err(AuthError::InvalidArgument(
            "invalid password; must contain a number, normal symbol and be at least 8 chars long"
                .into(),
        ));
    }
    Ok(())
}

/// Punctuation or symbol: any printable, non-alphanumeric, non-space char.
fn is_symbol(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_strong_password() {
        assert!(validate_password("Secret123!").is_ok());
        assert!(validate_password("pässwörd1€").is_ok());
    }

    #[test]
    fn rejects_weak_passwords() {
        for bad in [
            "",
            " Secret123!",
            "Secret123! ",
            "Sec 123!abc",
            "Secret123",
            "Secret!!!",
            "Se1!",
            "tab\tsecret1!",
            "nul\0secret1!",
        ] {
            assert!(
                matches!(validate_password(bad), Err(AuthError::InvalidArgument(_))),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn letters_alone_do_not_satisfy_the_policy() {
        let err = validate_password("abcdefghij").unwrap_err();
        assert!(matches!(err, AuthError::InvalidArgument(ref m) if m.contains("must contain")));
        assert!(validate_password("abcdefgh1!").is_ok());
        assert!(validate_password("١٢٣abcde!").is_ok());
    }
}
