//! # rig_auth
//!
//! Authentication and session core for Rig: signed tokens, sessions, service
//! accounts, OAuth2 federation and coded verification flows. Storage, project
//! settings, identity providers and email delivery are supplied by the caller
//! through the traits in [`repository`], [`oauth2`] and [`gateway`].

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod hash;
pub mod models;
pub mod oauth2;
pub mod repository;
pub mod secrets;

pub use auth::AuthService;
pub use error::{AuthError, AuthResult, ErrorKind};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
