//! Auth core configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AuthError, AuthResult};

/// Default public URL the OAuth2 callback is served under.
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:4747";

/// Fallback key for sealing stored provider credentials.
const DEFAULT_SECRET_ENCRYPTION_KEY: &str = "rig-default-dev-key-change-in-production";

/// Token signing configuration. Exactly one of `secret` or the
/// certificate/key pair must be set.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JwtConfig {
    /// Shared HMAC secret.
    pub secret: Option<String>,
    /// PEM certificate whose public key selects the signing algorithm.
    pub certificate_file: Option<PathBuf>,
    /// PEM private key matching `certificate_file`.
    pub certificate_key_file: Option<PathBuf>,
}

/// Configuration for the auth service.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    /// Public base URL; the OAuth2 callback lives at `<public_url>/oauth/callback`.
    pub public_url: String,
    /// Passphrase for sealing secrets (OAuth2 client credentials) at rest.
    pub secret_encryption_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            secret_encryption_key: DEFAULT_SECRET_ENCRYPTION_KEY.to_string(),
        }
    }
}

impl AuthConfig {
    /// Config signing with a shared secret and otherwise default values.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt: JwtConfig {
                secret: Some(secret.into()),
                ..JwtConfig::default()
            },
            ..Self::default()
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                            | Default                    |
    /// |-------------------------------------|----------------------------|
    /// | `RIG_AUTH_JWT_SECRET`               | unset                      |
    /// | `RIG_AUTH_JWT_CERTIFICATE_FILE`     | unset                      |
    /// | `RIG_AUTH_JWT_CERTIFICATE_KEY_FILE` | unset                      |
    /// | `RIG_PUBLIC_URL`                    | `http://localhost:4747`    |
    /// | `RIG_SECRET_ENCRYPTION_KEY`         | development key            |
    pub fn from_env() -> Self {
        Self {
            jwt: JwtConfig {
                secret: non_empty_env("RIG_AUTH_JWT_SECRET"),
                certificate_file: non_empty_env("RIG_AUTH_JWT_CERTIFICATE_FILE").map(PathBuf::from),
                certificate_key_file: non_empty_env("RIG_AUTH_JWT_CERTIFICATE_KEY_FILE")
                    .map(PathBuf::from),
            },
            public_url: non_empty_env("RIG_PUBLIC_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string()),
            secret_encryption_key: non_empty_env("RIG_SECRET_ENCRYPTION_KEY")
                .unwrap_or_else(|| DEFAULT_SECRET_ENCRYPTION_KEY.to_string()),
        }
    }

    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> AuthResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| AuthError::Config(format!("yaml: {e}")))
    }

    /// Load a YAML config file.
    pub fn load(path: &Path) -> AuthResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_yaml_str(&raw)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
