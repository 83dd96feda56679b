//! The auth service: token issuance, sessions, service accounts, federation
//! and verification flows.
//!
//! Operations on behalf of an unauthenticated caller take the project id
//! explicitly; authenticated operations take the caller's validated claims.

pub mod claims;
mod login;
mod oauth2;
pub mod password;
mod service_account;
mod session;
pub mod signing;
mod templates;
mod token;
mod verification;

use tracing::info;

pub use self::login::LoginResult;
pub use self::oauth2::OauthProvider;
pub use self::service_account::{CreatedServiceAccount, format_client_id, parse_client_id};
use self::signing::{JwtMethod, Signer};
use crate::config::AuthConfig;
use crate::error::AuthResult;
use crate::oauth2::Oauth2Providers;
use crate::repository::Stores;

/// Path of the OAuth2 callback under the public URL.
const OAUTH_CALLBACK_PATH: &str = "oauth/callback";

pub struct AuthService {
    config: AuthConfig,
    signer: Signer,
    stores: Stores,
    providers: Oauth2Providers,
}

impl AuthService {
    /// Build the service. Fails if the signing identity cannot be loaded.
    pub fn new(config: AuthConfig, stores: Stores, providers: Oauth2Providers) -> AuthResult<Self> {
        let signer = Signer::from_config(&config.jwt)?;
        info!(
            algorithm = ?signer.algorithm(),
            issuer = signer.issuer(),
            "loaded token signing identity"
        );
        Ok(Self {
            config,
            signer,
            stores,
            providers,
        })
    }

    /// Signing algorithm and verification material.
    pub fn jwt_method(&self) -> JwtMethod {
        self.signer.jwt_method()
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// URL providers redirect back to after authorization.
    pub fn oauth_callback_url(&self) -> String {
        format!(
            "{}/{OAUTH_CALLBACK_PATH}",
            self.config.public_url.trim_end_matches('/')
        )
    }
}
