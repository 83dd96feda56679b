//! OAuth2 provider seam, callback state envelope and stored credentials.
//!
//! Concrete providers perform the code exchange against Google, GitHub or
//! Facebook; the auth core only needs the [`Provider`] trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::crypto::generate_alphanumeric;
use crate::error::{AuthError, AuthResult};
use crate::models::auth::Oauth2Claims;
use crate::secrets;

pub use crate::models::auth::ProviderType;

/// Length of the random nonce embedded in the state.
const STATE_NONCE_LENGTH: usize = 15;

/// Provider authorization endpoint and the scopes requested there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub auth_url: String,
    pub scopes: Vec<String>,
}

/// Client credentials registered with a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ProviderCredentials {
    /// Serialize and encrypt for the secret store.
    pub fn seal(&self, passphrase: &str) -> AuthResult<Vec<u8>> {
        let raw = serde_json::to_vec(self)?;
        secrets::seal(&raw, passphrase)
    }

    pub fn open(sealed: &[u8], passphrase: &str) -> AuthResult<Self> {
        let raw = secrets::open(sealed, passphrase)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// State carried through the provider round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct State {
    pub rand: String,
    #[serde(rename = "ProjectID")]
    pub project_id: String,
    pub app_redirect: String,
    pub provider_type: ProviderType,
}

impl State {
    pub fn new(project_id: &str, app_redirect: &str, provider_type: ProviderType) -> Self {
        Self {
            rand: generate_alphanumeric(STATE_NONCE_LENGTH),
            project_id: project_id.to_string(),
            app_redirect: app_redirect.to_string(),
            provider_type,
        }
    }

    /// Base64 (standard alphabet) of the JSON form.
    pub fn encode(&self) -> AuthResult<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(state: &str) -> AuthResult<Self> {
        let raw = STANDARD
            .decode(state)
            .map_err(|e| AuthError::InvalidArgument(format!("invalid oauth2 state: {e}")))?;
        serde_json::from_slice(&raw)
            .map_err(|e| AuthError::InvalidArgument(format!("invalid oauth2 state: {e}")))
    }
}

/// A federated identity provider.
#[async_trait]
pub trait Provider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    fn endpoint(&self) -> Endpoint;

    /// Exchange `code` and return the identity the provider asserts.
    async fn validate(
        &self,
        creds: &ProviderCredentials,
        code: &str,
        redirect_url: &str,
    ) -> AuthResult<Oauth2Claims>;

    /// Check that `creds` are accepted by the provider.
    async fn test(&self, creds: &ProviderCredentials, redirect_url: &str) -> AuthResult<()>;

    /// Authorization URL sending the user to the provider and back to
    /// `redirect_url`, carrying `app_redirect` in the state.
    fn redirect_url(
        &self,
        redirect_url: &str,
        app_redirect: &str,
        project_id: &str,
        creds: &ProviderCredentials,
    ) -> AuthResult<String> {
        if redirect_url.is_empty() {
            return Err(AuthError::InvalidArgument("missing required redirect url".into()));
        }
        if creds.client_id.is_empty() || creds.client_secret.is_empty() {
            return Err(AuthError::FailedPrecondition(format!(
                "{} credentials are incomplete",
                self.provider_type()
            )));
        }

        let state = State::new(project_id, app_redirect, self.provider_type()).encode()?;
        let endpoint = self.endpoint();
        let mut url = Url::parse(&endpoint.auth_url)
            .map_err(|e| AuthError::Internal(format!("invalid auth url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &creds.client_id)
            .append_pair("redirect_uri", redirect_url)
            .append_pair("scope", &endpoint.scopes.join(" "))
            .append_pair("state", &state);

        debug!(provider = %self.provider_type(), "built oauth2 redirect url");
        Ok(url.into())
    }
}

/// The configured providers, keyed by type.
#[derive(Clone, Default)]
pub struct Oauth2Providers {
    providers: BTreeMap<ProviderType, Arc<dyn Provider>>,
}

impl Oauth2Providers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(provider.provider_type(), provider);
        self
    }

    pub fn get(&self, provider_type: ProviderType) -> AuthResult<Arc<dyn Provider>> {
        self.providers
            .get(&provider_type)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(format!("oauth2 provider {provider_type} not configured")))
    }
}
