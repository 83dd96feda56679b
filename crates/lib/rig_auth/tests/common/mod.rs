//! Shared fixtures: an auth service over in-memory stores with one project.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use rig_auth::config::AuthConfig;
use rig_auth::hash::{BcryptConfig, HashingConfig};
use rig_auth::models::auth::{Oauth2Claims, UserIdentifier};
use rig_auth::models::settings::UserSettings;
use rig_auth::oauth2::{Endpoint, Oauth2Providers, Provider, ProviderCredentials, ProviderType};
use rig_auth::repository::memory::{CapturingEmailGateway, MemoryBackend};
use rig_auth::{AuthError, AuthResult, AuthService};
use tracing_subscriber::EnvFilter;

pub const PROJECT: &str = "proj";
pub const PASSWORD: &str = "Secret123!";
pub const PROVIDER_ISSUER: &str = "https://accounts.example.com";

pub struct Harness {
    pub backend: MemoryBackend,
    pub outbox: Arc<CapturingEmailGateway>,
    pub service: AuthService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|_| {})
    }

    /// Build with extra tweaks to the project's user settings.
    pub fn with(tweak: impl FnOnce(&mut UserSettings)) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let backend = MemoryBackend::new();
        backend.settings.add_project(PROJECT, "Project");
        backend
            .settings
            .update_user_settings(PROJECT, |s| {
                s.password_hashing = HashingConfig::Bcrypt(BcryptConfig { cost: 4 });
                tweak(s);
            })
            .unwrap();

        let outbox = Arc::new(CapturingEmailGateway::default());
        backend
            .settings
            .set_email_provider(PROJECT, outbox.clone())
            .unwrap();

        let service = AuthService::new(
            AuthConfig::with_secret("integration-secret"),
            backend.stores(),
            Oauth2Providers::new().with(Arc::new(FakeProvider)),
        )
        .unwrap();

        Self {
            backend,
            outbox,
            service,
        }
    }

    /// Harness whose project does not require verified emails.
    pub fn unverified() -> Self {
        Self::with(|s| s.is_verified_email_required = false)
    }
}

pub fn email(addr: &str) -> UserIdentifier {
    UserIdentifier::Email(addr.to_string())
}

/// The numeric code in the last message sent.
pub fn last_code(outbox: &CapturingEmailGateway) -> String {
    let sent = outbox.sent();
    let body = &sent.last().expect("no email sent").html_part;
    let digits: String = body
        .trim_end_matches("</p>")
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.chars().rev().collect()
}

/// Provider that trusts the code: `code` becomes the subject and
/// `<code>@example.com` the email.
pub struct FakeProvider;

#[async_trait]
impl Provider for FakeProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Google
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint {
            auth_url: "https://accounts.example.com/o/oauth2/auth".into(),
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
        }
    }

    async fn validate(
        &self,
        creds: &ProviderCredentials,
        code: &str,
        _redirect_url: &str,
    ) -> AuthResult<Oauth2Claims> {
        if creds.client_secret != "google-secret" {
            return Err(AuthError::Unauthenticated("bad client secret".into()));
        }
        Ok(claims_for(code))
    }

    async fn test(&self, creds: &ProviderCredentials, _redirect_url: &str) -> AuthResult<()> {
        if creds.client_id.is_empty() {
            return Err(AuthError::InvalidArgument("missing client id".into()));
        }
        Ok(())
    }
}

pub fn claims_for(subject: &str) -> Oauth2Claims {
    Oauth2Claims {
        issuer: PROVIDER_ISSUER.into(),
        subject: subject.into(),
        email: Some(format!("{subject}@example.com")),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        image_url: None,
    }
}

pub fn google_creds() -> ProviderCredentials {
    ProviderCredentials {
        client_id: "google-client".into(),
        client_secret: "google-secret".into(),
    }
}
