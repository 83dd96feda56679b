//! Per-project settings consumed by the auth core.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::ProviderType;
use crate::hash::HashingConfig;

/// Access token lifetime: 1 hour.
const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Refresh token and session lifetime: 7 days.
const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Verification and reset code lifetime: 10 minutes.
const DEFAULT_VERIFICATION_CODE_TTL_SECS: i64 = 10 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Authentication behaviour for a project's users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    pub allow_register: bool,
    pub is_verified_email_required: bool,
    pub is_verified_phone_required: bool,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub verification_code_ttl: Duration,
    pub password_hashing: HashingConfig,
    pub oauth_settings: OauthSettings,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            allow_register: true,
            is_verified_email_required: true,
            is_verified_phone_required: false,
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::seconds(DEFAULT_REFRESH_TOKEN_TTL_SECS),
            verification_code_ttl: Duration::seconds(DEFAULT_VERIFICATION_CODE_TTL_SECS),
            password_hashing: HashingConfig::default(),
            oauth_settings: OauthSettings::default(),
        }
    }
}

/// Federation settings for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OauthSettings {
    /// Application redirect targets a callback may hand tokens to.
    pub callback_urls: Vec<String>,
    pub providers: BTreeMap<ProviderType, OauthProviderSettings>,
}

impl OauthSettings {
    /// Settings for `provider`, or the disabled default.
    pub fn provider(&self, provider: ProviderType) -> OauthProviderSettings {
        self.providers.get(&provider).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OauthProviderSettings {
    pub client_id: String,
    /// Secret-store id of the sealed client credentials.
    pub secret_id: Option<Uuid>,
    pub allow_login: bool,
    pub allow_register: bool,
}

/// An email subject/body pair with `{{ .Code }}`-style placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Templates {
    pub verify_email: Option<EmailTemplate>,
    pub reset_password_email: Option<EmailTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub templates: Templates,
}
