//! Users, sessions, federation links and verification codes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::hash::HashingInstance;

// =============================================================================
// Users
// =============================================================================

/// Identifiers a user can log in with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub info: UserInfo,
    pub profile: Profile,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    /// Refresh tokens issued before this instant are rejected. Unset until
    /// the user's sessions are first reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_sessions_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Full name if the profile has one, else the first identifier set.
    pub fn display_name(&self) -> String {
        let first = self.profile.first_name.trim();
        let last = self.profile.last_name.trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{first} {last}"),
            (false, true) => first.to_string(),
            _ => self.identifier(),
        }
    }

    /// Username, then email, then phone number.
    pub fn identifier(&self) -> String {
        self.info
            .username
            .clone()
            .or_else(|| self.info.email.clone())
            .or_else(|| self.info.phone_number.clone())
            .unwrap_or_default()
    }
}

/// How a caller names an account at login.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIdentifier {
    Email(String),
    Username(String),
    PhoneNumber(String),
}

impl UserIdentifier {
    /// Normalise and check the identifier's format.
    ///
    /// Emails are lowercased and need a local part and a dotted domain; phone
    /// numbers must be E.164 (`+` then 7 to 15 digits); usernames are
    /// trimmed and must be non-empty.
    pub fn parse(self) -> AuthResult<Self> {
        match self {
            UserIdentifier::Email(email) => {
                let email = email.trim().to_lowercase();
                let valid = match email.split_once('@') {
                    Some((local, domain)) => {
                        !local.is_empty()
                            && !domain.contains('@')
                            && domain.contains('.')
                            && !domain.starts_with('.')
                            && !domain.ends_with('.')
                    }
                    None => false,
                };
                if !valid {
                    return Err(AuthError::InvalidArgument(format!(
                        "invalid email address '{email}'"
                    )));
                }
                Ok(UserIdentifier::Email(email))
            }
            UserIdentifier::PhoneNumber(phone) => {
                let phone: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
                let digits = phone.strip_prefix('+').unwrap_or_default();
                if !(7..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit())
                {
                    return Err(AuthError::InvalidArgument(format!(
                        "invalid phone number '{phone}'"
                    )));
                }
                Ok(UserIdentifier::PhoneNumber(phone))
            }
            UserIdentifier::Username(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(AuthError::InvalidArgument("empty username".into()));
                }
                Ok(UserIdentifier::Username(name))
            }
        }
    }

    pub fn login_type(&self) -> LoginType {
        match self {
            UserIdentifier::Email(_) => LoginType::EmailPassword,
            UserIdentifier::Username(_) => LoginType::UsernamePassword,
            UserIdentifier::PhoneNumber(_) => LoginType::PhonePassword,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UserIdentifier::Email(s) | UserIdentifier::Username(s) | UserIdentifier::PhoneNumber(s) => s,
        }
    }
}

/// A single change applied to a stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserUpdate {
    Email(String),
    Username(String),
    PhoneNumber(String),
    Profile(Profile),
    EmailVerified(bool),
    PhoneVerified(bool),
    PasswordHash(HashingInstance),
    /// Advance the reset-sessions marker to now.
    ResetSessions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginType {
    EmailPassword,
    UsernamePassword,
    PhonePassword,
}

/// External identity providers supported for federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Google,
    Github,
    Facebook,
}

impl ProviderType {
    pub const ALL: [ProviderType; 3] = [
        ProviderType::Google,
        ProviderType::Github,
        ProviderType::Facebook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Google => "google",
            ProviderType::Github => "github",
            ProviderType::Facebook => "facebook",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an account came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterMethod {
    Signup(LoginType),
    Oauth2(ProviderType),
}

// =============================================================================
// Sessions
// =============================================================================

/// How a session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    LoginType(LoginType),
    Oauth2Provider(ProviderType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub auth_method: AuthMethod,
    pub created_at: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_invalidated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub session_id: Uuid,
    pub session: Session,
}

/// A signed access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
}

// =============================================================================
// Federation
// =============================================================================

/// Maps an external identity to a local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oauth2Link {
    pub issuer: String,
    pub subject: String,
    pub user_id: Uuid,
}

/// Identity asserted by an external provider after a code exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oauth2Claims {
    pub issuer: String,
    pub subject: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub image_url: Option<String>,
}

// =============================================================================
// Verification codes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    Email,
    Phone,
    ResetPassword,
}

/// A hashed one-time code for a single (user, purpose).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationCode {
    pub user_id: Uuid,
    pub kind: VerificationType,
    pub code: HashingInstance,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// Authors
// =============================================================================

/// The principal behind a mutation, for audit fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Author {
    User { id: Uuid, name: String },
    ServiceAccount { id: Uuid, name: String },
    System,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::User { name, .. } | Author::ServiceAccount { name, .. } => f.write_str(name),
            Author::System => f.write_str("system"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_identifier_is_normalised() {
        let id = UserIdentifier::Email("  A@B.com ".into()).parse().unwrap();
        assert_eq!(id, UserIdentifier::Email("a@b.com".into()));
        assert_eq!(id.login_type(), LoginType::EmailPassword);
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        for bad in [
            UserIdentifier::Email("no-at-sign".into()),
            UserIdentifier::Email("@b.com".into()),
            UserIdentifier::Email("a@b".into()),
            UserIdentifier::Email("a@b@c.com".into()),
            UserIdentifier::PhoneNumber("12345678".into()),
            UserIdentifier::PhoneNumber("+12ab5678".into()),
            UserIdentifier::Username("   ".into()),
        ] {
            let err = bad.clone().parse().unwrap_err();
            assert!(matches!(err, AuthError::InvalidArgument(_)), "{bad:?}");
        }
    }

    #[test]
    fn phone_identifier_strips_spaces() {
        let id = UserIdentifier::PhoneNumber("+45 12 34 56 78".into())
            .parse()
            .unwrap();
        assert_eq!(id.as_str(), "+4512345678");
    }

    #[test]
    fn display_name_falls_back_to_identifier() {
        let now = Utc::now();
        let mut user = User {
            user_id: Uuid::new_v4(),
            info: UserInfo {
                email: Some("alice@example.com".into()),
                username: None,
                phone_number: None,
            },
            profile: Profile::default(),
            is_email_verified: false,
            is_phone_verified: false,
            new_sessions_since: None,
            created_at: now,
        };
        assert_eq!(user.display_name(), "alice@example.com");

        user.info.username = Some("alice".into());
        assert_eq!(user.identifier(), "alice");

        user.profile.first_name = "Alice".into();
        user.profile.last_name = "Liddell".into();
        assert_eq!(user.display_name(), "Alice Liddell");
    }

    #[test]
    fn author_display() {
        assert_eq!(Author::System.to_string(), "system");
        let a = Author::ServiceAccount {
            id: Uuid::new_v4(),
            name: "ci-bot".into(),
        };
        assert_eq!(a.to_string(), "ci-bot");
    }
}
