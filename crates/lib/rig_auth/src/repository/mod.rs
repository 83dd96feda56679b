//! Storage and settings contracts the auth core depends on.
//!
//! Implementations report a missing record as [`AuthError::NotFound`] and a
//! uniqueness conflict as [`AuthError::AlreadyExists`]; the core relies on
//! those kinds to make its decisions. Updates must be atomic per key: one
//! session id, one (user, purpose) verification code.
//!
//! [`AuthError::NotFound`]: crate::error::AuthError::NotFound
//! [`AuthError::AlreadyExists`]: crate::error::AuthError::AlreadyExists

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::AuthResult;
use crate::gateway::email::EmailGateway;
use crate::hash::HashingInstance;
use crate::models::auth::{
    Oauth2Link, RegisterMethod, Session, SessionEntry, User, UserIdentifier, UserUpdate,
    VerificationCode, VerificationType,
};
use crate::models::service_account::ServiceAccount;
use crate::models::settings::{Project, ProjectSettings, UserSettings};

/// Stream of records returned by list operations.
pub type RecordStream<T> = BoxStream<'static, AuthResult<T>>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, project_id: &str, user_id: Uuid) -> AuthResult<User>;

    async fn get_user_by_identifier(
        &self,
        project_id: &str,
        identifier: &UserIdentifier,
    ) -> AuthResult<User>;

    /// The stored password hash. `NotFound` when the user has none.
    async fn get_password(&self, project_id: &str, user_id: Uuid) -> AuthResult<HashingInstance>;

    /// Create a user. Identifiers set by `updates` must be unique.
    async fn create_user(
        &self,
        project_id: &str,
        method: RegisterMethod,
        updates: Vec<UserUpdate>,
    ) -> AuthResult<User>;

    async fn update_user(
        &self,
        project_id: &str,
        user_id: Uuid,
        updates: Vec<UserUpdate>,
    ) -> AuthResult<()>;

    async fn get_oauth2_link(
        &self,
        project_id: &str,
        issuer: &str,
        subject: &str,
    ) -> AuthResult<Oauth2Link>;

    /// `AlreadyExists` if (issuer, subject) is linked already.
    async fn create_oauth2_link(&self, project_id: &str, link: Oauth2Link) -> AuthResult<()>;

    /// Groups a user or service account belongs to, embedded in its tokens.
    async fn list_groups_for_member(
        &self,
        project_id: &str,
        member_id: Uuid,
    ) -> AuthResult<Vec<Uuid>> {
        let _ = (project_id, member_id);
        Ok(Vec::new())
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(
        &self,
        project_id: &str,
        user_id: Uuid,
        session_id: Uuid,
        session: Session,
    ) -> AuthResult<()>;

    async fn get_session(
        &self,
        project_id: &str,
        user_id: Uuid,
        session_id: Uuid,
    ) -> AuthResult<Session>;

    async fn update_session(
        &self,
        project_id: &str,
        user_id: Uuid,
        session_id: Uuid,
        session: Session,
    ) -> AuthResult<()>;

    async fn delete_session(&self, project_id: &str, user_id: Uuid, session_id: Uuid)
    -> AuthResult<()>;

    async fn list_sessions(
        &self,
        project_id: &str,
        user_id: Uuid,
    ) -> AuthResult<RecordStream<SessionEntry>>;
}

#[async_trait]
pub trait ServiceAccountStore: Send + Sync {
    async fn create_service_account(
        &self,
        project_id: &str,
        service_account_id: Uuid,
        service_account: ServiceAccount,
    ) -> AuthResult<()>;

    /// The account together with the project that owns it.
    async fn get_service_account(
        &self,
        service_account_id: Uuid,
    ) -> AuthResult<(String, ServiceAccount)>;

    async fn get_client_secret(&self, service_account_id: Uuid) -> AuthResult<HashingInstance>;

    async fn update_client_secret(
        &self,
        service_account_id: Uuid,
        secret: HashingInstance,
    ) -> AuthResult<()>;

    async fn list_service_accounts(
        &self,
        project_id: &str,
    ) -> AuthResult<RecordStream<(Uuid, ServiceAccount)>>;

    async fn delete_service_account(&self, service_account_id: Uuid) -> AuthResult<()>;
}

/// Opaque blobs, sealed by the caller.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn create_secret(&self, project_id: &str, secret_id: Uuid, blob: Vec<u8>)
    -> AuthResult<()>;

    async fn get_secret(&self, project_id: &str, secret_id: Uuid) -> AuthResult<Vec<u8>>;

    async fn update_secret(&self, project_id: &str, secret_id: Uuid, blob: Vec<u8>)
    -> AuthResult<()>;

    async fn delete_secret(&self, project_id: &str, secret_id: Uuid) -> AuthResult<()>;
}

#[async_trait]
pub trait VerificationCodeStore: Send + Sync {
    /// Store `code`, replacing any code for the same (user, purpose).
    async fn create_verification_code(
        &self,
        project_id: &str,
        code: VerificationCode,
    ) -> AuthResult<()>;

    async fn get_verification_code(
        &self,
        project_id: &str,
        user_id: Uuid,
        kind: VerificationType,
    ) -> AuthResult<VerificationCode>;

    async fn delete_verification_code(
        &self,
        project_id: &str,
        user_id: Uuid,
        kind: VerificationType,
    ) -> AuthResult<()>;
}

/// Project lookup and per-project settings.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn get_project(&self, project_id: &str) -> AuthResult<Project>;

    async fn get_user_settings(&self, project_id: &str) -> AuthResult<UserSettings>;

    async fn get_project_settings(&self, project_id: &str) -> AuthResult<ProjectSettings>;

    /// `NotFound` when the project has no email delivery configured.
    async fn get_email_provider(&self, project_id: &str) -> AuthResult<Arc<dyn EmailGateway>>;
}

/// The collaborators an [`AuthService`](crate::AuthService) is built from.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub service_accounts: Arc<dyn ServiceAccountStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub verification_codes: Arc<dyn VerificationCodeStore>,
    pub settings: Arc<dyn SettingsProvider>,
}
