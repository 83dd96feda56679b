//! In-process implementations of every collaborator contract.
//!
//! Backed by `DashMap`, so each record update happens under its shard lock.
//! Nothing is persisted.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use uuid::Uuid;

use super::{
    RecordStream, SecretStore, ServiceAccountStore, SessionStore, SettingsProvider, Stores,
    UserStore, VerificationCodeStore,
};
use crate::error::{AuthError, AuthResult};
use crate::gateway::email::{EmailGateway, Message};
use crate::hash::HashingInstance;
use crate::models::auth::{
    Oauth2Link, Profile, RegisterMethod, Session, SessionEntry, User, UserIdentifier, UserInfo,
    UserUpdate, VerificationCode, VerificationType,
};
use crate::models::service_account::ServiceAccount;
use crate::models::settings::{Project, ProjectSettings, UserSettings};

fn not_found(what: &str) -> AuthError {
    AuthError::NotFound(format!("{what} not found"))
}

// =============================================================================
// Users
// =============================================================================

struct UserRecord {
    user: User,
    password: Option<HashingInstance>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<(String, Uuid), UserRecord>,
    identifiers: DashMap<(String, UserIdentifier), Uuid>,
    links: DashMap<(String, String, String), Uuid>,
    memberships: DashMap<(String, Uuid), Vec<Uuid>>,
}

impl MemoryUserStore {
    pub fn user_count(&self, project_id: &str) -> usize {
        self.users.iter().filter(|r| r.key().0 == project_id).count()
    }

    pub fn link_count(&self, project_id: &str) -> usize {
        self.links.iter().filter(|r| r.key().0 == project_id).count()
    }

    pub fn add_group_member(&self, project_id: &str, member_id: Uuid, group_id: Uuid) {
        self.memberships
            .entry((project_id.to_string(), member_id))
            .or_default()
            .push(group_id);
    }

    /// Reserve `identifier` for `user_id`. `Some(true)` if newly reserved,
    /// `Some(false)` if already held by `user_id`, `None` on conflict.
    fn claim(&self, project_id: &str, identifier: UserIdentifier, user_id: Uuid) -> Option<bool> {
        match self.identifiers.entry((project_id.to_string(), identifier)) {
            Entry::Occupied(e) => (*e.get() == user_id).then_some(false),
            Entry::Vacant(e) => {
                e.insert(user_id);
                Some(true)
            }
        }
    }

    fn claim_all(
        &self,
        project_id: &str,
        updates: &[UserUpdate],
        user_id: Uuid,
    ) -> AuthResult<()> {
        let mut claimed = Vec::new();
        for identifier in updates.iter().filter_map(identifier_of) {
            match self.claim(project_id, identifier.clone(), user_id) {
                Some(true) => claimed.push(identifier),
                Some(false) => {}
                None => {
                    for id in claimed {
                        self.identifiers.remove(&(project_id.to_string(), id));
                    }
                    return Err(AuthError::AlreadyExists(format!(
                        "user with identifier '{}' already exists",
                        identifier.as_str()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn identifier_of(update: &UserUpdate) -> Option<UserIdentifier> {
    match update {
        UserUpdate::Email(s) => Some(UserIdentifier::Email(s.clone())),
        UserUpdate::Username(s) => Some(UserIdentifier::Username(s.clone())),
        UserUpdate::PhoneNumber(s) => Some(UserIdentifier::PhoneNumber(s.clone())),
        _ => None,
    }
}

/// Apply `update`, returning an identifier the user no longer holds.
fn apply(record: &mut UserRecord, update: UserUpdate) -> Option<UserIdentifier> {
    match update {
        UserUpdate::Email(v) => record
            .user
            .info
            .email
            .replace(v.clone())
            .filter(|old| *old != v)
            .map(UserIdentifier::Email),
        UserUpdate::Username(v) => record
            .user
            .info
            .username
            .replace(v.clone())
            .filter(|old| *old != v)
            .map(UserIdentifier::Username),
        UserUpdate::PhoneNumber(v) => record
            .user
            .info
            .phone_number
            .replace(v.clone())
            .filter(|old| *old != v)
            .map(UserIdentifier::PhoneNumber),
        UserUpdate::Profile(p) => {
            record.user.profile = p;
            None
        }
        UserUpdate::EmailVerified(v) => {
            record.user.is_email_verified = v;
            None
        }
        UserUpdate::PhoneVerified(v) => {
            record.user.is_phone_verified = v;
            None
        }
        UserUpdate::PasswordHash(h) => {
            record.password = Some(h);
            None
        }
        UserUpdate::ResetSessions => {
            record.user.new_sessions_since = Some(Utc::now());
            None
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, project_id: &str, user_id: Uuid) -> AuthResult<User> {
        self.users
            .get(&(project_id.to_string(), user_id))
            .map(|r| r.user.clone())
            .ok_or_else(|| not_found("user"))
    }

    async fn get_user_by_identifier(
        &self,
        project_id: &str,
        identifier: &UserIdentifier,
    ) -> AuthResult<User> {
        let user_id = self
            .identifiers
            .get(&(project_id.to_string(), identifier.clone()))
            .map(|r| *r.value())
            .ok_or_else(|| not_found("user"))?;
        self.get_user(project_id, user_id).await
    }

    async fn get_password(&self, project_id: &str, user_id: Uuid) -> AuthResult<HashingInstance> {
        self.users
            .get(&(project_id.to_string(), user_id))
            .ok_or_else(|| not_found("user"))?
            .password
            .clone()
            .ok_or_else(|| not_found("password"))
    }

    async fn create_user(
        &self,
        project_id: &str,
        _method: RegisterMethod,
        updates: Vec<UserUpdate>,
    ) -> AuthResult<User> {
        let user_id = Uuid::new_v4();
        self.claim_all(project_id, &updates, user_id)?;

        let now = Utc::now();
        let mut record = UserRecord {
            user: User {
                user_id,
                info: UserInfo::default(),
                profile: Profile::default(),
                is_email_verified: false,
                is_phone_verified: false,
                new_sessions_since: None,
                created_at: now,
            },
            password: None,
        };
        for update in updates {
            apply(&mut record, update);
        }
        let user = record.user.clone();
        self.users.insert((project_id.to_string(), user_id), record);
        Ok(user)
    }

    async fn update_user(
        &self,
        project_id: &str,
        user_id: Uuid,
        updates: Vec<UserUpdate>,
    ) -> AuthResult<()> {
        let key = (project_id.to_string(), user_id);
        if !self.users.contains_key(&key) {
            return Err(not_found("user"));
        }
        self.claim_all(project_id, &updates, user_id)?;

        let mut released = Vec::new();
        {
            let mut record = self.users.get_mut(&key).ok_or_else(|| not_found("user"))?;
            for update in updates {
                released.extend(apply(&mut record, update));
            }
        }
        for id in released {
            self.identifiers.remove(&(project_id.to_string(), id));
        }
        Ok(())
    }

    async fn get_oauth2_link(
        &self,
        project_id: &str,
        issuer: &str,
        subject: &str,
    ) -> AuthResult<Oauth2Link> {
        let key = (project_id.to_string(), issuer.to_string(), subject.to_string());
        self.links
            .get(&key)
            .map(|r| Oauth2Link {
                issuer: issuer.to_string(),
                subject: subject.to_string(),
                user_id: *r.value(),
            })
            .ok_or_else(|| not_found("oauth2 link"))
    }

    async fn create_oauth2_link(&self, project_id: &str, link: Oauth2Link) -> AuthResult<()> {
        match self
            .links
            .entry((project_id.to_string(), link.issuer, link.subject))
        {
            Entry::Occupied(_) => Err(AuthError::AlreadyExists("oauth2 link already exists".into())),
            Entry::Vacant(e) => {
                e.insert(link.user_id);
                Ok(())
            }
        }
    }

    async fn list_groups_for_member(
        &self,
        project_id: &str,
        member_id: Uuid,
    ) -> AuthResult<Vec<Uuid>> {
        Ok(self
            .memberships
            .get(&(project_id.to_string(), member_id))
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<(String, Uuid, Uuid), Session>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(
        &self,
        project_id: &str,
        user_id: Uuid,
        session_id: Uuid,
        session: Session,
    ) -> AuthResult<()> {
        match self
            .sessions
            .entry((project_id.to_string(), user_id, session_id))
        {
            Entry::Occupied(_) => Err(AuthError::AlreadyExists("session already exists".into())),
            Entry::Vacant(e) => {
                e.insert(session);
                Ok(())
            }
        }
    }

    async fn get_session(
        &self,
        project_id: &str,
        user_id: Uuid,
        session_id: Uuid,
    ) -> AuthResult<Session> {
        self.sessions
            .get(&(project_id.to_string(), user_id, session_id))
            .map(|r| r.value().clone())
            .ok_or_else(|| not_found("session"))
    }

    async fn update_session(
        &self,
        project_id: &str,
        user_id: Uuid,
        session_id: Uuid,
        session: Session,
    ) -> AuthResult<()> {
        let mut current = self
            .sessions
            .get_mut(&(project_id.to_string(), user_id, session_id))
            .ok_or_else(|| not_found("session"))?;
        *current = session;
        Ok(())
    }

    async fn delete_session(
        &self,
        project_id: &str,
        user_id: Uuid,
        session_id: Uuid,
    ) -> AuthResult<()> {
        self.sessions
            .remove(&(project_id.to_string(), user_id, session_id))
            .map(|_| ())
            .ok_or_else(|| not_found("session"))
    }

    async fn list_sessions(
        &self,
        project_id: &str,
        user_id: Uuid,
    ) -> AuthResult<RecordStream<SessionEntry>> {
        let mut entries: Vec<SessionEntry> = self
            .sessions
            .iter()
            .filter(|r| r.key().0 == project_id && r.key().1 == user_id)
            .map(|r| SessionEntry {
                session_id: r.key().2,
                session: r.value().clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.session.created_at);
        Ok(futures::stream::iter(entries.into_iter().map(Ok)).boxed())
    }
}

// =============================================================================
// Service accounts
// =============================================================================

struct ServiceAccountRecord {
    project_id: String,
    service_account: ServiceAccount,
    secret: Option<HashingInstance>,
}

#[derive(Default)]
pub struct MemoryServiceAccountStore {
    accounts: DashMap<Uuid, ServiceAccountRecord>,
}

#[async_trait]
impl ServiceAccountStore for MemoryServiceAccountStore {
    async fn create_service_account(
        &self,
        project_id: &str,
        service_account_id: Uuid,
        service_account: ServiceAccount,
    ) -> AuthResult<()> {
        match self.accounts.entry(service_account_id) {
            Entry::Occupied(_) => Err(AuthError::AlreadyExists(
                "service account already exists".into(),
            )),
            Entry::Vacant(e) => {
                e.insert(ServiceAccountRecord {
                    project_id: project_id.to_string(),
                    service_account,
                    secret: None,
                });
                Ok(())
            }
        }
    }

    async fn get_service_account(
        &self,
        service_account_id: Uuid,
    ) -> AuthResult<(String, ServiceAccount)> {
        self.accounts
            .get(&service_account_id)
            .map(|r| (r.project_id.clone(), r.service_account.clone()))
            .ok_or_else(|| not_found("service account"))
    }

    async fn get_client_secret(&self, service_account_id: Uuid) -> AuthResult<HashingInstance> {
        self.accounts
            .get(&service_account_id)
            .ok_or_else(|| not_found("service account"))?
            .secret
            .clone()
            .ok_or_else(|| not_found("client secret"))
    }

    async fn update_client_secret(
        &self,
        service_account_id: Uuid,
        secret: HashingInstance,
    ) -> AuthResult<()> {
        let mut record = self
            .accounts
            .get_mut(&service_account_id)
            .ok_or_else(|| not_found("service account"))?;
        record.secret = Some(secret);
        Ok(())
    }

    async fn list_service_accounts(
        &self,
        project_id: &str,
    ) -> AuthResult<RecordStream<(Uuid, ServiceAccount)>> {
        let mut entries: Vec<(Uuid, ServiceAccount)> = self
            .accounts
            .iter()
            .filter(|r| r.project_id == project_id)
            .map(|r| (*r.key(), r.service_account.clone()))
            .collect();
        entries.sort_by_key(|(_, sa)| sa.created_at);
        Ok(futures::stream::iter(entries.into_iter().map(Ok)).boxed())
    }

    async fn delete_service_account(&self, service_account_id: Uuid) -> AuthResult<()> {
        self.accounts
            .remove(&service_account_id)
            .map(|_| ())
            .ok_or_else(|| not_found("service account"))
    }
}

// =============================================================================
// Secrets
// =============================================================================

#[derive(Default)]
pub struct MemorySecretStore {
    secrets: DashMap<(String, Uuid), Vec<u8>>,
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn create_secret(
        &self,
        project_id: &str,
        secret_id: Uuid,
        blob: Vec<u8>,
    ) -> AuthResult<()> {
        match self.secrets.entry((project_id.to_string(), secret_id)) {
            Entry::Occupied(_) => Err(AuthError::AlreadyExists("secret already exists".into())),
            Entry::Vacant(e) => {
                e.insert(blob);
                Ok(())
            }
        }
    }

    async fn get_secret(&self, project_id: &str, secret_id: Uuid) -> AuthResult<Vec<u8>> {
        self.secrets
            .get(&(project_id.to_string(), secret_id))
            .map(|r| r.value().clone())
            .ok_or_else(|| not_found("secret"))
    }

    async fn update_secret(
        &self,
        project_id: &str,
        secret_id: Uuid,
        blob: Vec<u8>,
    ) -> AuthResult<()> {
        let mut current = self
            .secrets
            .get_mut(&(project_id.to_string(), secret_id))
            .ok_or_else(|| not_found("secret"))?;
        *current = blob;
        Ok(())
    }

    async fn delete_secret(&self, project_id: &str, secret_id: Uuid) -> AuthResult<()> {
        self.secrets
            .remove(&(project_id.to_string(), secret_id))
            .map(|_| ())
            .ok_or_else(|| not_found("secret"))
    }
}

// =============================================================================
// Verification codes
// =============================================================================

#[derive(Default)]
pub struct MemoryVerificationCodeStore {
    codes: DashMap<(String, Uuid, VerificationType), VerificationCode>,
}

impl MemoryVerificationCodeStore {
    pub fn code_count(&self, project_id: &str) -> usize {
        self.codes.iter().filter(|r| r.key().0 == project_id).count()
    }
}

#[async_trait]
impl VerificationCodeStore for MemoryVerificationCodeStore {
    async fn create_verification_code(
        &self,
        project_id: &str,
        code: VerificationCode,
    ) -> AuthResult<()> {
        self.codes
            .insert((project_id.to_string(), code.user_id, code.kind), code);
        Ok(())
    }

    async fn get_verification_code(
        &self,
        project_id: &str,
        user_id: Uuid,
        kind: VerificationType,
    ) -> AuthResult<VerificationCode> {
        self.codes
            .get(&(project_id.to_string(), user_id, kind))
            .map(|r| r.value().clone())
            .ok_or_else(|| not_found("verification code"))
    }

    async fn delete_verification_code(
        &self,
        project_id: &str,
        user_id: Uuid,
        kind: VerificationType,
    ) -> AuthResult<()> {
        self.codes
            .remove(&(project_id.to_string(), user_id, kind))
            .map(|_| ())
            .ok_or_else(|| not_found("verification code"))
    }
}

// =============================================================================
// Settings
// =============================================================================

struct ProjectRecord {
    project: Project,
    user_settings: UserSettings,
    project_settings: ProjectSettings,
    email: Option<Arc<dyn EmailGateway>>,
}

#[derive(Default)]
pub struct MemorySettings {
    projects: DashMap<String, ProjectRecord>,
}

impl MemorySettings {
    /// Register a project with default settings and no email delivery.
    pub fn add_project(&self, project_id: &str, name: &str) {
        self.projects.insert(
            project_id.to_string(),
            ProjectRecord {
                project: Project {
                    project_id: project_id.to_string(),
                    name: name.to_string(),
                    created_at: Utc::now(),
                },
                user_settings: UserSettings::default(),
                project_settings: ProjectSettings::default(),
                email: None,
            },
        );
    }

    pub fn update_user_settings(
        &self,
        project_id: &str,
        f: impl FnOnce(&mut UserSettings),
    ) -> AuthResult<()> {
        let mut record = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| not_found("project"))?;
        f(&mut record.user_settings);
        Ok(())
    }

    pub fn set_project_settings(&self, project_id: &str, settings: ProjectSettings) -> AuthResult<()> {
        let mut record = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| not_found("project"))?;
        record.project_settings = settings;
        Ok(())
    }

    pub fn set_email_provider(
        &self,
        project_id: &str,
        gateway: Arc<dyn EmailGateway>,
    ) -> AuthResult<()> {
        let mut record = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| not_found("project"))?;
        record.email = Some(gateway);
        Ok(())
    }
}

#[async_trait]
impl SettingsProvider for MemorySettings {
    async fn get_project(&self, project_id: &str) -> AuthResult<Project> {
        self.projects
            .get(project_id)
            .map(|r| r.project.clone())
            .ok_or_else(|| not_found("project"))
    }

    async fn get_user_settings(&self, project_id: &str) -> AuthResult<UserSettings> {
        self.projects
            .get(project_id)
            .map(|r| r.user_settings.clone())
            .ok_or_else(|| not_found("project"))
    }

    async fn get_project_settings(&self, project_id: &str) -> AuthResult<ProjectSettings> {
        self.projects
            .get(project_id)
            .map(|r| r.project_settings.clone())
            .ok_or_else(|| not_found("project"))
    }

    async fn get_email_provider(&self, project_id: &str) -> AuthResult<Arc<dyn EmailGateway>> {
        self.projects
            .get(project_id)
            .ok_or_else(|| not_found("project"))?
            .email
            .clone()
            .ok_or_else(|| not_found("email provider"))
    }
}

// =============================================================================
// Email
// =============================================================================

/// Records every message instead of delivering it.
#[derive(Default)]
pub struct CapturingEmailGateway {
    sent: Mutex<Vec<Message>>,
}

impl CapturingEmailGateway {
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailGateway for CapturingEmailGateway {
    async fn send(&self, msg: &Message) -> AuthResult<()> {
        self.sent
            .lock()
            .map_err(|_| AuthError::Internal("email outbox lock poisoned".into()))?
            .push(msg.clone());
        Ok(())
    }
}

// =============================================================================
// Backend
// =============================================================================

/// All in-memory stores, kept typed so callers can seed and inspect them.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    pub users: Arc<MemoryUserStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub service_accounts: Arc<MemoryServiceAccountStore>,
    pub secrets: Arc<MemorySecretStore>,
    pub verification_codes: Arc<MemoryVerificationCodeStore>,
    pub settings: Arc<MemorySettings>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stores(&self) -> Stores {
        Stores {
            users: self.users.clone(),
            sessions: self.sessions.clone(),
            service_accounts: self.service_accounts.clone(),
            secrets: self.secrets.clone(),
            verification_codes: self.verification_codes.clone(),
            settings: self.settings.clone(),
        }
    }
}
