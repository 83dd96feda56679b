//! Token issuance, validation and refresh rotation.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::AuthService;
use super::claims::{
    AccessClaims, BaseClaims, Claims, ProjectClaims, RefreshClaims, SubjectClaims, SubjectType,
    TokenKind,
};
use crate::error::{AuthError, AuthResult};
use crate::models::auth::Token;
use crate::models::settings::UserSettings;

/// Project token lifetime: 1 hour.
const PROJECT_TOKEN_TTL_SECS: i64 = 60 * 60;

fn refresh_denied(reason: &str) -> AuthError {
    info!(reason, "refresh token rejected");
    AuthError::PermissionDenied(reason.to_string())
}

/// Maps `NotFound` to a refresh denial so a missing record is not revealed.
fn deny_missing(reason: &'static str) -> impl FnOnce(AuthError) -> AuthError {
    move |e| {
        if e.is_not_found() {
            refresh_denied(reason)
        } else {
            e
        }
    }
}

/// Whether a token issued at `iat` (unix seconds) predates the user's
/// reset-sessions marker.
fn issued_before(iat: i64, marker: Option<DateTime<Utc>>) -> bool {
    match (marker, DateTime::from_timestamp(iat, 0)) {
        (None, _) => false,
        (Some(marker), Some(issued)) => issued < marker,
        (Some(_), None) => true,
    }
}

impl AuthService {
    /// Verify an access token. Session state is not consulted.
    pub fn validate_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        self.signer.verify(token, TokenKind::Access)
    }

    pub fn validate_project_token(&self, token: &str) -> AuthResult<ProjectClaims> {
        self.signer.verify(token, TokenKind::Project)
    }

    pub fn validate_refresh_token(&self, token: &str) -> AuthResult<RefreshClaims> {
        self.signer.verify(token, TokenKind::Refresh)
    }

    /// Verify a bearer token, which may be an access or a project token.
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        match self.signer.verify_any(token)? {
            Claims::Refresh(_) => Err(AuthError::PermissionDenied("invalid token type".into())),
            claims => Ok(claims),
        }
    }

    /// Exchange a refresh token for a new pair bound to the same session.
    ///
    /// Old refresh tokens are not revoked; they stay usable until the session
    /// is deleted or the user's sessions are reset.
    pub async fn refresh_token(&self, refresh_token: &str) -> AuthResult<Token> {
        let claims = self.validate_refresh_token(refresh_token)?;
        let project_id = claims.project_id();
        let subject = claims.subject();

        match claims.subject_type() {
            SubjectType::User => {
                let session_id = claims
                    .session_id()
                    .ok_or_else(|| refresh_denied("refresh token has no session"))?;
                let mut session = self
                    .stores
                    .sessions
                    .get_session(project_id, subject, session_id)
                    .await
                    .map_err(deny_missing("session not found"))?;
                if session.is_invalidated {
                    return Err(refresh_denied("session invalidated"));
                }

                let user = self
                    .stores
                    .users
                    .get_user(project_id, subject)
                    .await
                    .map_err(deny_missing("user not found"))?;
                if issued_before(claims.base.iat, user.new_sessions_since) {
                    return Err(refresh_denied("session expired"));
                }

                let settings = self.stores.settings.get_user_settings(project_id).await?;
                let token = self
                    .generate_token(
                        project_id,
                        subject,
                        SubjectType::User,
                        Some(session_id),
                        &settings,
                    )
                    .await?;

                let now = Utc::now();
                session.renewed_at = now;
                session.expires_at = now + settings.refresh_token_ttl;
                self.stores
                    .sessions
                    .update_session(project_id, subject, session_id, session)
                    .await
                    .map_err(deny_missing("session not found"))?;

                debug!(user_id = %subject, session_id = %session_id, "session renewed");
                Ok(token)
            }
            SubjectType::ServiceAccount => {
                let (owner, _) = self
                    .stores
                    .service_accounts
                    .get_service_account(subject)
                    .await
                    .map_err(deny_missing("service account not found"))?;
                if owner != project_id {
                    return Err(refresh_denied("invalid refresh token"));
                }

                let settings = self.stores.settings.get_user_settings(project_id).await?;
                self.generate_token(
                    project_id,
                    subject,
                    SubjectType::ServiceAccount,
                    None,
                    &settings,
                )
                .await
            }
        }
    }

    /// Mint a project token letting `caller` act on `project_id`.
    pub async fn use_project(
        &self,
        caller: &dyn SubjectClaims,
        project_id: &str,
    ) -> AuthResult<String> {
        debug!(project_id, "authenticating for project");
        self.stores.settings.get_project(project_id).await?;

        let now = Utc::now();
        let claims = ProjectClaims {
            base: BaseClaims::new(
                self.signer.issuer(),
                caller.project_id(),
                caller.subject(),
                caller.subject_type(),
                None,
                TokenKind::Project,
                now,
                now + Duration::seconds(PROJECT_TOKEN_TTL_SECS),
            ),
            use_project_id: project_id.to_string(),
        };
        self.signer.sign(&claims)
    }

    /// Sign a fresh access/refresh pair. Does not touch the session record.
    pub(crate) async fn generate_token(
        &self,
        project_id: &str,
        subject: Uuid,
        subject_type: SubjectType,
        session_id: Option<Uuid>,
        settings: &UserSettings,
    ) -> AuthResult<Token> {
        let groups = self
            .stores
            .users
            .list_groups_for_member(project_id, subject)
            .await?;
        let now = Utc::now();
        let base = |kind: TokenKind, ttl: Duration| {
            BaseClaims::new(
                self.signer.issuer(),
                project_id,
                subject,
                subject_type,
                session_id,
                kind,
                now,
                now + ttl,
            )
        };

        let access = AccessClaims {
            base: base(TokenKind::Access, settings.access_token_ttl),
            groups: groups.clone(),
            metadata: Default::default(),
        };
        let refresh = RefreshClaims {
            base: base(TokenKind::Refresh, settings.refresh_token_ttl),
            groups,
        };

        Ok(Token {
            access_token: self.signer.sign(&access)?,
            refresh_token: self.signer.sign(&refresh)?,
        })
    }
}
