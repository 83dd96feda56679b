use chrono::Utc;
use futures::TryStreamExt;
use tracing::info;
use uuid::Uuid;

use super::AuthService;
use super::claims::SubjectClaims;
use crate::error::{AuthError, AuthResult};
use crate::models::auth::{AuthMethod, Session, SessionEntry};
use crate::models::settings::UserSettings;

impl AuthService {
    /// Record a new session for `user_id` and return its id.
    pub(crate) async fn new_session(
        &self,
        project_id: &str,
        user_id: Uuid,
        auth_method: AuthMethod,
        settings: &UserSettings,
    ) -> AuthResult<Uuid> {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let session = Session {
            auth_method,
            created_at: now,
            renewed_at: now,
            expires_at: now + settings.refresh_token_ttl,
            is_invalidated: false,
        };
        self.stores
            .sessions
            .create_session(project_id, user_id, session_id, session)
            .await?;
        info!(user_id = %user_id, session_id = %session_id, "session created");
        Ok(session_id)
    }

    /// End the caller's session. Tokens without a session cannot log out.
    pub async fn logout(&self, caller: &dyn SubjectClaims) -> AuthResult<()> {
        let session_id = caller
            .session_id()
            .ok_or_else(|| AuthError::InvalidArgument("no session id in token".into()))?;

        match self
            .stores
            .sessions
            .delete_session(caller.project_id(), caller.subject(), session_id)
            .await
        {
            Ok(()) => {
                info!(user_id = %caller.subject(), session_id = %session_id, "session deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Sessions of `user_id` in the caller's project, oldest first.
    pub async fn list_sessions(
        &self,
        caller: &dyn SubjectClaims,
        user_id: Uuid,
    ) -> AuthResult<Vec<SessionEntry>> {
        self.stores
            .sessions
            .list_sessions(caller.project_id(), user_id)
            .await?
            .try_collect()
            .await
    }
}
