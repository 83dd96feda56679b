//! Password login and self-service registration.

use tracing::info;
use uuid::Uuid;

use super::AuthService;
use super::claims::SubjectType;
use super::password::validate_password;
use crate::error::{AuthError, AuthResult};
use crate::models::auth::{AuthMethod, RegisterMethod, Token, UserIdentifier, UserUpdate};

/// Outcome of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub token: Token,
}

impl AuthService {
    /// Authenticate with an identifier and password and open a session.
    ///
    /// Projects requiring verified contact details refuse login until the
    /// email (or phone) is verified; a fresh code is sent on the way out.
    pub async fn login_user_password(
        &self,
        project_id: &str,
        identifier: UserIdentifier,
        password: &str,
    ) -> AuthResult<LoginResult> {
        let identifier = identifier.parse()?;
        self.stores.settings.get_project(project_id).await?;
        let settings = self.stores.settings.get_user_settings(project_id).await?;

        let user = self
            .stores
            .users
            .get_user_by_identifier(project_id, &identifier)
            .await?;
        let hash = self
            .stores
            .users
            .get_password(project_id, user.user_id)
            .await?;
        hash.compare(password)?;

        match &identifier {
            UserIdentifier::Email(_)
                if settings.is_verified_email_required && !user.is_email_verified =>
            {
                self.send_email_verification(project_id, &user, &settings)
                    .await?;
                return Err(AuthError::FailedPrecondition("email is not verified".into()));
            }
            UserIdentifier::PhoneNumber(_)
                if settings.is_verified_phone_required && !user.is_phone_verified =>
            {
                self.send_verification_text(project_id, &user).await?;
                return Err(AuthError::FailedPrecondition(
                    "phone number is not verified".into(),
                ));
            }
            _ => {}
        }

        let session_id = self
            .new_session(
                project_id,
                user.user_id,
                AuthMethod::LoginType(identifier.login_type()),
                &settings,
            )
            .await?;
        let token = self
            .generate_token(
                project_id,
                user.user_id,
                SubjectType::User,
                Some(session_id),
                &settings,
            )
            .await?;

        info!(project_id, user_id = %user.user_id, login_type = ?identifier.login_type(), "user logged in");
        Ok(LoginResult {
            user_id: user.user_id,
            session_id,
            token,
        })
    }

    /// Create an account with a password, then log in with it.
    pub async fn register_user_password(
        &self,
        project_id: &str,
        identifier: UserIdentifier,
        password: &str,
    ) -> AuthResult<LoginResult> {
        let identifier = identifier.parse()?;
        self.stores.settings.get_project(project_id).await?;
        let settings = self.stores.settings.get_user_settings(project_id).await?;
        if !settings.allow_register {
            return Err(AuthError::PermissionDenied(
                "registering new users is disabled".into(),
            ));
        }
        validate_password(password)?;

        let hash = settings.password_hashing.generate(password)?;
        let contact = match &identifier {
            UserIdentifier::Email(email) => UserUpdate::Email(email.clone()),
            UserIdentifier::Username(name) => UserUpdate::Username(name.clone()),
            UserIdentifier::PhoneNumber(phone) => UserUpdate::PhoneNumber(phone.clone()),
        };
        let user = self
            .stores
            .users
            .create_user(
                project_id,
                RegisterMethod::Signup(identifier.login_type()),
                vec![contact, UserUpdate::PasswordHash(hash)],
            )
            .await?;
        info!(project_id, user_id = %user.user_id, "user registered");

        self.login_user_password(project_id, identifier, password)
            .await
    }
}
