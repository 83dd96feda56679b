//! Coded proofs: email verification and password reset.
//!
//! A code is stored hashed per (user, purpose). While an unexpired code is on
//! file a new send does nothing, so repeated requests never rotate the code
//! the user is about to type in.

use chrono::Utc;
use tracing::{info, warn};

use super::AuthService;
use super::password::validate_password;
use super::templates;
use crate::crypto::{CODE_LENGTH, generate_numeric_code};
use crate::error::{AuthError, AuthResult};
use crate::gateway::email::{Message, Recipient};
use crate::models::auth::{User, UserIdentifier, UserUpdate, VerificationCode, VerificationType};
use crate::models::settings::{EmailTemplate, UserSettings};

impl AuthService {
    /// Send (or keep) an email verification code for the account owning `email`.
    pub async fn send_verification_email(&self, project_id: &str, email: &str) -> AuthResult<()> {
        let identifier = UserIdentifier::Email(email.to_string()).parse()?;
        let user = self
            .stores
            .users
            .get_user_by_identifier(project_id, &identifier)
            .await?;
        let settings = self.stores.settings.get_user_settings(project_id).await?;
        self.send_email_verification(project_id, &user, &settings)
            .await
    }

    /// Mark the email verified if `code` matches the code on file.
    pub async fn verify_email(&self, project_id: &str, email: &str, code: &str) -> AuthResult<()> {
        let identifier = UserIdentifier::Email(email.to_string()).parse()?;
        let user = self
            .stores
            .users
            .get_user_by_identifier(project_id, &identifier)
            .await?;

        let stored = self
            .live_code(project_id, &user, VerificationType::Email)
            .await?;
        stored.code.compare(code)?;

        self.stores
            .users
            .update_user(project_id, user.user_id, vec![UserUpdate::EmailVerified(true)])
            .await?;
        self.stores
            .verification_codes
            .delete_verification_code(project_id, user.user_id, VerificationType::Email)
            .await?;

        info!(project_id, user_id = %user.user_id, "email verified");
        Ok(())
    }

    /// Email a password-reset code to the account behind `identifier`.
    pub async fn send_password_reset(
        &self,
        project_id: &str,
        identifier: UserIdentifier,
    ) -> AuthResult<()> {
        let identifier = identifier.parse()?;
        let user = self
            .stores
            .users
            .get_user_by_identifier(project_id, &identifier)
            .await?;
        let Some(email) = user.info.email.clone() else {
            return Err(AuthError::FailedPrecondition(
                "user has no email address".into(),
            ));
        };
        let settings = self.stores.settings.get_user_settings(project_id).await?;

        let template = self
            .stores
            .settings
            .get_project_settings(project_id)
            .await?
            .templates
            .reset_password_email
            .unwrap_or_else(templates::default_reset_password);
        self.send_code(
            project_id,
            &user,
            &email,
            VerificationType::ResetPassword,
            &template,
            &settings,
        )
        .await
    }

    /// Replace the password using a reset code. Every existing session of the
    /// user stops refreshing.
    pub async fn reset_password(
        &self,
        project_id: &str,
        identifier: UserIdentifier,
        code: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let identifier = identifier.parse()?;
        let user = self
            .stores
            .users
            .get_user_by_identifier(project_id, &identifier)
            .await?;

        let stored = self
            .live_code(project_id, &user, VerificationType::ResetPassword)
            .await?;
        stored
            .code
            .compare(code)
            .map_err(|_| AuthError::InvalidArgument("invalid verification code".into()))?;

        validate_password(new_password)?;
        let settings = self.stores.settings.get_user_settings(project_id).await?;
        let hash = settings.password_hashing.generate(new_password)?;
        self.stores
            .users
            .update_user(
                project_id,
                user.user_id,
                vec![UserUpdate::PasswordHash(hash), UserUpdate::ResetSessions],
            )
            .await?;
        self.stores
            .verification_codes
            .delete_verification_code(project_id, user.user_id, VerificationType::ResetPassword)
            .await?;

        info!(project_id, user_id = %user.user_id, "password reset");
        Ok(())
    }

    pub(crate) async fn send_email_verification(
        &self,
        project_id: &str,
        user: &User,
        settings: &UserSettings,
    ) -> AuthResult<()> {
        let Some(email) = user.info.email.clone() else {
            return Ok(());
        };
        let template = self
            .stores
            .settings
            .get_project_settings(project_id)
            .await?
            .templates
            .verify_email
            .unwrap_or_else(templates::default_verify_email);
        self.send_code(
            project_id,
            user,
            &email,
            VerificationType::Email,
            &template,
            settings,
        )
        .await
    }

    pub(crate) async fn send_verification_text(
        &self,
        _project_id: &str,
        _user: &User,
    ) -> AuthResult<()> {
        Err(AuthError::Unimplemented(
            "phone verification is not supported".into(),
        ))
    }

    /// The stored code for (user, purpose), translated so a caller cannot
    /// tell a missing code from a wrong one.
    async fn live_code(
        &self,
        project_id: &str,
        user: &User,
        kind: VerificationType,
    ) -> AuthResult<VerificationCode> {
        let stored = self
            .stores
            .verification_codes
            .get_verification_code(project_id, user.user_id, kind)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AuthError::InvalidArgument("invalid verification code".into())
                } else {
                    e
                }
            })?;
        if stored.is_expired(Utc::now()) {
            return Err(AuthError::InvalidArgument(
                "verification code expired".into(),
            ));
        }
        Ok(stored)
    }

    async fn send_code(
        &self,
        project_id: &str,
        user: &User,
        email: &str,
        kind: VerificationType,
        template: &EmailTemplate,
        settings: &UserSettings,
    ) -> AuthResult<()> {
        let gateway = match self.stores.settings.get_email_provider(project_id).await {
            Ok(gateway) => gateway,
            Err(e) if e.is_not_found() => {
                warn!(project_id, ?kind, "no email provider configured, code not sent");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        match self
            .stores
            .verification_codes
            .get_verification_code(project_id, user.user_id, kind)
            .await
        {
            Ok(existing) if !existing.is_expired(now) => return Ok(()),
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let code = generate_numeric_code(CODE_LENGTH);
        self.stores
            .verification_codes
            .create_verification_code(
                project_id,
                VerificationCode {
                    user_id: user.user_id,
                    kind,
                    code: settings.password_hashing.generate(&code)?,
                    sent_at: now,
                    expires_at: now + settings.verification_code_ttl,
                },
            )
            .await?;

        let rendered = templates::render(template, &code, email, &user.display_name());
        let name = format!("{} {}", user.profile.first_name, user.profile.last_name);
        gateway
            .send(&Message {
                to: vec![Recipient {
                    email: email.to_string(),
                    name: name.trim().to_string(),
                }],
                subject: rendered.subject,
                html_part: rendered.body,
            })
            .await?;

        info!(project_id, user_id = %user.user_id, ?kind, "verification code sent");
        Ok(())
    }
}
