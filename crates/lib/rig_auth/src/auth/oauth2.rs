//! Federated login: provider discovery, credentials, linking and the
//! authorization-code callback.

use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::AuthService;
use super::claims::SubjectType;
use super::login::LoginResult;
use crate::error::{AuthError, AuthResult};
use crate::models::auth::{
    AuthMethod, Oauth2Claims, Oauth2Link, Profile, RegisterMethod, UserIdentifier, UserUpdate,
};
use crate::models::settings::OauthProviderSettings;
use crate::oauth2::{ProviderCredentials, ProviderType, State};

/// A provider the login page can offer, with its authorization URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OauthProvider {
    pub provider: ProviderType,
    pub url: String,
}

impl AuthService {
    /// Providers enabled for login in `project_id`, each with a URL that
    /// returns to `app_redirect` once the user authorizes.
    pub async fn get_oauth2_providers(
        &self,
        project_id: &str,
        app_redirect: &str,
    ) -> AuthResult<Vec<OauthProvider>> {
        let settings = self.stores.settings.get_user_settings(project_id).await?;
        let callback = self.oauth_callback_url();

        let mut out = Vec::new();
        for (&provider_type, provider_settings) in &settings.oauth_settings.providers {
            if !provider_settings.allow_login {
                continue;
            }
            let Ok(provider) = self.providers.get(provider_type) else {
                warn!(project_id, provider = %provider_type, "login enabled for unavailable provider");
                continue;
            };
            let creds = self
                .load_oauth2_credentials(project_id, provider_type, provider_settings)
                .await?;
            let url = provider.redirect_url(&callback, app_redirect, project_id, &creds)?;
            debug!(project_id, provider = %provider_type, "generated oauth2 login url");
            out.push(OauthProvider {
                provider: provider_type,
                url,
            });
        }
        Ok(out)
    }

    /// Store `creds` sealed in the secret store and return the secret id to
    /// reference from the provider settings. An existing id is overwritten.
    pub async fn set_oauth2_credentials(
        &self,
        project_id: &str,
        provider_type: ProviderType,
        creds: &ProviderCredentials,
    ) -> AuthResult<Uuid> {
        let provider = self.providers.get(provider_type)?;
        provider.test(creds, &self.oauth_callback_url()).await?;

        let sealed = creds.seal(&self.config.secret_encryption_key)?;
        let settings = self.stores.settings.get_user_settings(project_id).await?;
        let secret_id = match settings.oauth_settings.provider(provider_type).secret_id {
            Some(secret_id) => {
                self.stores
                    .secrets
                    .update_secret(project_id, secret_id, sealed)
                    .await?;
                secret_id
            }
            None => {
                let secret_id = Uuid::new_v4();
                self.stores
                    .secrets
                    .create_secret(project_id, secret_id, sealed)
                    .await?;
                secret_id
            }
        };
        info!(project_id, provider = %provider_type, "oauth2 credentials stored");
        Ok(secret_id)
    }

    /// Log in the local user linked to an external identity, linking by email
    /// or creating the user when the provider allows registration.
    pub async fn login_oauth2(
        &self,
        project_id: &str,
        provider_type: ProviderType,
        claims: &Oauth2Claims,
        provider_settings: &OauthProviderSettings,
    ) -> AuthResult<LoginResult> {
        let settings = self.stores.settings.get_user_settings(project_id).await?;

        let user_id = match self
            .stores
            .users
            .get_oauth2_link(project_id, &claims.issuer, &claims.subject)
            .await
        {
            Ok(link) => link.user_id,
            Err(e) if e.is_not_found() => {
                let user_id = self
                    .resolve_federated_user(project_id, provider_type, claims, provider_settings)
                    .await?;
                self.link_oauth2(project_id, claims, user_id).await?
            }
            Err(e) => return Err(e),
        };

        let session_id = self
            .new_session(
                project_id,
                user_id,
                AuthMethod::Oauth2Provider(provider_type),
                &settings,
            )
            .await?;
        let token = self
            .generate_token(
                project_id,
                user_id,
                SubjectType::User,
                Some(session_id),
                &settings,
            )
            .await?;

        info!(project_id, user_id = %user_id, provider = %provider_type, "oauth2 login");
        Ok(LoginResult {
            user_id,
            session_id,
            token,
        })
    }

    /// Complete an authorization-code round trip and return the application
    /// URL carrying the issued tokens.
    pub async fn handle_oauth2_callback(&self, state: &str, code: &str) -> AuthResult<String> {
        if state.is_empty() {
            return Err(AuthError::InvalidArgument("missing state".into()));
        }
        if code.is_empty() {
            return Err(AuthError::InvalidArgument("missing code".into()));
        }
        let state = State::decode(state)?;
        let project_id = state.project_id.as_str();

        let settings = self.stores.settings.get_user_settings(project_id).await?;
        let provider_settings = settings.oauth_settings.provider(state.provider_type);
        if !provider_settings.allow_login {
            return Err(AuthError::FailedPrecondition(format!(
                "login with {} is disabled",
                state.provider_type
            )));
        }
        if !settings
            .oauth_settings
            .callback_urls
            .iter()
            .any(|u| u == &state.app_redirect)
        {
            return Err(AuthError::NotFound("invalid callback url".into()));
        }

        let provider = self.providers.get(state.provider_type)?;
        let creds = self
            .load_oauth2_credentials(project_id, state.provider_type, &provider_settings)
            .await?;
        let claims = provider
            .validate(&creds, code, &self.oauth_callback_url())
            .await?;
        let login = self
            .login_oauth2(project_id, state.provider_type, &claims, &provider_settings)
            .await?;

        app_redirect_with_token(&state.app_redirect, &login)
    }

    async fn load_oauth2_credentials(
        &self,
        project_id: &str,
        provider_type: ProviderType,
        provider_settings: &OauthProviderSettings,
    ) -> AuthResult<ProviderCredentials> {
        let secret_id = provider_settings.secret_id.ok_or_else(|| {
            AuthError::FailedPrecondition(format!("{provider_type} credentials are not configured"))
        })?;
        let sealed = self.stores.secrets.get_secret(project_id, secret_id).await?;
        ProviderCredentials::open(&sealed, &self.config.secret_encryption_key)
    }

    async fn resolve_federated_user(
        &self,
        project_id: &str,
        provider_type: ProviderType,
        claims: &Oauth2Claims,
        provider_settings: &OauthProviderSettings,
    ) -> AuthResult<Uuid> {
        if let Some(email) = &claims.email {
            let identifier = UserIdentifier::Email(email.clone()).parse()?;
            match self
                .stores
                .users
                .get_user_by_identifier(project_id, &identifier)
                .await
            {
                Ok(user) => return Ok(user.user_id),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        if !provider_settings.allow_register {
            return Err(AuthError::PermissionDenied(format!(
                "registering with {provider_type} is disabled"
            )));
        }

        let mut updates = Vec::new();
        if let Some(email) = &claims.email {
            updates.push(UserUpdate::Email(email.trim().to_lowercase()));
        }
        updates.push(UserUpdate::Profile(Profile {
            first_name: claims.first_name.clone(),
            last_name: claims.last_name.clone(),
            image_url: claims.image_url.clone(),
        }));
        let user = self
            .stores
            .users
            .create_user(project_id, RegisterMethod::Oauth2(provider_type), updates)
            .await?;
        info!(project_id, user_id = %user.user_id, provider = %provider_type, "user registered via oauth2");
        Ok(user.user_id)
    }

    /// Link the external identity to `user_id`. If a concurrent login linked
    /// it first, the existing link wins.
    async fn link_oauth2(
        &self,
        project_id: &str,
        claims: &Oauth2Claims,
        user_id: Uuid,
    ) -> AuthResult<Uuid> {
        let link = Oauth2Link {
            issuer: claims.issuer.clone(),
            subject: claims.subject.clone(),
            user_id,
        };
        match self.stores.users.create_oauth2_link(project_id, link).await {
            Ok(()) => Ok(user_id),
            Err(e) if e.is_already_exists() => Ok(self
                .stores
                .users
                .get_oauth2_link(project_id, &claims.issuer, &claims.subject)
                .await?
                .user_id),
            Err(e) => Err(e),
        }
    }
}

/// `app_redirect` with the tokens appended as query parameters. A redirect
/// without a scheme is taken to be https.
fn app_redirect_with_token(app_redirect: &str, login: &LoginResult) -> AuthResult<String> {
    let mut url = match Url::parse(app_redirect) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{app_redirect}"))
                .map_err(|e| AuthError::InvalidArgument(format!("invalid app redirect: {e}")))?
        }
        Err(e) => return Err(AuthError::InvalidArgument(format!("invalid app redirect: {e}"))),
    };
    url.query_pairs_mut()
        .append_pair("access_token", &login.token.access_token)
        .append_pair("refresh_token", &login.token.refresh_token);
    Ok(url.into())
}
