//! Machine identities authenticating with client credentials.

use chrono::Utc;
use futures::TryStreamExt;
use tracing::info;
use uuid::Uuid;

use super::AuthService;
use super::claims::{SubjectClaims, SubjectType};
use crate::crypto::generate_client_secret;
use crate::error::{AuthError, AuthResult};
use crate::models::auth::{Author, Token};
use crate::models::service_account::{ServiceAccount, ServiceAccountEntry};

const CLIENT_ID_PREFIX: &str = "rig_";

/// Public client id of a service account: `rig_<uuid>`.
pub fn format_client_id(service_account_id: Uuid) -> String {
    format!("{CLIENT_ID_PREFIX}{service_account_id}")
}

pub fn parse_client_id(client_id: &str) -> AuthResult<Uuid> {
    client_id
        .strip_prefix(CLIENT_ID_PREFIX)
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| AuthError::InvalidArgument("invalid client-ID format".into()))
}

/// A new service account with its plaintext secret. The secret is not
/// retrievable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedServiceAccount {
    pub entry: ServiceAccountEntry,
    pub client_secret: String,
}

impl AuthService {
    /// Create a service account in `project_id`. `caller` is recorded as the
    /// author; without one the account is attributed to the system.
    pub async fn create_service_account(
        &self,
        project_id: &str,
        caller: Option<&dyn SubjectClaims>,
        name: &str,
        managed: bool,
    ) -> AuthResult<CreatedServiceAccount> {
        if name.trim().is_empty() {
            return Err(AuthError::InvalidArgument(
                "service account name is empty".into(),
            ));
        }
        let settings = self.stores.settings.get_user_settings(project_id).await?;

        let service_account_id = Uuid::new_v4();
        let service_account = ServiceAccount {
            name: name.to_string(),
            created_at: Utc::now(),
            created_by: self.get_author(caller).await?,
            managed,
        };
        self.stores
            .service_accounts
            .create_service_account(project_id, service_account_id, service_account.clone())
            .await?;

        let client_secret = generate_client_secret();
        let hash = settings.password_hashing.generate(&client_secret)?;
        self.stores
            .service_accounts
            .update_client_secret(service_account_id, hash)
            .await?;

        info!(project_id, service_account_id = %service_account_id, "service account created");
        Ok(CreatedServiceAccount {
            entry: ServiceAccountEntry {
                service_account_id,
                client_id: format_client_id(service_account_id),
                service_account,
            },
            client_secret,
        })
    }

    /// Exchange client credentials for a session-less token pair in the
    /// project that owns the account.
    pub async fn login_client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> AuthResult<Token> {
        let service_account_id = parse_client_id(client_id)?;
        let (project_id, _) = self
            .stores
            .service_accounts
            .get_service_account(service_account_id)
            .await?;
        let settings = self.stores.settings.get_user_settings(&project_id).await?;

        self.stores
            .service_accounts
            .get_client_secret(service_account_id)
            .await?
            .compare(client_secret)?;

        let token = self
            .generate_token(
                &project_id,
                service_account_id,
                SubjectType::ServiceAccount,
                None,
                &settings,
            )
            .await?;
        info!(project_id, service_account_id = %service_account_id, "service account logged in");
        Ok(token)
    }

    pub async fn list_service_accounts(
        &self,
        caller: &dyn SubjectClaims,
    ) -> AuthResult<Vec<ServiceAccountEntry>> {
        self.stores
            .service_accounts
            .list_service_accounts(caller.project_id())
            .await?
            .map_ok(|(service_account_id, service_account)| ServiceAccountEntry {
                service_account_id,
                client_id: format_client_id(service_account_id),
                service_account,
            })
            .try_collect()
            .await
    }

    /// Delete an account of the caller's project. Deleting an unknown
    /// account succeeds.
    pub async fn delete_service_account(
        &self,
        caller: &dyn SubjectClaims,
        service_account_id: Uuid,
    ) -> AuthResult<()> {
        let owner = match self
            .stores
            .service_accounts
            .get_service_account(service_account_id)
            .await
        {
            Ok((owner, _)) => owner,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        if owner != caller.project_id() {
            return Ok(());
        }

        match self
            .stores
            .service_accounts
            .delete_service_account(service_account_id)
            .await
        {
            Err(e) if !e.is_not_found() => Err(e),
            _ => {
                info!(service_account_id = %service_account_id, "service account deleted");
                Ok(())
            }
        }
    }

    /// The principal behind `caller`, or the system when there is none.
    pub async fn get_author(&self, caller: Option<&dyn SubjectClaims>) -> AuthResult<Author> {
        let Some(caller) = caller else {
            return Ok(Author::System);
        };
        let id = caller.subject();
        match caller.subject_type() {
            SubjectType::User => {
                let user = self.stores.users.get_user(caller.project_id(), id).await?;
                Ok(Author::User {
                    id,
                    name: user.display_name(),
                })
            }
            SubjectType::ServiceAccount => {
                let (_, service_account) = self
                    .stores
                    .service_accounts
                    .get_service_account(id)
                    .await?;
                Ok(Author::ServiceAccount {
                    id,
                    name: service_account.name,
                })
            }
        }
    }
}
