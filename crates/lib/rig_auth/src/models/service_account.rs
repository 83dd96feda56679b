use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::Author;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Author,
    /// Managed accounts are owned by the platform rather than a user.
    pub managed: bool,
}

/// A stored service account as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountEntry {
    pub service_account_id: Uuid,
    pub client_id: String,
    pub service_account: ServiceAccount,
}
