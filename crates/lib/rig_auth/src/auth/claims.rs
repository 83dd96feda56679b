//! Token payloads.
//!
//! Every token carries [`BaseClaims`] plus a `typ` tag naming its kind, so an
//! access token can never be accepted where a refresh token is expected.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    User,
    ServiceAccount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    Project,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Project => "project",
        }
    }
}

/// Fields shared by every token kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseClaims {
    pub iss: String,
    pub project_id: String,
    pub sub: Uuid,
    pub subject_type: SubjectType,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "sid", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(rename = "typ")]
    pub kind: TokenKind,
}

impl BaseClaims {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        issuer: &str,
        project_id: &str,
        subject: Uuid,
        subject_type: SubjectType,
        session_id: Option<Uuid>,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            iss: issuer.to_string(),
            project_id: project_id.to_string(),
            sub: subject,
            subject_type,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            session_id,
            kind,
        }
    }
}

/// Accessors common to all claims.
pub trait SubjectClaims: Send + Sync {
    fn base(&self) -> &BaseClaims;

    fn issuer(&self) -> &str {
        &self.base().iss
    }

    fn project_id(&self) -> &str {
        &self.base().project_id
    }

    fn subject(&self) -> Uuid {
        self.base().sub
    }

    fn subject_type(&self) -> SubjectType {
        self.base().subject_type
    }

    fn session_id(&self) -> Option<Uuid> {
        self.base().session_id
    }

    fn kind(&self) -> TokenKind {
        self.base().kind
    }
}

/// Authorizes API calls. Short-lived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(flatten)]
    pub base: BaseClaims,
    #[serde(default)]
    pub groups: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Authorizes a refresh only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(flatten)]
    pub base: BaseClaims,
    #[serde(default)]
    pub groups: Vec<Uuid>,
}

/// The original subject, narrowed to act on `use_project_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectClaims {
    #[serde(flatten)]
    pub base: BaseClaims,
    pub use_project_id: String,
}

impl SubjectClaims for AccessClaims {
    fn base(&self) -> &BaseClaims {
        &self.base
    }
}

impl SubjectClaims for RefreshClaims {
    fn base(&self) -> &BaseClaims {
        &self.base
    }
}

impl SubjectClaims for ProjectClaims {
    fn base(&self) -> &BaseClaims {
        &self.base
    }
}

/// Any validated claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claims {
    Access(AccessClaims),
    Refresh(RefreshClaims),
    Project(ProjectClaims),
}

impl SubjectClaims for Claims {
    fn base(&self) -> &BaseClaims {
        match self {
            Claims::Access(c) => &c.base,
            Claims::Refresh(c) => &c.base,
            Claims::Project(c) => &c.base,
        }
    }
}

impl From<AccessClaims> for Claims {
    fn from(c: AccessClaims) -> Self {
        Claims::Access(c)
    }
}

impl From<RefreshClaims> for Claims {
    fn from(c: RefreshClaims) -> Self {
        Claims::Refresh(c)
    }
}

impl From<ProjectClaims> for Claims {
    fn from(c: ProjectClaims) -> Self {
        Claims::Project(c)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn base(kind: TokenKind) -> BaseClaims {
        let now = Utc::now();
        BaseClaims::new(
            "rig",
            "proj",
            Uuid::new_v4(),
            SubjectType::User,
            Some(Uuid::new_v4()),
            kind,
            now,
            now + Duration::hours(1),
        )
    }

    #[test]
    fn access_claims_json_shape() {
        let claims = AccessClaims {
            base: base(TokenKind::Access),
            groups: vec![],
            metadata: BTreeMap::new(),
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["typ"], "access");
        assert_eq!(json["iss"], "rig");
        assert_eq!(json["subject_type"], "user");
        assert!(json.get("sid").is_some());
        assert!(json.get("metadata").is_none());

        let back: AccessClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn session_id_is_optional() {
        let mut b = base(TokenKind::Project);
        b.session_id = None;
        let claims = ProjectClaims {
            base: b,
            use_project_id: "other".into(),
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("sid").is_none());
        let back: ProjectClaims = serde_json::from_value(json).unwrap();
        assert_eq!(back.session_id(), None);
        assert_eq!(back.use_project_id, "other");
    }

    #[test]
    fn enum_delegates_accessors() {
        let refresh = RefreshClaims {
            base: base(TokenKind::Refresh),
            groups: vec![Uuid::new_v4()],
        };
        let subject = refresh.subject();
        let claims = Claims::from(refresh);
        assert_eq!(claims.subject(), subject);
        assert_eq!(claims.kind(), TokenKind::Refresh);
        assert_eq!(claims.project_id(), "proj");
    }
}
