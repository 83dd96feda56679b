use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

/// An HTML email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub to: Vec<Recipient>,
    pub subject: String,
    pub html_part: String,
}

/// Delivers email on behalf of a project.
#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(&self, msg: &Message) -> AuthResult<()>;
}
