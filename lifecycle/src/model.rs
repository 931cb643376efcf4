//! Snapshots of domain entities the lifecycle core reads from its collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque access credential handed out by the auth service.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Read-only snapshot of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfUser {
    pub id: UserId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub has_picture: bool,
    /// Whether the account has a verified email or phone.
    pub activated_identity: bool,
    /// Guest accounts have no permanent identity and expire.
    pub temporary_guest: bool,
}

impl SelfUser {
    /// Identifier used to derive the per-account cookie label key.
    pub fn login_identifier(&self) -> Option<&str> {
        self.email.as_deref().or(self.phone.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Permanent,
    Temporary,
}

impl ClientType {
    pub fn as_str(self) -> &'static str {
        match self {
            ClientType::Permanent => "permanent",
            ClientType::Temporary => "temporary",
        }
    }
}

/// A registered device of the self user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: ClientId,
    pub client_type: ClientType,
}

/// The device this process runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalClient {
    pub id: ClientId,
    pub client_type: ClientType,
}
