use std::fmt;
use thiserror::Error;

use crate::orchestrator::InitState;

/// Authorization failures raised before any session state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// Another tab holds the authoritative instance claim.
    MultipleTabs,
    /// The local database cannot be opened in this context.
    IndexedDbUnavailable,
}

/// Failures of the access credential service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTokenErrorKind {
    RequestForbidden,
    NotFoundInCache,
    RetriesExceeded,
    /// Transient failure while the credential was being refreshed.
    RequestFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    NoValidClient,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthErrorKind::MultipleTabs => write!(f, "session is active in another tab"),
            AuthErrorKind::IndexedDbUnavailable => write!(f, "local database is not supported"),
        }
    }
}

impl fmt::Display for AccessTokenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessTokenErrorKind::RequestForbidden => write!(f, "request forbidden"),
            AccessTokenErrorKind::NotFoundInCache => write!(f, "not found in cache"),
            AccessTokenErrorKind::RetriesExceeded => write!(f, "retries exceeded"),
            AccessTokenErrorKind::RequestFailed => write!(f, "request failed"),
        }
    }
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientErrorKind::NoValidClient => write!(f, "no valid local client"),
        }
    }
}

/// Errors surfaced by the startup pipeline and the collaborators it calls.
///
/// Stages never recover locally: every failure reaches the
/// [`FailureClassifier`](crate::failure::FailureClassifier) unchanged.
/// Anything outside the typed variants travels as
/// [`StartupError::Collaborator`] and is treated as unclassified.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Local storage is unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Authentication error: {0}")]
    Auth(AuthErrorKind),

    #[error("Access token error ({kind}): {message}")]
    AccessToken {
        kind: AccessTokenErrorKind,
        message: String,
    },

    #[error("Client error: {0}")]
    Client(ClientErrorKind),

    #[error("User does not have an activated identity")]
    InactiveIdentity,

    #[error("Invalid init transition from {from:?} to {to:?}")]
    InvalidTransition { from: InitState, to: InitState },

    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl StartupError {
    pub fn access_token(kind: AccessTokenErrorKind, message: impl Into<String>) -> Self {
        StartupError::AccessToken {
            kind,
            message: message.into(),
        }
    }

    pub fn collaborator(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        StartupError::Collaborator {
            operation,
            source: source.into(),
        }
    }

    pub fn access_token_kind(&self) -> Option<AccessTokenErrorKind> {
        match self {
            StartupError::AccessToken { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
