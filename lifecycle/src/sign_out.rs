use serde::{Deserialize, Serialize};
use std::fmt;

/// Cause for ending the current session.
///
/// The wire name of each reason ([`SignOutReason::as_str`]) is what the login
/// page receives in its `reason` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutReason {
    AccountDeleted,
    ClientRemoved,
    SessionExpired,
    MultipleTabs,
    UserRequested,
    AppInit,
    NotSignedIn,
    #[serde(rename = "indexed_db")]
    IndexedDbUnavailable,
}

/// Behavioral class of a [`SignOutReason`].
///
/// Every reason belongs to exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignOutClass {
    /// Skip the backend logout call and clean up locally right away.
    Immediate,
    /// Eligible for the guest-room exit path on redirect.
    TemporaryGuest,
    /// Notify the backend before clearing local state.
    RequiresBackendLogout,
}

impl SignOutReason {
    pub const ALL: [SignOutReason; 8] = [
        SignOutReason::AccountDeleted,
        SignOutReason::ClientRemoved,
        SignOutReason::SessionExpired,
        SignOutReason::MultipleTabs,
        SignOutReason::UserRequested,
        SignOutReason::AppInit,
        SignOutReason::NotSignedIn,
        SignOutReason::IndexedDbUnavailable,
    ];

    pub fn class(self) -> SignOutClass {
        match self {
            SignOutReason::AccountDeleted
            | SignOutReason::ClientRemoved
            | SignOutReason::SessionExpired
            | SignOutReason::MultipleTabs => SignOutClass::Immediate,
            SignOutReason::UserRequested => SignOutClass::TemporaryGuest,
            SignOutReason::AppInit
            | SignOutReason::NotSignedIn
            | SignOutReason::IndexedDbUnavailable => SignOutClass::RequiresBackendLogout,
        }
    }

    pub fn is_immediate(self) -> bool {
        self.class() == SignOutClass::Immediate
    }

    pub fn is_temporary_guest(self) -> bool {
        self.class() == SignOutClass::TemporaryGuest
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignOutReason::AccountDeleted => "account_deleted",
            SignOutReason::ClientRemoved => "client_removed",
            SignOutReason::SessionExpired => "session_expired",
            SignOutReason::MultipleTabs => "multiple_tabs",
            SignOutReason::UserRequested => "user_requested",
            SignOutReason::AppInit => "app_init",
            SignOutReason::NotSignedIn => "not_signed_in",
            SignOutReason::IndexedDbUnavailable => "indexed_db",
        }
    }
}

impl fmt::Display for SignOutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_reason_has_exactly_one_class() {
        for reason in SignOutReason::ALL {
            let flags = [
                reason.is_immediate(),
                reason.is_temporary_guest(),
                reason.class() == SignOutClass::RequiresBackendLogout,
            ];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{reason}");
        }
    }

    #[test]
    fn test_multiple_tabs_skips_backend_logout() {
        assert!(SignOutReason::MultipleTabs.is_immediate());
        assert!(SignOutReason::SessionExpired.is_immediate());
        assert!(!SignOutReason::AppInit.is_immediate());
    }

    #[test]
    fn test_indexed_db_redirect_carries_no_reason() {
        assert_eq!(
            SignOutReason::IndexedDbUnavailable.class(),
            SignOutClass::RequiresBackendLogout
        );
    }

    #[test]
    fn test_not_signed_in_is_not_guest_eligible() {
        assert!(!SignOutReason::NotSignedIn.is_temporary_guest());
        assert!(SignOutReason::UserRequested.is_temporary_guest());
    }

    #[test]
    fn test_wire_names_match_serde() {
        for reason in SignOutReason::ALL {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }
}
