//! Failure classification and the recovery policy applied to startup errors.

use std::sync::Arc;

use crate::collaborators::{ConnectivityTrigger, CrashReporter};
use crate::controller::LifecycleController;
use crate::error::{AccessTokenErrorKind, AuthErrorKind, ClientErrorKind, StartupError};
use crate::platform::{Connectivity, PlatformSignals};
use crate::sign_out::SignOutReason;

/// What to do about a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    RedirectToLogin(SignOutReason),
    /// Wait for a successful connectivity probe, then force a full reload.
    ReloadAfterConnectivity(ConnectivityTrigger),
    WaitForConnectivityThenReload,
    ForceLogout(SignOutReason),
    /// Wait for the `online` signal, then classify the same error again.
    WaitForConnectivityThenRetryInit,
}

impl RecoveryAction {
    /// Whether the error behind this action goes to crash telemetry.
    pub fn requires_crash_report(self) -> bool {
        matches!(
            self,
            RecoveryAction::RedirectToLogin(SignOutReason::SessionExpired)
                | RecoveryAction::ReloadAfterConnectivity(_)
                | RecoveryAction::ForceLogout(_)
        )
    }
}

/// Point of the run at which the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    /// Before the interface was shown.
    Startup,
    /// Background work after the interface was shown.
    SteadyState,
}

/// Startup decision table; first matching rule wins.
pub fn classify(
    error: &StartupError,
    was_reload: bool,
    connectivity: Connectivity,
) -> RecoveryAction {
    match error {
        StartupError::Auth(AuthErrorKind::MultipleTabs) => {
            return RecoveryAction::RedirectToLogin(SignOutReason::MultipleTabs);
        }
        StartupError::Auth(AuthErrorKind::IndexedDbUnavailable)
        | StartupError::StorageUnavailable(_) => {
            return RecoveryAction::RedirectToLogin(SignOutReason::IndexedDbUnavailable);
        }
        _ => {}
    }

    let token_kind = error.access_token_kind();

    if was_reload {
        match (token_kind, error) {
            (
                Some(AccessTokenErrorKind::RequestForbidden | AccessTokenErrorKind::NotFoundInCache),
                _,
            ) => {
                return RecoveryAction::RedirectToLogin(SignOutReason::SessionExpired);
            }
            (Some(_), _) => {
                return RecoveryAction::ReloadAfterConnectivity(
                    ConnectivityTrigger::AccessTokenRetrieval,
                );
            }
            (None, StartupError::Client(ClientErrorKind::NoValidClient)) => {
                return RecoveryAction::ReloadAfterConnectivity(ConnectivityTrigger::AppInitReload);
            }
            _ => {}
        }
    }

    if connectivity == Connectivity::Offline {
        return RecoveryAction::WaitForConnectivityThenRetryInit;
    }

    match token_kind {
        Some(
            AccessTokenErrorKind::NotFoundInCache
            | AccessTokenErrorKind::RetriesExceeded
            | AccessTokenErrorKind::RequestForbidden,
        ) => RecoveryAction::RedirectToLogin(SignOutReason::NotSignedIn),
        _ => RecoveryAction::ForceLogout(SignOutReason::AppInit),
    }
}

/// Table for failures raised once the interface is visible.
pub fn classify_steady_state(error: &StartupError, connectivity: Connectivity) -> RecoveryAction {
    match error {
        StartupError::Auth(AuthErrorKind::MultipleTabs) => {
            RecoveryAction::RedirectToLogin(SignOutReason::MultipleTabs)
        }
        _ if connectivity == Connectivity::Offline => {
            RecoveryAction::WaitForConnectivityThenReload
        }
        _ => classify(error, false, connectivity),
    }
}

/// Logs, reports and resolves startup failures into a [`RecoveryAction`].
pub struct FailureClassifier {
    crash_reporter: Arc<dyn CrashReporter>,
    platform: Arc<dyn PlatformSignals>,
    app_version: String,
}

impl FailureClassifier {
    pub fn new(
        crash_reporter: Arc<dyn CrashReporter>,
        platform: Arc<dyn PlatformSignals>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            crash_reporter,
            platform,
            app_version: app_version.into(),
        }
    }

    /// Classifies `error` against the current connectivity, logging and
    /// reporting it as the chosen branch requires.
    pub fn handle(
        &self,
        error: &StartupError,
        was_reload: bool,
        phase: FailurePhase,
    ) -> RecoveryAction {
        let connectivity = self.platform.connectivity();
        let action = match phase {
            FailurePhase::Startup => classify(error, was_reload, connectivity),
            FailurePhase::SteadyState => classify_steady_state(error, connectivity),
        };

        log::warn!(
            "Could not initialize app version '{}': {error}",
            self.app_version
        );
        match action {
            RecoveryAction::RedirectToLogin(SignOutReason::SessionExpired) => {
                log::error!("Session expired on page reload: {error}");
            }
            RecoveryAction::RedirectToLogin(reason) => {
                log::warn!("Redirecting to login ({reason}): {error}");
            }
            RecoveryAction::ReloadAfterConnectivity(trigger) => {
                log::warn!("Connectivity issues ({trigger:?}). Reloading on regained connectivity.");
            }
            RecoveryAction::WaitForConnectivityThenReload => {
                log::warn!("No connectivity. Reloading on regained connectivity.");
            }
            RecoveryAction::WaitForConnectivityThenRetryInit => {
                log::warn!("No connectivity. Re-evaluating failure on regained connectivity.");
            }
            RecoveryAction::ForceLogout(reason) => {
                log::error!("Caused by: {error}. Logging out user ({reason}).");
            }
        }

        if action.requires_crash_report() {
            if let Err(e) = self.crash_reporter.report(error) {
                log::warn!("Failed to report error to crash telemetry: {e}");
            }
        }

        action
    }

    /// Drives `error` to a terminal recovery, re-evaluating after every
    /// regained connection while the device stays offline.
    pub async fn recover(
        &self,
        error: &StartupError,
        was_reload: bool,
        phase: FailurePhase,
        controller: &Arc<LifecycleController>,
    ) -> RecoveryAction {
        loop {
            let action = self.handle(error, was_reload, phase);
            controller.execute(action).await;
            if action != RecoveryAction::WaitForConnectivityThenRetryInit {
                return action;
            }
            log::info!("Connectivity regained, re-evaluating startup failure");
        }
    }
}
