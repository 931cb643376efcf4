//! Logout, refresh, update and login redirection.

use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;

use crate::collaborators::{
    AuthService, ClientRepository, Collaborators, ConnectivityProbe, ConnectivityTrigger,
    EventRepository, Navigator, StorageService, StreamChangeTrigger, UserRepository,
};
use crate::config::LifecycleConfig;
use crate::events::{EventBus, LifecycleEvent, WarningKind};
use crate::failure::RecoveryAction;
use crate::platform::PlatformSignals;
use crate::sign_out::SignOutReason;
use crate::taskpool::TaskPool;

/// Cache key telling the login page to show the login form.
pub const SHOW_LOGIN_KEY: &str = "auth.show_login";
/// Cache key keeping the session of a permanent device.
pub const PERSIST_KEY: &str = "auth.persist";
/// Substring shared by all per-account cookie label keys.
pub const COOKIE_LABEL_KEY: &str = "auth.cookie_label";

/// Cache keys that survive one logout pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedKeys(Vec<String>);

impl RetainedKeys {
    /// `own_cookie_label` is the cookie label key of the account being signed out.
    pub fn compute(
        cached_keys: &[String],
        permanent_device: bool,
        clear_data: bool,
        own_cookie_label: Option<&str>,
    ) -> Self {
        let mut keys = vec![SHOW_LOGIN_KEY.to_string()];

        if permanent_device && !clear_data {
            keys.push(PERSIST_KEY.to_string());
        }

        for key in cached_keys {
            let deletes_own_label = clear_data && own_cookie_label == Some(key.as_str());
            if key.contains(COOKIE_LABEL_KEY) && !deletes_own_label && !keys.contains(key) {
                keys.push(key.clone());
            }
        }

        Self(keys)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|retained| retained == key)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Login route for `reason`, or the public landing page for a leaving guest.
pub fn login_url(
    config: &LifecycleConfig,
    current_query: &str,
    reason: SignOutReason,
    is_temporary_guest: bool,
) -> String {
    if reason.is_temporary_guest() && is_temporary_guest {
        return config.website_url().to_string();
    }

    let mut url = format!("{}{current_query}", config.login_path());
    if reason.is_immediate() {
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str(&urlencoding::encode(config.reason_parameter()));
        url.push('=');
        url.push_str(&urlencoding::encode(reason.as_str()));
    }
    if reason != SignOutReason::NotSignedIn {
        url.push('#');
        url.push_str(config.login_anchor());
    }
    url
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// Local state was cleared and the browser sent to this URL.
    Redirected(String),
    /// Offline: the backend logout runs once connectivity returns.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    RestartRequested,
    Reloaded,
}

/// Executes lifecycle actions from the `Ready` steady state.
pub struct LifecycleController {
    config: Arc<LifecycleConfig>,
    auth: Arc<dyn AuthService>,
    storage: Arc<dyn StorageService>,
    users: Arc<dyn UserRepository>,
    clients: Arc<dyn ClientRepository>,
    events: Arc<dyn EventRepository>,
    connectivity: Arc<dyn ConnectivityProbe>,
    navigator: Arc<dyn Navigator>,
    platform: Arc<dyn PlatformSignals>,
    bus: EventBus,
    tasks: TaskPool,
}

impl LifecycleController {
    pub fn new(config: Arc<LifecycleConfig>, collaborators: &Collaborators, bus: EventBus) -> Self {
        Self {
            config,
            auth: collaborators.auth.clone(),
            storage: collaborators.storage.clone(),
            users: collaborators.users.clone(),
            clients: collaborators.clients.clone(),
            events: collaborators.events.clone(),
            connectivity: collaborators.connectivity.clone(),
            navigator: collaborators.navigator.clone(),
            platform: collaborators.platform.clone(),
            bus,
            tasks: TaskPool::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Ends the session for `reason`, keeping the local database unless `clear_data`.
    pub async fn logout(self: &Arc<Self>, reason: SignOutReason, clear_data: bool) -> LogoutOutcome {
        if reason.is_immediate() {
            return LogoutOutcome::Redirected(self.clear_local_session(reason, clear_data).await);
        }

        if self.platform.is_online() {
            return LogoutOutcome::Redirected(self.logout_on_backend(reason, clear_data).await);
        }

        log::warn!("No internet access. Continuing logout when internet connectivity regained.");
        let mut online = self.platform.on_online();
        let controller = Arc::downgrade(self);
        self.tasks.execute("deferred_logout", async move {
            if !online.next().await {
                return;
            }
            if let Some(controller) = controller.upgrade() {
                controller.logout_on_backend(reason, clear_data).await;
            }
        });
        LogoutOutcome::Deferred
    }

    async fn logout_on_backend(&self, reason: SignOutReason, clear_data: bool) -> String {
        log::info!("Logout triggered by '{reason}': Disconnecting user from the backend.");
        if let Err(e) = self.auth.logout().await {
            log::warn!("Backend logout failed, clearing local session anyway: {e}");
        }
        self.clear_local_session(reason, clear_data).await
    }

    async fn clear_local_session(&self, reason: SignOutReason, clear_data: bool) -> String {
        self.events.disconnect(StreamChangeTrigger::Logout).await;

        let own_cookie_label = self.users.self_user().and_then(|user| {
            user.login_identifier()
                .map(|identifier| self.clients.cookie_label_key(identifier))
        });
        let retained = RetainedKeys::compute(
            &self.storage.cached_keys(),
            self.clients.is_current_client_permanent(),
            clear_data,
            own_cookie_label.as_deref(),
        );
        let keep_conversation_input = reason == SignOutReason::SessionExpired;
        self.storage
            .clear_cache(keep_conversation_input, retained.as_slice());

        if clear_data {
            if let Err(e) = self.storage.delete_database().await {
                log::error!("Failed to delete database before logout: {e}");
            }
        }

        self.bus.publish(LifecycleEvent::SignedOut { clear_data });
        self.redirect_to_login(reason).await
    }

    /// Restarts the app; a desktop shell decides the timing itself.
    pub fn refresh(&self) -> RefreshOutcome {
        log::info!("Refresh to update started");
        if self.config.desktop() {
            self.bus.publish(LifecycleEvent::RestartRequested);
            return RefreshOutcome::RestartRequested;
        }
        self.navigator.reload(true);
        RefreshOutcome::Reloaded
    }

    pub fn update(&self) {
        self.bus
            .publish(LifecycleEvent::ShowWarning(WarningKind::LifecycleUpdate));
    }

    /// Navigates to the login page once the backend is reachable. Returns the target URL.
    pub async fn redirect_to_login(&self, reason: SignOutReason) -> String {
        log::info!("Redirecting to login after connectivity verification. Reason: {reason}");
        self.connectivity
            .run_when_online(ConnectivityTrigger::LoginRedirect)
            .await;

        let url = login_url(
            &self.config,
            &self.navigator.current_query(),
            reason,
            self.users.is_temporary_guest(),
        );
        self.navigator.replace(&url);
        url
    }

    /// Carries out `action`. For [`RecoveryAction::WaitForConnectivityThenRetryInit`]
    /// this only waits for the device to come online; re-evaluating the
    /// failure is left to the caller.
    pub async fn execute(self: &Arc<Self>, action: RecoveryAction) {
        match action {
            RecoveryAction::RedirectToLogin(reason) => {
                self.redirect_to_login(reason).await;
            }
            RecoveryAction::ReloadAfterConnectivity(trigger) => {
                self.connectivity.run_when_online(trigger).await;
                self.navigator.reload(false);
            }
            RecoveryAction::WaitForConnectivityThenReload => {
                self.platform.wait_until_online().await;
                self.connectivity
                    .run_when_online(ConnectivityTrigger::AppInitReload)
                    .await;
                self.navigator.reload(false);
            }
            RecoveryAction::ForceLogout(reason) => {
                self.logout(reason, false).await;
            }
            RecoveryAction::WaitForConnectivityThenRetryInit => {
                self.platform.wait_until_online().await;
            }
        }
    }

    /// Handles refresh, sign-out and update requests published on the bus.
    pub fn listen_for_commands(self: &Arc<Self>) {
        let mut receiver = self.bus.subscribe();
        let controller: Weak<Self> = Arc::downgrade(self);
        self.tasks.execute("lifecycle_commands", async move {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Lifecycle command listener lagged by {skipped} events");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                match event {
                    LifecycleEvent::RefreshRequested => {
                        controller.refresh();
                    }
                    LifecycleEvent::SignOutRequested { reason, clear_data } => {
                        controller.logout(reason, clear_data).await;
                    }
                    LifecycleEvent::UpdateFound => controller.update(),
                    _ => {}
                }
            }
        });
    }

    /// Stops deferred logouts and the command listener.
    pub fn shutdown(&self) {
        self.tasks.cancel_all();
    }
}
