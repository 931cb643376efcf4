//! In-memory backend shared by the lifecycle integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use lifecycle::collaborators::*;
use lifecycle::config::LifecycleConfig;
use lifecycle::error::StartupError;
use lifecycle::launch::LaunchContext;
use lifecycle::model::{
    AccessToken, Client, ClientId, ClientType, ConversationId, LocalClient, SelfUser, UserId,
};
use lifecycle::orchestrator::InitializationOrchestrator;
use lifecycle::platform::{Connectivity, PlatformSignals, SignalHub};
use lifecycle::progress::ProgressReport;
use lifecycle::single_instance::InstanceRegistry;

pub const APP_URL: &str = "https://app.courier.example.com/";

pub fn activated_user() -> SelfUser {
    SelfUser {
        id: UserId("user-1".to_string()),
        email: Some("alice@example.com".to_string()),
        phone: None,
        username: Some("alice".to_string()),
        has_picture: true,
        activated_identity: true,
        temporary_guest: false,
    }
}

pub fn guest_user() -> SelfUser {
    SelfUser {
        id: UserId("guest-1".to_string()),
        email: None,
        phone: None,
        username: None,
        has_picture: false,
        activated_identity: false,
        temporary_guest: true,
    }
}

/// Records every collaborator call and fails the ones told to.
pub struct FakeBackend {
    pub hub: Arc<SignalHub>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, fn() -> StartupError>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
    crash_reporter_fails: Mutex<bool>,
    self_user: Mutex<SelfUser>,
    client_type: Mutex<ClientType>,
    cached_keys: Mutex<Vec<String>>,
    cleared_cache: Mutex<Option<(bool, Vec<String>)>>,
    progress: Mutex<Vec<ProgressReport>>,
    screens: Mutex<Vec<InitialScreen>>,
    navigations: Mutex<Vec<String>>,
    reloads: Mutex<Vec<bool>>,
    crash_reports: Mutex<Vec<String>>,
    conversations: usize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Self::with_connectivity(Connectivity::Online)
    }

    pub fn with_connectivity(connectivity: Connectivity) -> Arc<Self> {
        Arc::new(Self {
            hub: Arc::new(SignalHub::new(connectivity)),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            crash_reporter_fails: Mutex::new(false),
            self_user: Mutex::new(activated_user()),
            client_type: Mutex::new(ClientType::Permanent),
            cached_keys: Mutex::new(Vec::new()),
            cleared_cache: Mutex::new(None),
            progress: Mutex::new(Vec::new()),
            screens: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
            reloads: Mutex::new(Vec::new()),
            crash_reports: Mutex::new(Vec::new()),
            conversations: 3,
        })
    }

    pub fn fail(&self, operation: &'static str, error: fn() -> StartupError) {
        self.failures.lock().unwrap().insert(operation, error);
    }

    /// Holds `operation` until the returned gate is notified.
    pub fn block(&self, operation: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(operation, gate.clone());
        gate
    }

    pub fn fail_crash_reports(&self) {
        *self.crash_reporter_fails.lock().unwrap() = true;
    }

    pub fn set_self_user(&self, user: SelfUser) {
        *self.self_user.lock().unwrap() = user;
    }

    pub fn set_client_type(&self, client_type: ClientType) {
        *self.client_type.lock().unwrap() = client_type;
    }

    pub fn set_cached_keys(&self, keys: &[&str]) {
        *self.cached_keys.lock().unwrap() = keys.iter().map(|k| k.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, operation: &str) -> bool {
        self.calls().iter().any(|call| call == operation)
    }

    pub fn position(&self, operation: &str) -> Option<usize> {
        self.calls().iter().position(|call| call == operation)
    }

    pub fn cleared_cache(&self) -> Option<(bool, Vec<String>)> {
        self.cleared_cache.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<f32> {
        self.progress
            .lock()
            .unwrap()
            .iter()
            .map(|report| report.percent)
            .collect()
    }

    pub fn screens(&self) -> Vec<InitialScreen> {
        self.screens.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn reloads(&self) -> Vec<bool> {
        self.reloads.lock().unwrap().clone()
    }

    pub fn crash_reports(&self) -> Vec<String> {
        self.crash_reports.lock().unwrap().clone()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }

    fn step(&self, operation: &'static str) -> CollaboratorResult<()> {
        self.record(operation);
        match self.failures.lock().unwrap().get(operation) {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }

    async fn pass_gate(&self, operation: &'static str) {
        let gate = self.gates.lock().unwrap().get(operation).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn local_client(&self) -> LocalClient {
        LocalClient {
            id: ClientId("client-1".to_string()),
            client_type: *self.client_type.lock().unwrap(),
        }
    }

    fn self_clients(&self) -> Vec<Client> {
        vec![
            Client {
                id: ClientId("client-1".to_string()),
                client_type: *self.client_type.lock().unwrap(),
            },
            Client {
                id: ClientId("client-2".to_string()),
                client_type: ClientType::Permanent,
            },
        ]
    }
}

pub fn collaborators(backend: &Arc<FakeBackend>) -> Collaborators {
    Collaborators {
        storage: backend.clone(),
        auth: backend.clone(),
        users: backend.clone(),
        clients: backend.clone(),
        properties: backend.clone(),
        cryptography: backend.clone(),
        events: backend.clone(),
        conversations: backend.clone(),
        connections: backend.clone(),
        team: backend.clone(),
        schema: backend.clone(),
        session: backend.clone(),
        connectivity: backend.clone(),
        crash_reporter: backend.clone(),
        navigator: backend.clone(),
        view: backend.clone(),
        platform: backend.hub.clone(),
    }
}

pub fn fresh_launch() -> LaunchContext {
    LaunchContext::new("", APP_URL, &LifecycleConfig::default().localhost_hosts())
}

pub fn reload_launch() -> LaunchContext {
    LaunchContext::new(APP_URL, APP_URL, &LifecycleConfig::default().localhost_hosts())
}

pub fn orchestrator(
    backend: &Arc<FakeBackend>,
    registry: Arc<InstanceRegistry>,
    launch: LaunchContext,
) -> InitializationOrchestrator {
    InitializationOrchestrator::new(
        Arc::new(LifecycleConfig::default()),
        collaborators(backend),
        registry,
        launch,
    )
}

/// Lets spawned listeners run on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[async_trait]
impl StorageService for FakeBackend {
    async fn check_available(&self) -> CollaboratorResult<()> {
        self.step("storage.check_available")
    }

    async fn init_for_user(&self, _user_id: &UserId) -> CollaboratorResult<()> {
        self.step("storage.init_for_user")
    }

    async fn terminate(&self, _reason: &str) {
        self.record("storage.terminate");
    }

    async fn delete_database(&self) -> CollaboratorResult<()> {
        self.step("storage.delete_database")
    }

    fn cached_keys(&self) -> Vec<String> {
        self.cached_keys.lock().unwrap().clone()
    }

    fn clear_cache(&self, keep_conversation_input: bool, retained: &[String]) {
        self.record("storage.clear_cache");
        *self.cleared_cache.lock().unwrap() = Some((keep_conversation_input, retained.to_vec()));
    }
}

#[async_trait]
impl AuthService for FakeBackend {
    async fn get_cached_access_token(&self) -> CollaboratorResult<AccessToken> {
        self.step("auth.get_cached_access_token")?;
        Ok(AccessToken("cached-token".to_string()))
    }

    async fn get_access_token(&self) -> CollaboratorResult<AccessToken> {
        self.step("auth.get_access_token")?;
        Ok(AccessToken("fresh-token".to_string()))
    }

    async fn logout(&self) -> CollaboratorResult<()> {
        self.step("auth.logout")
    }
}

#[async_trait]
impl UserRepository for FakeBackend {
    async fn get_self(&self) -> CollaboratorResult<SelfUser> {
        self.step("users.get_self")?;
        Ok(self.self_user.lock().unwrap().clone())
    }

    async fn load_users(&self) -> CollaboratorResult<()> {
        self.step("users.load_users")
    }

    async fn set_default_picture(&self) -> CollaboratorResult<()> {
        self.step("users.set_default_picture")
    }

    async fn request_username_suggestion(&self) -> CollaboratorResult<()> {
        self.step("users.request_username_suggestion")
    }

    fn self_user(&self) -> Option<SelfUser> {
        Some(self.self_user.lock().unwrap().clone())
    }

    fn is_temporary_guest(&self) -> bool {
        self.self_user.lock().unwrap().temporary_guest
    }

    fn should_change_username(&self) -> bool {
        false
    }

    fn pending_connection_requests(&self) -> usize {
        0
    }

    fn set_self_devices(&self, _clients: Vec<Client>) {
        self.record("users.set_self_devices");
    }
}

#[async_trait]
impl ClientRepository for FakeBackend {
    async fn init(&self, _self_user: &SelfUser) -> CollaboratorResult<()> {
        self.step("clients.init")
    }

    async fn get_valid_local_client(&self) -> CollaboratorResult<LocalClient> {
        self.step("clients.get_valid_local_client")?;
        Ok(self.local_client())
    }

    async fn get_clients_for_self(&self) -> CollaboratorResult<Vec<Client>> {
        self.step("clients.get_clients_for_self")?;
        Ok(self.self_clients())
    }

    async fn update_clients_for_self(&self) -> CollaboratorResult<Vec<Client>> {
        self.step("clients.update_clients_for_self")?;
        Ok(self.self_clients())
    }

    fn is_current_client_permanent(&self) -> bool {
        *self.client_type.lock().unwrap() == ClientType::Permanent
    }

    fn cookie_label_key(&self, login_identifier: &str) -> String {
        format!("auth.cookie_label@{login_identifier}")
    }
}

#[async_trait]
impl PropertiesRepository for FakeBackend {
    async fn init(&self, _self_user: &SelfUser) -> CollaboratorResult<()> {
        self.step("properties.init")
    }

    async fn check_privacy_permission(&self) -> CollaboratorResult<()> {
        self.step("properties.check_privacy_permission")
    }
}

#[async_trait]
impl CryptographyRepository for FakeBackend {
    async fn load_sessions(&self, _client: &LocalClient) -> CollaboratorResult<()> {
        self.step("cryptography.load_sessions")
    }
}

#[async_trait]
impl EventRepository for FakeBackend {
    async fn connect(&self, _client: &LocalClient) -> CollaboratorResult<()> {
        self.step("events.connect")
    }

    async fn disconnect(&self, trigger: StreamChangeTrigger) {
        self.record(&format!("events.disconnect({trigger:?})"));
    }

    async fn reconnect(&self, trigger: StreamChangeTrigger) {
        self.record(&format!("events.reconnect({trigger:?})"));
    }

    async fn initialize_from_stream(&self) -> CollaboratorResult<usize> {
        self.step("events.initialize_from_stream")?;
        Ok(42)
    }
}

#[async_trait]
impl ConversationRepository for FakeBackend {
    async fn get_conversations(&self) -> CollaboratorResult<usize> {
        self.step("conversations.get_conversations")?;
        Ok(self.conversations)
    }

    fn map_connections(&self) {
        self.record("conversations.map_connections");
    }

    async fn initialize_conversations(&self) -> CollaboratorResult<()> {
        self.step("conversations.initialize_conversations")
    }

    fn most_recent_conversation(&self) -> Option<ConversationId> {
        Some(ConversationId("conversation-1".to_string()))
    }

    async fn update_conversations_on_app_init(&self) -> CollaboratorResult<()> {
        self.step("conversations.update_conversations_on_app_init")
    }

    async fn cleanup_conversations(&self) {
        self.record("conversations.cleanup_conversations");
    }

    async fn leave_guest_room(&self) {
        self.record("conversations.leave_guest_room");
    }
}

#[async_trait]
impl ConnectionRepository for FakeBackend {
    async fn get_connections(&self) -> CollaboratorResult<usize> {
        self.step("connections.get_connections")?;
        Ok(1)
    }
}

#[async_trait]
impl TeamRepository for FakeBackend {
    async fn get_team(&self) -> CollaboratorResult<()> {
        self.pass_gate("team.get_team").await;
        self.step("team.get_team")
    }
}

#[async_trait]
impl SchemaLoader for FakeBackend {
    async fn load_protocol_schema(&self, _version: &str) -> CollaboratorResult<()> {
        self.step("schema.load_protocol_schema")
    }
}

#[async_trait]
impl SessionServices for FakeBackend {
    async fn init_lifecycle(&self) {
        self.record("session.init_lifecycle");
    }

    async fn init_audio(&self) {
        self.record("session.init_audio");
    }

    async fn leave_call_on_unload(&self) {
        self.record("session.leave_call_on_unload");
    }

    async fn clear_notifications(&self) {
        self.record("session.clear_notifications");
    }

    async fn check_notification_permission(&self) {
        self.record("session.check_notification_permission");
    }
}

#[async_trait]
impl ConnectivityProbe for FakeBackend {
    async fn run_when_online(&self, trigger: ConnectivityTrigger) {
        self.hub.wait_until_online().await;
        self.record(&format!("connectivity.run_when_online({trigger:?})"));
    }
}

impl CrashReporter for FakeBackend {
    fn report(&self, error: &StartupError) -> anyhow::Result<()> {
        self.crash_reports.lock().unwrap().push(error.to_string());
        if *self.crash_reporter_fails.lock().unwrap() {
            anyhow::bail!("crash report endpoint unreachable");
        }
        Ok(())
    }
}

impl Navigator for FakeBackend {
    fn current_query(&self) -> String {
        String::new()
    }

    fn replace(&self, url: &str) {
        self.navigations.lock().unwrap().push(url.to_string());
    }

    fn reload(&self, force: bool) {
        self.reloads.lock().unwrap().push(force);
    }
}

impl LoadingView for FakeBackend {
    fn update_progress(&self, report: &ProgressReport) {
        self.progress.lock().unwrap().push(report.clone());
    }

    fn show_initial_screen(&self, screen: &InitialScreen) {
        self.screens.lock().unwrap().push(screen.clone());
    }

    fn remove_loading(&self) {
        self.record("view.remove_loading");
    }
}
