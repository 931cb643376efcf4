//! Contracts of the external services the lifecycle core drives.
//!
//! The core only sequences these calls and reacts to their results; the
//! concrete repositories, transport, storage engine and view live elsewhere
//! and are injected through [`Collaborators`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StartupError;
use crate::model::{AccessToken, Client, ConversationId, LocalClient, SelfUser, UserId};
use crate::platform::PlatformSignals;
use crate::progress::ProgressReport;

pub type CollaboratorResult<T> = Result<T, StartupError>;

/// Why the realtime stream is being (re)connected or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChangeTrigger {
    Logout,
    Offline,
    Online,
    PageNavigation,
}

/// Tag passed to the connectivity probe, used by the backend client for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityTrigger {
    AccessTokenRetrieval,
    AppInitReload,
    ConnectionRegained,
    LoginRedirect,
}

/// Screen selected when the interface is first revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialScreen {
    TemporaryGuest,
    Takeover,
    Conversation(ConversationId),
    ConnectionRequests,
    None,
}

/// Local persistent storage and the key/value cache next to it.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn check_available(&self) -> CollaboratorResult<()>;
    async fn init_for_user(&self, user_id: &UserId) -> CollaboratorResult<()>;
    async fn terminate(&self, reason: &str);
    async fn delete_database(&self) -> CollaboratorResult<()>;

    /// Keys currently held by the cache.
    fn cached_keys(&self) -> Vec<String>;

    /// Removes every cache key not listed in `retained`.
    fn clear_cache(&self, keep_conversation_input: bool, retained: &[String]);
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn get_cached_access_token(&self) -> CollaboratorResult<AccessToken>;
    async fn get_access_token(&self) -> CollaboratorResult<AccessToken>;
    /// Invalidates the session on the backend.
    async fn logout(&self) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_self(&self) -> CollaboratorResult<SelfUser>;
    async fn load_users(&self) -> CollaboratorResult<()>;
    async fn set_default_picture(&self) -> CollaboratorResult<()>;
    async fn request_username_suggestion(&self) -> CollaboratorResult<()>;

    /// Latest snapshot of the self user, if one has been loaded.
    fn self_user(&self) -> Option<SelfUser>;
    fn is_temporary_guest(&self) -> bool;
    fn should_change_username(&self) -> bool;
    fn pending_connection_requests(&self) -> usize;
    fn set_self_devices(&self, clients: Vec<Client>);
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn init(&self, self_user: &SelfUser) -> CollaboratorResult<()>;
    async fn get_valid_local_client(&self) -> CollaboratorResult<LocalClient>;
    async fn get_clients_for_self(&self) -> CollaboratorResult<Vec<Client>>;
    async fn update_clients_for_self(&self) -> CollaboratorResult<Vec<Client>>;

    fn is_current_client_permanent(&self) -> bool;
    fn cookie_label_key(&self, login_identifier: &str) -> String;
}

#[async_trait]
pub trait PropertiesRepository: Send + Sync {
    async fn init(&self, self_user: &SelfUser) -> CollaboratorResult<()>;
    async fn check_privacy_permission(&self) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait CryptographyRepository: Send + Sync {
    /// Opens the cryptographic sessions of the given local device.
    async fn load_sessions(&self, client: &LocalClient) -> CollaboratorResult<()>;
}

/// Realtime notification stream.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn connect(&self, client: &LocalClient) -> CollaboratorResult<()>;
    async fn disconnect(&self, trigger: StreamChangeTrigger);
    async fn reconnect(&self, trigger: StreamChangeTrigger);
    /// Replays the notification backlog; returns the number of notifications handled.
    async fn initialize_from_stream(&self) -> CollaboratorResult<usize>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Returns the number of conversations fetched.
    async fn get_conversations(&self) -> CollaboratorResult<usize>;
    fn map_connections(&self);
    async fn initialize_conversations(&self) -> CollaboratorResult<()>;
    fn most_recent_conversation(&self) -> Option<ConversationId>;
    async fn update_conversations_on_app_init(&self) -> CollaboratorResult<()>;
    async fn cleanup_conversations(&self);
    async fn leave_guest_room(&self);
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Returns the number of connections fetched.
    async fn get_connections(&self) -> CollaboratorResult<usize>;
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn get_team(&self) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait SchemaLoader: Send + Sync {
    /// Loads the message protocol schema matching the application version.
    async fn load_protocol_schema(&self, version: &str) -> CollaboratorResult<()>;
}

/// Session-wide services initialized once the interface is up.
#[async_trait]
pub trait SessionServices: Send + Sync {
    async fn init_lifecycle(&self);
    async fn init_audio(&self);
    async fn leave_call_on_unload(&self);
    async fn clear_notifications(&self);
    async fn check_notification_permission(&self);
}

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Resolves once a liveness check against the backend succeeds.
    async fn run_when_online(&self, trigger: ConnectivityTrigger);
}

pub trait CrashReporter: Send + Sync {
    /// Fire-and-forget; a failed report is logged by the caller and otherwise ignored.
    fn report(&self, error: &StartupError) -> anyhow::Result<()>;
}

pub trait Navigator: Send + Sync {
    /// Query string of the current location, including the leading `?` if any.
    fn current_query(&self) -> String;
    fn replace(&self, url: &str);
    fn reload(&self, force: bool);
}

pub trait LoadingView: Send + Sync {
    fn update_progress(&self, report: &ProgressReport);
    fn show_initial_screen(&self, screen: &InitialScreen);
    fn remove_loading(&self);
}

/// Every collaborator the lifecycle core needs, passed in at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn StorageService>,
    pub auth: Arc<dyn AuthService>,
    pub users: Arc<dyn UserRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub properties: Arc<dyn PropertiesRepository>,
    pub cryptography: Arc<dyn CryptographyRepository>,
    pub events: Arc<dyn EventRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub connections: Arc<dyn ConnectionRepository>,
    pub team: Arc<dyn TeamRepository>,
    pub schema: Arc<dyn SchemaLoader>,
    pub session: Arc<dyn SessionServices>,
    pub connectivity: Arc<dyn ConnectivityProbe>,
    pub crash_reporter: Arc<dyn CrashReporter>,
    pub navigator: Arc<dyn Navigator>,
    pub view: Arc<dyn LoadingView>,
    pub platform: Arc<dyn PlatformSignals>,
}
