//! Startup pipeline from an authenticated session to a loaded interface.
//!
//! Each [`InitState`] is entered by exactly one stage method. Stages run
//! strictly one after another, except the self-user/schema pair and the
//! conversation/connection pair, which are joined with "both succeed"
//! semantics. Values a later stage depends on (self user, local client) are
//! passed along as arguments.

use std::sync::Arc;

use crate::collaborators::{Collaborators, InitialScreen, StreamChangeTrigger};
use crate::config::LifecycleConfig;
use crate::connectivity::ConnectivityWatcher;
use crate::controller::LifecycleController;
use crate::error::{AuthErrorKind, StartupError};
use crate::events::{EventBus, LifecycleEvent};
use crate::failure::{FailureClassifier, FailurePhase, RecoveryAction};
use crate::launch::LaunchContext;
use crate::model::{ConversationId, LocalClient, SelfUser};
use crate::progress::{Checkpoint, ProgressTracker};
use crate::sign_out::SignOutReason;
use crate::single_instance::{InstanceId, InstanceRegistry, SingleInstanceCoordinator};
use crate::taskpool::TaskPool;
use crate::telemetry::{InitStatistic, InitTelemetry, TimingStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InitState {
    NotStarted,
    CheckingStorage,
    RegisteringInstance,
    LoadingToken,
    LoadingSelfUser,
    ValidatingClient,
    InitializingCrypto,
    ConnectingStream,
    LoadingConversations,
    LoadingTeam,
    LoadingUsers,
    ReplayingNotifications,
    InitializingConversations,
    UpdatingClients,
    ShowingInterface,
    FullyLoaded,
    /// Absorbing; only a new orchestrator starts over.
    Failed,
}

impl InitState {
    pub fn next(self) -> Option<InitState> {
        use InitState::*;
        match self {
            NotStarted => Some(CheckingStorage),
            CheckingStorage => Some(RegisteringInstance),
            RegisteringInstance => Some(LoadingToken),
            LoadingToken => Some(LoadingSelfUser),
            LoadingSelfUser => Some(ValidatingClient),
            ValidatingClient => Some(InitializingCrypto),
            InitializingCrypto => Some(ConnectingStream),
            ConnectingStream => Some(LoadingConversations),
            LoadingConversations => Some(LoadingTeam),
            LoadingTeam => Some(LoadingUsers),
            LoadingUsers => Some(ReplayingNotifications),
            ReplayingNotifications => Some(InitializingConversations),
            InitializingConversations => Some(UpdatingClients),
            UpdatingClients => Some(ShowingInterface),
            ShowingInterface => Some(FullyLoaded),
            FullyLoaded | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InitState::FullyLoaded | InitState::Failed)
    }

    pub fn can_advance_to(self, to: InitState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == InitState::Failed || self.next() == Some(to)
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum InitOutcome {
    FullyLoaded,
    Failed {
        /// State whose stage raised the error.
        failed_in: InitState,
        error: StartupError,
        action: RecoveryAction,
    },
    /// `run` was called on an orchestrator that had already started.
    AlreadyStarted(InitState),
}

/// First match wins: guest screen, username takeover, most recent
/// conversation, pending connection requests.
pub fn decide_initial_screen(
    is_temporary_guest: bool,
    should_change_username: bool,
    most_recent_conversation: Option<ConversationId>,
    pending_connection_requests: usize,
) -> InitialScreen {
    if is_temporary_guest {
        InitialScreen::TemporaryGuest
    } else if should_change_username {
        InitialScreen::Takeover
    } else if let Some(conversation) = most_recent_conversation {
        InitialScreen::Conversation(conversation)
    } else if pending_connection_requests > 0 {
        InitialScreen::ConnectionRequests
    } else {
        InitialScreen::None
    }
}

pub struct InitializationOrchestrator {
    config: Arc<LifecycleConfig>,
    deps: Collaborators,
    bus: EventBus,
    coordinator: Arc<SingleInstanceCoordinator>,
    controller: Arc<LifecycleController>,
    classifier: FailureClassifier,
    launch: LaunchContext,
    instance_id: InstanceId,
    state: InitState,
    progress: ProgressTracker,
    telemetry: InitTelemetry,
    tasks: TaskPool,
}

impl InitializationOrchestrator {
    pub fn new(
        config: Arc<LifecycleConfig>,
        deps: Collaborators,
        registry: Arc<InstanceRegistry>,
        launch: LaunchContext,
    ) -> Self {
        let bus = EventBus::new(config.event_bus_capacity());
        let controller = Arc::new(LifecycleController::new(config.clone(), &deps, bus.clone()));
        let classifier = FailureClassifier::new(
            deps.crash_reporter.clone(),
            deps.platform.clone(),
            config.app_version(),
        );

        Self {
            progress: ProgressTracker::new(deps.view.clone()),
            coordinator: Arc::new(SingleInstanceCoordinator::new(registry)),
            instance_id: InstanceId::new(),
            state: InitState::NotStarted,
            telemetry: InitTelemetry::new(),
            tasks: TaskPool::new(),
            config,
            deps,
            bus,
            controller,
            classifier,
            launch,
        }
    }

    pub fn state(&self) -> InitState {
        self.state
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.controller
    }

    pub fn coordinator(&self) -> &Arc<SingleInstanceCoordinator> {
        &self.coordinator
    }

    /// Runs the pipeline once. Failures are handed to the [`FailureClassifier`]
    /// together with whether this run started from a page reload.
    pub async fn run(&mut self) -> InitOutcome {
        if self.state != InitState::NotStarted {
            log::warn!("Ignoring run request, orchestrator already in {:?}", self.state);
            return InitOutcome::AlreadyStarted(self.state);
        }

        let was_reload = self.launch.is_reload();
        self.controller.listen_for_commands();

        // A tab that loses the session slot mid-startup must not go on loading
        let coordinator = self.coordinator.clone();
        let result = tokio::select! {
            biased;
            () = coordinator.superseded() => {
                log::warn!("Session was claimed by another instance during startup");
                Err(StartupError::Auth(AuthErrorKind::MultipleTabs))
            }
            result = self.run_pipeline() => result,
        };

        match result {
            Ok(()) => {
                self.watch_for_supersede();
                InitOutcome::FullyLoaded
            }
            Err(error) => {
                let failed_in = self.state;
                self.state = InitState::Failed;
                let phase = if failed_in >= InitState::ShowingInterface {
                    FailurePhase::SteadyState
                } else {
                    FailurePhase::Startup
                };
                let action = self
                    .classifier
                    .recover(&error, was_reload, phase, &self.controller)
                    .await;
                InitOutcome::Failed {
                    failed_in,
                    error,
                    action,
                }
            }
        }
    }

    /// Stops every background listener of this run.
    pub fn shutdown(&self) {
        self.tasks.cancel_all();
        self.controller.shutdown();
    }

    async fn run_pipeline(&mut self) -> Result<(), StartupError> {
        self.check_storage().await?;
        self.register_instance().await?;
        self.load_token().await?;
        let self_user = self.load_self_user().await?;
        let client = self.validate_client().await?;
        self.initialize_crypto(&client).await?;
        self.connect_stream(&client).await?;
        self.load_conversations(&self_user).await?;
        self.load_team().await?;
        self.load_users().await?;
        self.replay_notifications().await?;
        self.initialize_conversations().await?;
        self.update_clients().await?;
        self.show_interface()?;
        self.finish_loading().await
    }

    fn enter(&mut self, next: InitState) -> Result<(), StartupError> {
        if !self.state.can_advance_to(next) {
            return Err(StartupError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        log::debug!("Init state {:?} -> {next:?}", self.state);
        self.state = next;
        Ok(())
    }

    pub(crate) async fn check_storage(&mut self) -> Result<(), StartupError> {
        self.enter(InitState::CheckingStorage)?;
        self.deps.storage.check_available().await
    }

    pub(crate) async fn register_instance(&mut self) -> Result<(), StartupError> {
        self.enter(InitState::RegisteringInstance)?;
        if !self.coordinator.register_instance(self.instance_id).await {
            return Err(StartupError::Auth(AuthErrorKind::MultipleTabs));
        }

        let coordinator = self.coordinator.clone();
        let mut unload = self.deps.platform.on_before_unload();
        self.tasks.execute("instance_release", async move {
            if unload.next().await {
                coordinator.deregister_instance().await;
            }
        });
        Ok(())
    }

    fn watch_for_supersede(&self) {
        let coordinator = self.coordinator.clone();
        let controller = Arc::downgrade(&self.controller);
        self.tasks.execute("supersede_listener", async move {
            coordinator.superseded().await;
            log::warn!("Session was claimed by another instance");
            if let Some(controller) = controller.upgrade() {
                controller
                    .redirect_to_login(SignOutReason::MultipleTabs)
                    .await;
            }
        });
    }

    pub(crate) async fn load_token(&mut self) -> Result<(), StartupError> {
        self.enter(InitState::LoadingToken)?;
        if self.launch.use_cached_token() {
            self.deps.auth.get_cached_access_token().await?;
        } else {
            self.deps.auth.get_access_token().await?;
        }
        self.progress.report(Checkpoint::ReceivedAccessToken);
        self.telemetry.time_step(TimingStep::ReceivedAccessToken);
        Ok(())
    }

    pub(crate) async fn load_self_user(&mut self) -> Result<SelfUser, StartupError> {
        self.enter(InitState::LoadingSelfUser)?;
        let (self_user, ()) = futures::try_join!(
            self.initiate_self_user(),
            self.deps.schema.load_protocol_schema(self.config.app_version()),
        )?;
        self.progress.report(Checkpoint::ReceivedSelfUser);
        self.telemetry.time_step(TimingStep::ReceivedSelfUser);
        Ok(self_user)
    }

    async fn initiate_self_user(&self) -> Result<SelfUser, StartupError> {
        let self_user = self.deps.users.get_self().await?;
        log::info!("Loaded self user with ID '{}'", self_user.id);

        if !self_user.activated_identity {
            log::info!("User does not have an activated identity and seems to be a temporary guest");
            if !self_user.temporary_guest {
                return Err(StartupError::InactiveIdentity);
            }
        }

        self.deps.storage.init_for_user(&self_user.id).await?;
        self.deps.clients.init(&self_user).await?;
        self.deps.properties.init(&self_user).await?;

        if self_user.activated_identity {
            if !self_user.has_picture {
                self.deps.users.set_default_picture().await?;
            }
            if self_user.username.is_none() {
                self.deps.users.request_username_suggestion().await?;
            }
        }
        Ok(self_user)
    }

    pub(crate) async fn validate_client(&mut self) -> Result<LocalClient, StartupError> {
        self.enter(InitState::ValidatingClient)?;
        let client = self.deps.clients.get_valid_local_client().await?;
        self.deps.clients.get_clients_for_self().await?;

        self.progress.report(Checkpoint::ValidatedClient);
        self.telemetry.time_step(TimingStep::ValidatedClient);
        self.telemetry
            .add_label(InitStatistic::ClientType, client.client_type.as_str());
        Ok(client)
    }

    pub(crate) async fn initialize_crypto(&mut self, client: &LocalClient) -> Result<(), StartupError> {
        self.enter(InitState::InitializingCrypto)?;
        self.deps.cryptography.load_sessions(client).await?;
        self.progress.report(Checkpoint::InitializedCryptography);
        self.telemetry.time_step(TimingStep::InitializedCryptography);
        Ok(())
    }

    pub(crate) async fn connect_stream(&mut self, client: &LocalClient) -> Result<(), StartupError> {
        self.enter(InitState::ConnectingStream)?;
        self.deps.events.connect(client).await
    }

    pub(crate) async fn load_conversations(&mut self, self_user: &SelfUser) -> Result<(), StartupError> {
        self.enter(InitState::LoadingConversations)?;
        let (conversations, connections) = futures::try_join!(
            self.deps.conversations.get_conversations(),
            self.deps.connections.get_connections(),
        )?;

        self.progress.report(Checkpoint::ReceivedUserData);
        self.telemetry.time_step(TimingStep::ReceivedUserData);
        self.telemetry
            .add_count(InitStatistic::Conversations, conversations, 50);
        self.telemetry
            .add_count(InitStatistic::Connections, connections, 50);

        self.deps.conversations.map_connections();
        self.subscribe_to_unload(self_user.activated_identity);
        Ok(())
    }

    fn subscribe_to_unload(&self, activated_account: bool) {
        let deps = self.deps.clone();
        let mut unload = deps.platform.on_before_unload();
        self.tasks.execute("unload_teardown", async move {
            if !unload.next().await {
                return;
            }
            log::info!("Page unload triggered, disconnecting from the backend");
            deps.events
                .disconnect(StreamChangeTrigger::PageNavigation)
                .await;
            deps.session.leave_call_on_unload().await;

            if activated_account {
                deps.storage.terminate("page unload").await;
            } else {
                deps.conversations.leave_guest_room().await;
                if let Err(e) = deps.storage.delete_database().await {
                    log::error!("Failed to delete guest database on unload: {e}");
                }
            }

            deps.session.clear_notifications().await;
        });
    }

    pub(crate) async fn load_team(&mut self) -> Result<(), StartupError> {
        self.enter(InitState::LoadingTeam)?;
        self.deps.team.get_team().await
    }

    pub(crate) async fn load_users(&mut self) -> Result<(), StartupError> {
        self.enter(InitState::LoadingUsers)?;
        self.deps.users.load_users().await
    }

    pub(crate) async fn replay_notifications(&mut self) -> Result<(), StartupError> {
        self.enter(InitState::ReplayingNotifications)?;
        let notifications = self.deps.events.initialize_from_stream().await?;
        log::info!("Replayed {notifications} notifications from the backlog");
        self.telemetry.time_step(TimingStep::UpdatedFromNotifications);
        self.telemetry
            .add_count(InitStatistic::Notifications, notifications, 100);
        Ok(())
    }

    pub(crate) async fn initialize_conversations(&mut self) -> Result<(), StartupError> {
        self.enter(InitState::InitializingConversations)?;
        self.deps.conversations.initialize_conversations().await?;
        self.progress.report(Checkpoint::UpdatedFromNotifications);

        let watcher = Arc::new(ConnectivityWatcher::new(
            self.deps.platform.clone(),
            self.deps.events.clone(),
            self.deps.connectivity.clone(),
            self.bus.clone(),
        ));
        watcher.start(&self.tasks);
        Ok(())
    }

    pub(crate) async fn update_clients(&mut self) -> Result<(), StartupError> {
        self.enter(InitState::UpdatingClients)?;
        let clients = self.deps.clients.update_clients_for_self().await?;
        self.progress.report(Checkpoint::UpdatedClients);

        self.telemetry
            .add_count(InitStatistic::Clients, clients.len(), 0);
        self.telemetry.time_step(TimingStep::AppPreLoaded);
        self.deps.users.set_self_devices(clients);
        log::info!("App pre-loading completed");
        Ok(())
    }

    pub(crate) fn show_interface(&mut self) -> Result<InitialScreen, StartupError> {
        self.enter(InitState::ShowingInterface)?;
        let users = &self.deps.users;
        let screen = decide_initial_screen(
            users.is_temporary_guest(),
            users.should_change_username(),
            self.deps.conversations.most_recent_conversation(),
            users.pending_connection_requests(),
        );

        log::info!("Showing application UI");
        self.deps.view.show_initial_screen(&screen);
        self.progress.report(Checkpoint::InterfaceShown);
        self.deps.view.remove_loading();

        self.telemetry.report();
        self.bus.publish(LifecycleEvent::Loaded);
        self.telemetry.time_step(TimingStep::AppLoaded);

        let properties = self.deps.properties.clone();
        let session = self.deps.session.clone();
        let delay = self.config.notification_check_delay();
        self.tasks.execute("permission_checks", async move {
            match properties.check_privacy_permission().await {
                Ok(()) => {
                    tokio::time::sleep(delay).await;
                    session.check_notification_permission().await;
                }
                Err(e) => log::warn!("Privacy permission check failed: {e}"),
            }
        });
        Ok(screen)
    }

    pub(crate) async fn finish_loading(&mut self) -> Result<(), StartupError> {
        self.deps
            .conversations
            .update_conversations_on_app_init()
            .await?;
        self.telemetry.time_step(TimingStep::UpdatedConversations);

        self.deps.session.init_lifecycle().await;
        self.deps.session.init_audio().await;
        self.deps.conversations.cleanup_conversations().await;

        self.enter(InitState::FullyLoaded)?;
        log::info!("App fully loaded");
        Ok(())
    }
}
