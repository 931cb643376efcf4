use tokio::sync::broadcast;

use crate::sign_out::SignOutReason;

/// Warning banners the view layer can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    NoInternet,
    ConnectivityReconnect,
    LifecycleUpdate,
}

/// Signals carried on the process-wide [`EventBus`].
///
/// The first group is published by the lifecycle core; the requests at the
/// bottom are published by other parts of the application and handled by the
/// [`LifecycleController`](crate::controller::LifecycleController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Loaded,
    /// Asks the desktop shell to restart the web app.
    RestartRequested,
    SignedOut { clear_data: bool },
    ShowWarning(WarningKind),
    DismissWarning(WarningKind),

    RefreshRequested,
    SignOutRequested {
        reason: SignOutReason,
        clear_data: bool,
    },
    UpdateFound,
}

/// Publish/subscribe channel for lifecycle signals.
///
/// Cloning the bus shares the underlying channel. Events published while no
/// subscriber exists are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: LifecycleEvent) {
        log::debug!("Publishing lifecycle event {event:?}");
        if self.sender.send(event).is_err() {
            log::trace!("No subscribers for lifecycle event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
