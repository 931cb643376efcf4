use std::sync::Arc;

use crate::collaborators::LoadingView;

/// Progress update consumed by the loading screen; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub percent: f32,
    pub message: Option<String>,
}

/// Fixed progress checkpoints of the startup pipeline, in reporting order.
///
/// The view depends on these exact percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Checkpoint {
    ReceivedAccessToken,
    ReceivedSelfUser,
    ValidatedClient,
    InitializedCryptography,
    ReceivedUserData,
    UpdatedFromNotifications,
    UpdatedClients,
    InterfaceShown,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 8] = [
        Checkpoint::ReceivedAccessToken,
        Checkpoint::ReceivedSelfUser,
        Checkpoint::ValidatedClient,
        Checkpoint::InitializedCryptography,
        Checkpoint::ReceivedUserData,
        Checkpoint::UpdatedFromNotifications,
        Checkpoint::UpdatedClients,
        Checkpoint::InterfaceShown,
    ];

    pub fn percent(self) -> f32 {
        match self {
            Checkpoint::ReceivedAccessToken => 2.5,
            Checkpoint::ReceivedSelfUser => 5.0,
            Checkpoint::ValidatedClient => 7.5,
            Checkpoint::InitializedCryptography => 10.0,
            Checkpoint::ReceivedUserData => 25.0,
            Checkpoint::UpdatedFromNotifications => 97.5,
            Checkpoint::UpdatedClients => 99.0,
            Checkpoint::InterfaceShown => 100.0,
        }
    }

    pub fn message(self) -> Option<&'static str> {
        match self {
            Checkpoint::ReceivedSelfUser => Some("Loading your profile"),
            Checkpoint::ValidatedClient => Some("Verifying this device"),
            Checkpoint::ReceivedUserData => Some("Loading conversations"),
            Checkpoint::UpdatedFromNotifications => Some("Catching up on messages"),
            _ => None,
        }
    }
}

/// Forwards checkpoints to the view, refusing to go backwards.
pub struct ProgressTracker {
    view: Arc<dyn LoadingView>,
    last: Option<Checkpoint>,
}

impl ProgressTracker {
    pub fn new(view: Arc<dyn LoadingView>) -> Self {
        Self { view, last: None }
    }

    pub fn last(&self) -> Option<Checkpoint> {
        self.last
    }

    pub fn report(&mut self, checkpoint: Checkpoint) -> Option<ProgressReport> {
        if self.last.is_some_and(|last| checkpoint <= last) {
            log::warn!(
                "Ignoring progress checkpoint {checkpoint:?}, already at {:?}",
                self.last
            );
            return None;
        }

        let report = ProgressReport {
            percent: checkpoint.percent(),
            message: checkpoint.message().map(str::to_string),
        };
        log::debug!("Init progress {}%", report.percent);
        self.view.update_progress(&report);
        self.last = Some(checkpoint);
        Some(report)
    }
}
