use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::collaborators::{
    ConnectivityProbe, ConnectivityTrigger, EventRepository, StreamChangeTrigger,
};
use crate::events::{EventBus, LifecycleEvent, WarningKind};
use crate::platform::{PlatformSignal, PlatformSignals};
use crate::taskpool::TaskPool;

/// Keeps the realtime stream and the connectivity warnings in line with the
/// device's online/offline signal.
pub struct ConnectivityWatcher {
    platform: Arc<dyn PlatformSignals>,
    events: Arc<dyn EventRepository>,
    probe: Arc<dyn ConnectivityProbe>,
    bus: EventBus,
}

impl ConnectivityWatcher {
    pub fn new(
        platform: Arc<dyn PlatformSignals>,
        events: Arc<dyn EventRepository>,
        probe: Arc<dyn ConnectivityProbe>,
        bus: EventBus,
    ) -> Self {
        Self {
            platform,
            events,
            probe,
            bus,
        }
    }

    pub fn start(self: Arc<Self>, tasks: &TaskPool) {
        log::info!("Watching internet connectivity status");
        let mut signals = self.platform.subscribe();
        tasks.execute("connectivity_watcher", async move {
            loop {
                match signals.recv().await {
                    Ok(PlatformSignal::Offline) => self.on_connection_lost().await,
                    Ok(PlatformSignal::Online) => self.on_connection_gained().await,
                    Ok(PlatformSignal::BeforeUnload) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Connectivity watcher lagged by {skipped} signals");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    pub async fn on_connection_lost(&self) {
        log::warn!("Internet connection lost");
        self.events.disconnect(StreamChangeTrigger::Offline).await;
        self.bus
            .publish(LifecycleEvent::ShowWarning(WarningKind::NoInternet));
    }

    pub async fn on_connection_gained(&self) {
        log::info!("Internet connection regained. Re-establishing realtime stream...");
        self.probe
            .run_when_online(ConnectivityTrigger::ConnectionRegained)
            .await;
        self.bus
            .publish(LifecycleEvent::DismissWarning(WarningKind::NoInternet));
        self.bus.publish(LifecycleEvent::ShowWarning(
            WarningKind::ConnectivityReconnect,
        ));
        self.events.reconnect(StreamChangeTrigger::Online).await;
    }
}
