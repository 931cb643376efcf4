//! Platform signal source.
//!
//! Hosts feed connectivity changes and page teardown into a [`SignalHub`];
//! the lifecycle core only sees the [`PlatformSignals`] trait, so it can run
//! without a real browser or desktop shell.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformSignal {
    Online,
    Offline,
    BeforeUnload,
}

/// A subscription to one kind of [`PlatformSignal`]. Dropping it unsubscribes.
pub struct SignalSubscription {
    receiver: broadcast::Receiver<PlatformSignal>,
    wanted: PlatformSignal,
}

impl SignalSubscription {
    pub fn new(receiver: broadcast::Receiver<PlatformSignal>, wanted: PlatformSignal) -> Self {
        Self { receiver, wanted }
    }

    /// Waits for the next matching signal. Returns `false` once the source is gone.
    pub async fn next(&mut self) -> bool {
        loop {
            match self.receiver.recv().await {
                Ok(signal) if signal == self.wanted => return true,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Platform signal subscriber lagged by {skipped} signals");
                }
                Err(RecvError::Closed) => return false,
            }
        }
    }
}

#[async_trait]
pub trait PlatformSignals: Send + Sync {
    fn connectivity(&self) -> Connectivity;

    fn subscribe(&self) -> broadcast::Receiver<PlatformSignal>;

    fn on_online(&self) -> SignalSubscription {
        SignalSubscription::new(self.subscribe(), PlatformSignal::Online)
    }

    fn on_offline(&self) -> SignalSubscription {
        SignalSubscription::new(self.subscribe(), PlatformSignal::Offline)
    }

    fn on_before_unload(&self) -> SignalSubscription {
        SignalSubscription::new(self.subscribe(), PlatformSignal::BeforeUnload)
    }

    fn is_online(&self) -> bool {
        self.connectivity() == Connectivity::Online
    }

    /// Resolves as soon as the device reports connectivity.
    ///
    /// Never resolves if the device stays offline and the signal source is dropped.
    async fn wait_until_online(&self) {
        let mut online = self.on_online();
        if self.is_online() {
            return;
        }
        if !online.next().await {
            std::future::pending::<()>().await;
        }
    }
}

/// Broadcast-backed [`PlatformSignals`] implementation driven by the host.
pub struct SignalHub {
    sender: broadcast::Sender<PlatformSignal>,
    online: AtomicBool,
}

impl SignalHub {
    pub fn new(initial: Connectivity) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            sender,
            online: AtomicBool::new(initial == Connectivity::Online),
        }
    }

    pub fn set_connectivity(&self, connectivity: Connectivity) {
        let online = connectivity == Connectivity::Online;
        self.online.store(online, Ordering::SeqCst);
        let signal = if online {
            PlatformSignal::Online
        } else {
            PlatformSignal::Offline
        };
        let _ = self.sender.send(signal);
    }

    pub fn before_unload(&self) {
        let _ = self.sender.send(PlatformSignal::BeforeUnload);
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new(Connectivity::Online)
    }
}

impl PlatformSignals for SignalHub {
    fn connectivity(&self) -> Connectivity {
        if self.online.load(Ordering::SeqCst) {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<PlatformSignal> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_until_online_returns_immediately_when_online() {
        let hub = SignalHub::new(Connectivity::Online);
        tokio::time::timeout(Duration::from_millis(100), hub.wait_until_online())
            .await
            .expect("should not wait while online");
    }

    #[tokio::test]
    async fn test_wait_until_online_waits_for_signal() {
        let hub = Arc::new(SignalHub::new(Connectivity::Offline));
        let waiter = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.wait_until_online().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        hub.set_connectivity(Connectivity::Online);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_subscription_filters_other_signals() {
        let hub = SignalHub::default();
        let mut unload = hub.on_before_unload();

        hub.set_connectivity(Connectivity::Offline);
        hub.before_unload();

        assert!(unload.next().await);
        assert!(!hub.is_online());
    }
}
