//! Keeps exactly one execution context authoritative per persisted session.
//!
//! Every context (tab, window) holds a [`SingleInstanceCoordinator`] sharing
//! one [`InstanceRegistry`]. Claims are compared by timestamp: the newest
//! claim wins, an older concurrent claim is rejected, and whichever context
//! loses its slot receives a supersede notification.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record asserting which context owns the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceClaim {
    pub instance_id: InstanceId,
    pub claimed_at: DateTime<Utc>,
}

type SupersedeNotifier = Arc<watch::Sender<bool>>;

#[derive(Default)]
struct RegistryState {
    claim: Option<InstanceClaim>,
    notifiers: HashMap<InstanceId, SupersedeNotifier>,
}

/// Process-wide slot shared by all contexts of one persisted session.
///
/// All reads and writes go through one lock, so no reader observes a
/// half-written claim.
#[derive(Default)]
pub struct InstanceRegistry {
    state: Mutex<RegistryState>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<InstanceClaim> {
        self.state.lock().await.claim.clone()
    }

    pub async fn is_authoritative(&self, instance_id: InstanceId) -> bool {
        self.state
            .lock()
            .await
            .claim
            .as_ref()
            .is_some_and(|claim| claim.instance_id == instance_id)
    }

    /// Stores `claim` unless a strictly newer claim is already authoritative.
    ///
    /// The context that ends up without the slot is notified, whether it is
    /// the previous holder or the rejected claimant.
    async fn claim(&self, claim: InstanceClaim, notifier: SupersedeNotifier) -> bool {
        let mut state = self.state.lock().await;

        if let Some(current) = &state.claim {
            if current.instance_id != claim.instance_id && current.claimed_at > claim.claimed_at {
                log::warn!(
                    "Rejecting stale instance claim {} ({}), {} claimed at {}",
                    claim.instance_id,
                    claim.claimed_at,
                    current.instance_id,
                    current.claimed_at
                );
                notifier.send_replace(true);
                return false;
            }
        }

        if let Some(previous) = state.claim.take() {
            if previous.instance_id != claim.instance_id {
                log::info!(
                    "Instance {} superseded by {}",
                    previous.instance_id,
                    claim.instance_id
                );
                if let Some(previous_notifier) = state.notifiers.remove(&previous.instance_id) {
                    previous_notifier.send_replace(true);
                }
            }
        }

        state.notifiers.insert(claim.instance_id, notifier);
        state.claim = Some(claim);
        true
    }

    /// Clears the slot if `instance_id` still holds it.
    async fn release(&self, instance_id: InstanceId) -> bool {
        let mut state = self.state.lock().await;
        state.notifiers.remove(&instance_id);
        let holds_claim = state
            .claim
            .as_ref()
            .is_some_and(|claim| claim.instance_id == instance_id);
        if holds_claim {
            state.claim = None;
        }
        holds_claim
    }
}

/// One context's view of the [`InstanceRegistry`].
pub struct SingleInstanceCoordinator {
    registry: Arc<InstanceRegistry>,
    registered: StdMutex<Option<InstanceId>>,
    superseded: SupersedeNotifier,
}

impl SingleInstanceCoordinator {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        let (superseded, _) = watch::channel(false);
        Self {
            registry,
            registered: StdMutex::new(None),
            superseded: Arc::new(superseded),
        }
    }

    /// Claims the session for `instance_id`; `true` means this context is now authoritative.
    pub async fn register_instance(&self, instance_id: InstanceId) -> bool {
        self.register_claim(InstanceClaim {
            instance_id,
            claimed_at: Utc::now(),
        })
        .await
    }

    pub async fn register_claim(&self, claim: InstanceClaim) -> bool {
        let instance_id = claim.instance_id;
        if !self.registry.claim(claim, self.superseded.clone()).await {
            return false;
        }

        // Let concurrent claims land before confirming ownership
        tokio::task::yield_now().await;

        let authoritative = self.registry.is_authoritative(instance_id).await;
        if authoritative {
            log::info!("Registered single instance {instance_id}");
            if let Ok(mut registered) = self.registered.lock() {
                *registered = Some(instance_id);
            }
        } else {
            log::warn!("Instance {instance_id} lost the claim to a concurrent registration");
        }
        authoritative
    }

    /// Releases this context's claim, if any.
    pub async fn deregister_instance(&self) {
        let instance_id = self
            .registered
            .lock()
            .ok()
            .and_then(|mut registered| registered.take());

        if let Some(instance_id) = instance_id {
            if self.registry.release(instance_id).await {
                log::info!("Released single instance claim {instance_id}");
            }
        }
    }

    pub fn registered_instance(&self) -> Option<InstanceId> {
        self.registered.lock().ok().and_then(|registered| *registered)
    }

    pub fn is_superseded(&self) -> bool {
        *self.superseded.borrow()
    }

    /// Resolves once another context has taken (or kept) the session slot.
    pub async fn superseded(&self) {
        let mut receiver = self.superseded.subscribe();
        let closed = receiver.wait_for(|superseded| *superseded).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
