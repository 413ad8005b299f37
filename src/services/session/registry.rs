use super::controller::{PaymentSessionController, SessionConfig};
use super::store::{AttemptStore, MemoryAttemptStore, StoreError};
use crate::payments::checkout::CheckoutLauncher;
use crate::payments::gateway::CollectionGateway;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Where sessions keep their attempt state
#[derive(Clone)]
pub enum StoreProvider {
    Memory(MemoryAttemptStore),
    #[cfg(feature = "cache")]
    Redis(crate::cache::attempt_store::RedisAttemptStore),
}

impl StoreProvider {
    pub fn for_session(&self, session_id: &Uuid) -> Arc<dyn AttemptStore> {
        let scope = format!("session:{}", session_id);
        match self {
            StoreProvider::Memory(store) => Arc::new(store.scoped(scope)),
            #[cfg(feature = "cache")]
            StoreProvider::Redis(store) => Arc::new(store.scoped(scope)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreProvider::Memory(_) => "memory",
            #[cfg(feature = "cache")]
            StoreProvider::Redis(_) => "redis",
        }
    }
}

struct SessionEntry {
    controller: PaymentSessionController,
    last_seen: Instant,
}

/// Live payment sessions, one per donor browser tab
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    gateway: Arc<dyn CollectionGateway>,
    checkout: Arc<dyn CheckoutLauncher>,
    stores: StoreProvider,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(
        gateway: Arc<dyn CollectionGateway>,
        checkout: Arc<dyn CheckoutLauncher>,
        stores: StoreProvider,
        config: SessionConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            gateway,
            checkout,
            stores,
            config,
        }
    }

    fn build(&self, id: &Uuid) -> PaymentSessionController {
        PaymentSessionController::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.checkout),
            self.stores.for_session(id),
            self.config.clone(),
        )
    }

    pub async fn create(&self) -> (Uuid, PaymentSessionController) {
        let id = Uuid::new_v4();
        let controller = self.build(&id);
        self.sessions.write().await.insert(
            id,
            SessionEntry {
                controller: controller.clone(),
                last_seen: Instant::now(),
            },
        );
        info!(session_id = %id, store = self.stores.kind(), "payment session opened");
        (id, controller)
    }

    /// Live session lookup. Counts as activity for idle eviction.
    pub async fn get(&self, id: &Uuid) -> Option<PaymentSessionController> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry.controller.clone())
    }

    /// Live session, or one rebuilt from the attempt store after a restart or
    /// an idle eviction. `None` when the store knows nothing about `id`.
    pub async fn resume(&self, id: &Uuid) -> Result<Option<PaymentSessionController>, StoreError> {
        if let Some(controller) = self.get(id).await {
            return Ok(Some(controller));
        }

        let controller = self.build(id);
        if controller.restore().await?.is_none() {
            return Ok(None);
        }

        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(*id).or_insert_with(|| SessionEntry {
            controller,
            last_seen: Instant::now(),
        });
        info!(session_id = %id, "payment session resumed");
        Ok(Some(entry.controller.clone()))
    }

    /// Abandons any attempt, live or persisted, and forgets the session.
    pub async fn remove(&self, id: &Uuid) -> Result<bool, StoreError> {
        let removed = self.sessions.write().await.remove(id);
        let controller = match removed {
            Some(entry) => entry.controller,
            None => {
                let controller = self.build(id);
                if controller.restore().await?.is_none() {
                    return Ok(false);
                }
                controller
            }
        };

        controller.abandon().await;
        info!(session_id = %id, "payment session closed");
        Ok(true)
    }

    /// Suspends and drops sessions untouched for `idle_ttl`. Unconfirmed
    /// attempts stay in the store and can be resumed. Sessions that are
    /// mid-submission or mid-completion are skipped until a later sweep.
    pub async fn evict_idle(&self, idle_ttl: Duration) -> usize {
        let idle: Vec<(Uuid, PaymentSessionController)> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.last_seen.elapsed() >= idle_ttl)
            .map(|(id, entry)| (*id, entry.controller.clone()))
            .collect();

        let mut evicted = 0;
        for (id, controller) in idle {
            if !controller.suspend().await {
                debug!(session_id = %id, "idle session busy, eviction deferred");
                continue;
            }

            let mut sessions = self.sessions.write().await;
            let still_idle = sessions
                .get(&id)
                .is_some_and(|entry| entry.last_seen.elapsed() >= idle_ttl);
            if still_idle {
                sessions.remove(&id);
                evicted += 1;
                debug!(session_id = %id, "idle payment session evicted");
            }
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
