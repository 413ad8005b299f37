use crate::services::session::store::{AttemptKey, AttemptStore, StoreError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const PROCESSED_VALUE: &str = "true";

/// Keeps completion single-flight per collection.
///
/// Two layers: an in-process set of collections being completed right now,
/// and a persisted marker that other sessions and restarts also see. Both
/// are released on every exit from completion. The marker also expires after
/// `marker_ttl` so a process that dies mid-completion cannot pin it.
pub struct IdempotencyGuard {
    store: Arc<dyn AttemptStore>,
    marker_ttl: Duration,
    in_flight: Mutex<HashSet<String>>,
    consumed_references: Mutex<HashSet<String>>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn AttemptStore>, marker_ttl: Duration) -> Self {
        Self {
            store,
            marker_ttl,
            in_flight: Mutex::new(HashSet::new()),
            consumed_references: Mutex::new(HashSet::new()),
        }
    }

    /// Claims `collection_no` for completion. `Ok(false)` means another
    /// completion already holds it.
    pub async fn try_acquire(&self, collection_no: &str) -> Result<bool, StoreError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(collection_no.to_string()) {
                debug!(collection_no = collection_no, "completion already in flight");
                return Ok(false);
            }
        }

        let claimed = self
            .store
            .set_if_absent(
                &AttemptKey::processed(collection_no),
                PROCESSED_VALUE,
                Some(self.marker_ttl),
            )
            .await;

        match claimed {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.in_flight.lock().await.remove(collection_no);
                debug!(collection_no = collection_no, "collection already marked processed");
                Ok(false)
            }
            Err(e) => {
                self.in_flight.lock().await.remove(collection_no);
                Err(e)
            }
        }
    }

    /// Drops both layers for `collection_no`. Safe to call when nothing is
    /// held.
    pub async fn release(&self, collection_no: &str) {
        self.in_flight.lock().await.remove(collection_no);
        if let Err(e) = self
            .store
            .remove(&AttemptKey::processed(collection_no))
            .await
        {
            warn!(
                collection_no = collection_no,
                error = %e,
                "failed to clear processed marker"
            );
        }
    }

    pub async fn is_in_flight(&self, collection_no: &str) -> bool {
        self.in_flight.lock().await.contains(collection_no)
    }

    pub async fn is_marked(&self, collection_no: &str) -> Result<bool, StoreError> {
        Ok(self
            .store
            .get(&AttemptKey::processed(collection_no))
            .await?
            .is_some())
    }

    /// Records a checkout success reference. Returns false if it was
    /// already seen.
    pub async fn consume_reference(&self, reference: &str) -> bool {
        self.consumed_references
            .lock()
            .await
            .insert(reference.to_string())
    }

    pub async fn forget_references(&self) {
        self.consumed_references.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::store::MemoryAttemptStore;

    const TTL: Duration = Duration::from_secs(60);

    fn guard() -> (IdempotencyGuard, MemoryAttemptStore) {
        let store = MemoryAttemptStore::new();
        (IdempotencyGuard::new(Arc::new(store.clone()), TTL), store)
    }

    #[tokio::test]
    async fn second_acquire_is_refused_until_release() {
        let (guard, _) = guard();
        assert!(guard.try_acquire("COL-1").await.unwrap());
        assert!(!guard.try_acquire("COL-1").await.unwrap());
        assert!(guard.is_in_flight("COL-1").await);
        assert!(guard.is_marked("COL-1").await.unwrap());

        guard.release("COL-1").await;
        assert!(!guard.is_in_flight("COL-1").await);
        assert!(!guard.is_marked("COL-1").await.unwrap());
        assert!(guard.try_acquire("COL-1").await.unwrap());
    }

    #[tokio::test]
    async fn persisted_marker_blocks_a_fresh_guard() {
        let store = MemoryAttemptStore::new();
        let first = IdempotencyGuard::new(Arc::new(store.scoped("tab-1")), TTL);
        let second = IdempotencyGuard::new(Arc::new(store.scoped("tab-2")), TTL);

        assert!(first.try_acquire("COL-7").await.unwrap());
        assert!(!second.try_acquire("COL-7").await.unwrap());
        assert!(!second.is_in_flight("COL-7").await);

        first.release("COL-7").await;
        assert!(second.try_acquire("COL-7").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn marker_left_by_a_dead_process_expires() {
        let store = MemoryAttemptStore::new();
        let crashed = IdempotencyGuard::new(Arc::new(store.scoped("old")), TTL);
        assert!(crashed.try_acquire("COL-8").await.unwrap());
        drop(crashed);

        let restarted = IdempotencyGuard::new(Arc::new(store.scoped("new")), TTL);
        assert!(!restarted.try_acquire("COL-8").await.unwrap());

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert!(!restarted.is_marked("COL-8").await.unwrap());
        assert!(restarted.try_acquire("COL-8").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_acquires_let_exactly_one_through() {
        let (guard, _) = guard();
        let guard = Arc::new(guard);
        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                tokio::spawn(async move { guard.try_acquire("COL-3").await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn references_are_consumed_once() {
        let (guard, _) = guard();
        assert!(guard.consume_reference("REF-1").await);
        assert!(!guard.consume_reference("REF-1").await);
        guard.forget_references().await;
        assert!(guard.consume_reference("REF-1").await);
    }

    #[tokio::test]
    async fn release_without_acquire_is_harmless() {
        let (guard, store) = guard();
        guard.release("COL-unknown").await;
        assert!(store.is_empty().await);
    }
}
