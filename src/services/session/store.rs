//! Durable attempt state that survives a page reload or process restart.

use crate::cache::keys::attempt::StoredKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub const CURRENT_COLLECTION_NO: &str = "currentCollectionNo";
pub const CURRENT_COLLECTION_REFERENCE: &str = "currentCollectionReference";
pub const CURRENT_ATTEMPT: &str = "currentAttempt";
pub const PROCESSED_PREFIX: &str = "processed_";

/// Keys an attempt persists
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttemptKey {
    CurrentCollectionNo,
    CurrentCollectionReference,
    /// JSON of the attempt, enough to rebuild it after a restart
    CurrentAttempt,
    /// Marks a collection whose completion is in progress
    Processed(String),
}

impl AttemptKey {
    pub fn processed(collection_no: impl Into<String>) -> Self {
        AttemptKey::Processed(collection_no.into())
    }

    pub fn name(&self) -> String {
        match self {
            AttemptKey::CurrentCollectionNo => CURRENT_COLLECTION_NO.to_string(),
            AttemptKey::CurrentCollectionReference => CURRENT_COLLECTION_REFERENCE.to_string(),
            AttemptKey::CurrentAttempt => CURRENT_ATTEMPT.to_string(),
            AttemptKey::Processed(no) => format!("{}{}", PROCESSED_PREFIX, no),
        }
    }

    /// Processed markers are shared by every session so a collection cannot
    /// be completed twice from two tabs.
    pub fn is_session_scoped(&self) -> bool {
        !matches!(self, AttemptKey::Processed(_))
    }

    pub fn stored(&self, scope: Option<&str>) -> StoredKey {
        let scope = scope.filter(|_| self.is_session_scoped());
        StoredKey::new(scope.map(str::to_string), self.name())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("attempt store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn get(&self, key: &AttemptKey) -> StoreResult<Option<String>>;

    async fn set(&self, key: &AttemptKey, value: &str) -> StoreResult<()>;

    /// Writes only when the key is absent. Returns whether it wrote. With a
    /// `ttl` the entry disappears on its own once it elapses.
    async fn set_if_absent(
        &self,
        key: &AttemptKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool>;

    async fn remove(&self, key: &AttemptKey) -> StoreResult<()>;
}

/// In-process store. Clones made with [`MemoryAttemptStore::scoped`] share
/// the same map, so processed markers are visible across sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttemptStore {
    entries: Arc<RwLock<HashMap<String, StoredValue>>>,
    scope: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scoped(&self, scope: impl Into<String>) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            scope: Some(scope.into()),
        }
    }

    fn render(&self, key: &AttemptKey) -> String {
        key.stored(self.scope.as_deref()).to_string()
    }

    /// Live entries across every scope
    pub async fn len(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|v| v.is_live())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn get(&self, key: &AttemptKey) -> StoreResult<Option<String>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&self.render(key))
            .filter(|v| v.is_live())
            .map(|v| v.value.clone()))
    }

    async fn set(&self, key: &AttemptKey, value: &str) -> StoreResult<()> {
        self.entries.write().await.insert(
            self.render(key),
            StoredValue {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &AttemptKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let mut entries = self.entries.write().await;
        let rendered = self.render(key);
        if entries.get(&rendered).is_some_and(StoredValue::is_live) {
            return Ok(false);
        }
        entries.insert(
            rendered,
            StoredValue {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn remove(&self, key: &AttemptKey) -> StoreResult<()> {
        self.entries.write().await.remove(&self.render(key));
        Ok(())
    }
}
