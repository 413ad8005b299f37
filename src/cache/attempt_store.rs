use super::error::CacheError;
use super::RedisPool;
use crate::services::session::store::{AttemptKey, AttemptStore, StoreResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error};

/// [`AttemptStore`] on Redis. Markers use `SET NX` so two processes cannot
/// both claim the same collection.
#[derive(Clone)]
pub struct RedisAttemptStore {
    pool: RedisPool,
    scope: Option<String>,
}

impl RedisAttemptStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool, scope: None }
    }

    pub fn scoped(&self, scope: impl Into<String>) -> Self {
        Self {
            pool: self.pool.clone(),
            scope: Some(scope.into()),
        }
    }

    fn render(&self, key: &AttemptKey) -> String {
        key.stored(self.scope.as_deref()).to_string()
    }

    async fn connection(
        &self,
    ) -> Result<bb8::PooledConnection<'_, bb8_redis::RedisConnectionManager>, CacheError> {
        self.pool.get().await.map_err(|e| {
            error!("Failed to get Redis connection: {}", e);
            CacheError::from(e)
        })
    }
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn get(&self, key: &AttemptKey) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(self.render(key))
            .query_async(&mut *conn)
            .await
            .map_err(CacheError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &AttemptKey, value: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(self.render(key))
            .arg(value)
            .query_async(&mut *conn)
            .await
            .map_err(CacheError::from)?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &AttemptKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let rendered = self.render(key);
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(&rendered).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
        }
        let written: Option<String> = cmd
            .query_async(&mut *conn)
            .await
            .map_err(CacheError::from)?;
        debug!(key = %rendered, written = written.is_some(), "SET NX");
        Ok(written.is_some())
    }

    async fn remove(&self, key: &AttemptKey) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL")
            .arg(self.render(key))
            .query_async(&mut *conn)
            .await
            .map_err(CacheError::from)?;
        Ok(())
    }
}
