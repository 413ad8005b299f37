//! Redis-backed storage for attempt state
//!
//! Sessions keep their attempt identifiers and processed markers here when a
//! Redis URL is configured, so a reload or restart can find a pending
//! collection. Without Redis the in-process store is used instead.

pub mod error;
pub mod keys;

#[cfg(feature = "cache")]
pub mod attempt_store;

#[cfg(feature = "cache")]
pub use pool::*;

#[cfg(feature = "cache")]
mod pool {
    use super::error::CacheError;
    use bb8::Pool;
    use bb8_redis::RedisConnectionManager;
    use std::time::Duration;
    use tracing::{error, info, warn};

    /// Redis connection pool type alias
    pub type RedisPool = Pool<RedisConnectionManager>;

    /// Redis pool configuration
    #[derive(Debug, Clone)]
    pub struct CacheConfig {
        /// Redis connection URL
        pub redis_url: String,
        /// Maximum number of connections in the pool
        pub max_connections: u32,
        /// Minimum idle connections
        pub min_idle: u32,
        /// Connection timeout
        pub connection_timeout: Duration,
    }

    impl Default for CacheConfig {
        fn default() -> Self {
            Self {
                redis_url: "redis://127.0.0.1:6379".to_string(),
                max_connections: 10,
                min_idle: 1,
                connection_timeout: Duration::from_secs(5),
            }
        }
    }

    /// Initialize Redis connection pool
    pub async fn init_cache_pool(config: CacheConfig) -> Result<RedisPool, CacheError> {
        info!(
            "Initializing Redis attempt store pool: max_connections={}",
            config.max_connections
        );

        let manager = RedisConnectionManager::new(config.redis_url.clone()).map_err(|e| {
            error!("Failed to create Redis connection manager: {}", e);
            CacheError::ConnectionError(e.to_string())
        })?;

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| {
                error!("Failed to build Redis connection pool: {}", e);
                CacheError::ConnectionError(e.to_string())
            })?;

        if let Err(e) = health_check(&pool).await {
            warn!("Initial Redis connection test failed, but continuing: {}", e);
        }

        info!("Redis attempt store pool initialized");
        Ok(pool)
    }

    /// PING through a pooled connection
    pub async fn health_check(pool: &RedisPool) -> Result<(), CacheError> {
        let mut conn = pool.get().await.map_err(|e| {
            error!("Failed to get Redis connection for test: {}", e);
            CacheError::ConnectionError(e.to_string())
        })?;

        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| {
                error!("Redis PING failed: {}", e);
                CacheError::ConnectionError(e.to_string())
            })?;

        Ok(())
    }
}
