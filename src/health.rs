//! Health check module
//! Reports on the collections backend and, when configured, the attempt store

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::payments::gateway::CollectionGateway;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

type ProbeResult = Result<u128, Box<dyn std::error::Error + Send + Sync>>;

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    gateway: Arc<dyn CollectionGateway>,
    #[cfg(feature = "cache")]
    cache: Option<crate::cache::RedisPool>,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(gateway: Arc<dyn CollectionGateway>) -> Self {
        Self {
            gateway,
            #[cfg(feature = "cache")]
            cache: None,
            probe_timeout: Duration::from_secs(5),
        }
    }

    #[cfg(feature = "cache")]
    pub fn with_cache(mut self, pool: crate::cache::RedisPool) -> Self {
        self.cache = Some(pool);
        self
    }

    /// The backend is required. A failing attempt store only degrades
    /// the service since completion still runs without durable markers.
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();

        let backend = self
            .probe("backend", check_backend_health(self.gateway.as_ref()))
            .await;
        let backend_up = backend.status == ComponentState::Up;
        health_status.checks.insert("backend".to_string(), backend);

        #[allow(unused_mut)]
        let mut cache_up = true;
        #[cfg(feature = "cache")]
        if let Some(pool) = &self.cache {
            let cache = self.probe("cache", check_cache_health(pool)).await;
            cache_up = cache.status == ComponentState::Up;
            health_status.checks.insert("cache".to_string(), cache);
        }

        health_status.status = match (backend_up, cache_up) {
            (true, true) => HealthState::Healthy,
            (true, false) => HealthState::Degraded,
            (false, _) => HealthState::Unhealthy,
        };

        health_status
    }

    async fn probe<F>(&self, name: &str, check: F) -> ComponentHealth
    where
        F: std::future::Future<Output = ProbeResult>,
    {
        match timeout(self.probe_timeout, check).await {
            Ok(Ok(response_time)) => {
                info!("{} health check: OK ({}ms)", name, response_time);
                ComponentHealth::up(Some(response_time))
            }
            Ok(Err(e)) => {
                error!("{} health check failed: {}", name, e);
                ComponentHealth::down(Some(e.to_string()))
            }
            Err(_) => {
                error!("{} health check timed out", name);
                ComponentHealth::down(Some("Timeout".to_string()))
            }
        }
    }
}

pub async fn check_backend_health(gateway: &dyn CollectionGateway) -> ProbeResult {
    let start = Instant::now();
    gateway.list_collection_types().await?;
    Ok(start.elapsed().as_millis())
}

#[cfg(feature = "cache")]
pub async fn check_cache_health(pool: &crate::cache::RedisPool) -> ProbeResult {
    let start = Instant::now();
    crate::cache::health_check(pool).await?;
    Ok(start.elapsed().as_millis())
}
