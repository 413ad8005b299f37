use crate::config::SessionSettings;
use crate::services::session::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionSweeperConfig {
    /// How often the worker looks for idle sessions
    pub interval: Duration,
    /// Sessions untouched for this long are evicted
    pub idle_ttl: Duration,
}

impl Default for SessionSweeperConfig {
    fn default() -> Self {
        Self::from_settings(&SessionSettings::default())
    }
}

impl SessionSweeperConfig {
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            interval: settings.sweep_interval(),
            idle_ttl: settings.idle_ttl(),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Evicts payment sessions the donor walked away from. Unconfirmed attempts
/// remain in the attempt store and are restored on the next request.
pub struct SessionSweeper {
    registry: Arc<SessionRegistry>,
    config: SessionSweeperConfig,
}

impl SessionSweeper {
    pub fn new(registry: Arc<SessionRegistry>, config: SessionSweeperConfig) -> Self {
        Self { registry, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            idle_ttl_secs = self.config.idle_ttl.as_secs(),
            "session sweeper started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("session sweeper stopping");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        info!("session sweeper stopped");
    }

    pub async fn sweep_once(&self) -> usize {
        let evicted = self.registry.evict_idle(self.config.idle_ttl).await;
        if evicted > 0 {
            let remaining = self.registry.len().await;
            info!(
                evicted = evicted,
                remaining = remaining,
                "idle payment sessions evicted"
            );
        } else {
            debug!("no idle payment sessions");
        }
        evicted
    }
}
