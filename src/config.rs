//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use crate::payments::checkout::ConnectionMode;
use std::env;
use std::time::Duration;

/// Receipt reveal delay bounds for mobile money, in milliseconds
pub const RECEIPT_DELAY_MIN_MS: u64 = 1_500;
pub const RECEIPT_DELAY_MAX_MS: u64 = 3_000;

/// Ceiling on `BACKEND_MAX_RETRIES`; backoff doubles per retry
pub const MAX_BACKEND_RETRIES: u32 = 5;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub checkout: CheckoutSettings,
    pub session: SessionSettings,
    pub cache: CacheSettings,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Collections backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub pk_token: Option<String>,
    pub timeout_secs: u64,
    /// Applies to read-only requests only
    pub max_retries: u32,
}

/// Hosted checkout configuration
#[derive(Debug, Clone, Default)]
pub struct CheckoutSettings {
    /// Absent means hosted checkout cannot be used
    pub merchant_key: Option<String>,
    pub connection_mode: ConnectionMode,
}

/// Payment session timing
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub completion_timeout_secs: u64,
    pub receipt_delay_ms: u64,
    /// Sessions untouched this long are evicted from memory
    pub idle_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

/// Attempt store configuration
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Without a URL attempts are kept in memory
    pub redis_url: Option<String>,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            backend: BackendConfig::from_env()?,
            checkout: CheckoutSettings::from_env()?,
            session: SessionSettings::from_env()?,
            cache: CacheSettings::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.backend.validate()?;
        self.session.validate()?;
        self.cache.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost,http://127.0.0.1".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl BackendConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(BackendConfig {
            base_url: env::var("BACKEND_BASE_URL")
                .map_err(|_| ConfigError::MissingVariable("BACKEND_BASE_URL".to_string()))?,
            pk_token: optional_var("BACKEND_PK_TOKEN"),
            timeout_secs: env::var("BACKEND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BACKEND_TIMEOUT_SECS".to_string()))?,
            max_retries: env::var("BACKEND_MAX_RETRIES")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BACKEND_MAX_RETRIES".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue("BACKEND_BASE_URL".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "BACKEND_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_retries > MAX_BACKEND_RETRIES {
            return Err(ConfigError::ValidationFailed(format!(
                "BACKEND_MAX_RETRIES cannot exceed {}",
                MAX_BACKEND_RETRIES
            )));
        }

        Ok(())
    }
}

impl CheckoutSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CheckoutSettings {
            merchant_key: optional_var("PAYAZA_PUBLIC_KEY"),
            connection_mode: env::var("PAYAZA_CONNECTION_MODE")
                .unwrap_or_else(|_| "Test".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PAYAZA_CONNECTION_MODE".to_string()))?,
        })
    }
}

impl SessionSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SessionSettings {
            completion_timeout_secs: env::var("COMPLETION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("COMPLETION_TIMEOUT_SECS".to_string()))?,
            receipt_delay_ms: env::var("RECEIPT_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RECEIPT_DELAY_MS".to_string()))?,
            idle_ttl_secs: env::var("SESSION_IDLE_TTL_SECS")
                .unwrap_or_else(|_| "1800".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SESSION_IDLE_TTL_SECS".to_string()))?,
            sweep_interval_secs: env::var("SESSION_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("SESSION_SWEEP_INTERVAL_SECS".to_string())
                })?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.completion_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "COMPLETION_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if !(RECEIPT_DELAY_MIN_MS..=RECEIPT_DELAY_MAX_MS).contains(&self.receipt_delay_ms) {
            return Err(ConfigError::ValidationFailed(format!(
                "RECEIPT_DELAY_MS must be between {} and {}",
                RECEIPT_DELAY_MIN_MS, RECEIPT_DELAY_MAX_MS
            )));
        }

        if self.idle_ttl_secs <= self.completion_timeout_secs {
            return Err(ConfigError::ValidationFailed(
                "SESSION_IDLE_TTL_SECS must be longer than COMPLETION_TIMEOUT_SECS".to_string(),
            ));
        }

        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_SWEEP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }

    pub fn receipt_delay(&self) -> Duration {
        Duration::from_millis(self.receipt_delay_ms)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            completion_timeout_secs: 30,
            receipt_delay_ms: 2_000,
            idle_ttl_secs: 1_800,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(CacheSettings {
            redis_url: optional_var("REDIS_URL"),
            max_connections: env::var("CACHE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CACHE_MAX_CONNECTIONS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.redis_url {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err(ConfigError::InvalidValue("REDIS_URL".to_string()));
            }
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "CACHE_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: LogFormat::Plain,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
