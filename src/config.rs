//! Configuration system for the Fantastico client.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `fantastico.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `FANTASTICO_USERNAME` - API username
//! - `FANTASTICO_PASSWORD` - API password
//! - `FANTASTICO_WSDL_URL` - Service description URL
//! - `FANTASTICO_ENDPOINT` - Fixed SOAP endpoint (skips WSDL discovery together with `FANTASTICO_NAMESPACE`)
//! - `FANTASTICO_NAMESPACE` - Fixed SOAP target namespace
//! - `FANTASTICO_CONNECT_TIMEOUT_SECS` - Connect timeout in seconds
//! - `FANTASTICO_TIMEOUT_SECS` - Request timeout in seconds
//! - `FANTASTICO_STATISTICS_DESTINATION` - Destination passed to the statistics hook
//! - `FANTASTICO_LOGGING_ENABLED` - Install a log subscriber in the CLI
//! - `FANTASTICO_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{FantasticoError, FantasticoResult};
use crate::transport::DEFAULT_WSDL_URL;

/// Global configuration singleton.
static CONFIG: OnceLock<FantasticoConfig> = OnceLock::new();

/// Default connect and request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1000;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FantasticoConfig {
    /// API credentials and service location
    pub api: ApiConfig,
    /// HTTP timeouts
    pub transport: TransportConfig,
    /// Statistics hook settings
    pub statistics: StatisticsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// API credentials and service location.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub username: String,
    pub password: String,
    /// URL of the WSDL used to discover the endpoint
    pub wsdl_url: String,
    /// Fixed SOAP endpoint
    pub endpoint: Option<String>,
    /// Fixed SOAP target namespace
    pub namespace: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            wsdl_url: DEFAULT_WSDL_URL.to_string(),
            endpoint: None,
            namespace: None,
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("wsdl_url", &self.wsdl_url)
            .field("endpoint", &self.endpoint)
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// HTTP timeouts, applied to every request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_TIMEOUT_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Destination reported with every call outcome
    pub destination: String,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            destination: "local".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

fn env_int(name: &str) -> Option<i64> {
    env::var(name).ok().and_then(|v| v.parse::<i64>().ok())
}

impl FantasticoConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `fantastico.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> FantasticoResult<Self> {
        let settings = Config::builder()
            .set_default("api.username", "")?
            .set_default("api.password", "")?
            .set_default("api.wsdl_url", DEFAULT_WSDL_URL)?
            .set_default("transport.connect_timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("transport.timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("statistics.destination", "local")?
            .set_default("logging.enabled", false)?
            .set_default("logging.level", "info")?
            .add_source(config::File::with_name("fantastico").required(false))
            .set_override_option("api.username", env::var("FANTASTICO_USERNAME").ok())?
            .set_override_option("api.password", env::var("FANTASTICO_PASSWORD").ok())?
            .set_override_option("api.wsdl_url", env::var("FANTASTICO_WSDL_URL").ok())?
            .set_override_option("api.endpoint", env::var("FANTASTICO_ENDPOINT").ok())?
            .set_override_option("api.namespace", env::var("FANTASTICO_NAMESPACE").ok())?
            .set_override_option(
                "transport.connect_timeout_secs",
                env_int("FANTASTICO_CONNECT_TIMEOUT_SECS"),
            )?
            .set_override_option("transport.timeout_secs", env_int("FANTASTICO_TIMEOUT_SECS"))?
            .set_override_option(
                "statistics.destination",
                env::var("FANTASTICO_STATISTICS_DESTINATION").ok(),
            )?
            .set_override_option(
                "logging.enabled",
                env::var("FANTASTICO_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )?
            .set_override_option("logging.level", env::var("FANTASTICO_LOG_LEVEL").ok())?
            .build()
            .map_err(|e| FantasticoError::ConfigError(format!("failed to build config: {e}")))?;

        settings.try_deserialize().map_err(|e| {
            FantasticoError::ConfigError(format!("failed to deserialize config: {e}"))
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> FantasticoResult<()> {
        if self.api.wsdl_url.trim().is_empty() {
            return Err(FantasticoError::ConfigError(
                "api.wsdl_url cannot be empty".to_string(),
            ));
        }

        if self.transport.connect_timeout_secs == 0 {
            return Err(FantasticoError::ConfigError(
                "transport.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.transport.timeout_secs == 0 {
            return Err(FantasticoError::ConfigError(
                "transport.timeout_secs must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(FantasticoError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }

    /// Returns true if both username and password are set.
    pub fn has_credentials(&self) -> bool {
        !self.api.username.is_empty() && !self.api.password.is_empty()
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> FantasticoResult<&'static FantasticoConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = FantasticoConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is valid.
    Ok(CONFIG.get_or_init(|| config))
}
