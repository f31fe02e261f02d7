//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Storage provider configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Reliability layer configuration.
    #[serde(default)]
    pub reliability: ReliabilityConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Storage provider settings as read from configuration sources.
///
/// `kind` selects the backend (`s3`, `azure_blob` or `local`); the remaining
/// fields are interpreted according to it.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Provider kind.
    #[serde(default = "default_storage_kind")]
    pub kind: String,
    /// Endpoint URL (S3-compatible providers).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bucket or container name.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Region (S3-compatible providers).
    #[serde(default)]
    pub region: Option<String>,
    /// Access key id or account name.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret access key or account key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Root directory for the local provider.
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_storage_kind() -> String {
    "local".to_string()
}

fn default_storage_root() -> String {
    "./storage".to_string()
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024 // 100MB
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: default_storage_kind(),
            endpoint: None,
            bucket: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            root: default_storage_root(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// Reliability layer configuration: rate limits, retry timing and health thresholds.
///
/// Every value is read once when the consuming component is constructed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReliabilityConfig {
    /// Token refresh rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Retry and backoff timing.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Connection health thresholds.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Token refresh rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum refresh attempts per user within one window.
    #[serde(default = "default_user_max_attempts")]
    pub user_max_attempts: u32,
    /// Maximum refresh attempts per IP address within one window.
    #[serde(default = "default_ip_max_attempts")]
    pub ip_max_attempts: u32,
    /// Window length in seconds, started by the first attempt.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_user_max_attempts() -> u32 {
    5
}

fn default_ip_max_attempts() -> u32 {
    20
}

fn default_window_secs() -> u64 {
    3600 // 1 hour
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user_max_attempts: default_user_max_attempts(),
            ip_max_attempts: default_ip_max_attempts(),
            window_secs: default_window_secs(),
        }
    }
}

/// Retry and backoff timing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// First delay of the exponential backoff, in seconds.
    #[serde(default = "default_exponential_base_secs")]
    pub exponential_base_secs: u64,
    /// Cap of the exponential backoff, in seconds.
    #[serde(default = "default_exponential_max_secs")]
    pub exponential_max_secs: u64,
    /// Attempts allowed for transient network and timeout errors.
    #[serde(default = "default_network_max_attempts")]
    pub network_max_attempts: u32,
    /// Flat delay for quota exhaustion, in seconds.
    #[serde(default = "default_quota_delay_secs")]
    pub quota_delay_secs: u64,
    /// Attempts allowed for quota exhaustion.
    #[serde(default = "default_quota_max_attempts")]
    pub quota_max_attempts: u32,
    /// Linear backoff step for unavailable services, in seconds.
    #[serde(default = "default_service_step_secs")]
    pub service_step_secs: u64,
    /// Cap of the linear backoff, in seconds.
    #[serde(default = "default_service_max_secs")]
    pub service_max_secs: u64,
    /// Attempts allowed for unavailable services.
    #[serde(default = "default_service_max_attempts")]
    pub service_max_attempts: u32,
    /// Attempts allowed for unclassified errors.
    #[serde(default = "default_unknown_max_attempts")]
    pub unknown_max_attempts: u32,
}

fn default_exponential_base_secs() -> u64 {
    1
}

fn default_exponential_max_secs() -> u64 {
    16
}

fn default_network_max_attempts() -> u32 {
    5
}

fn default_quota_delay_secs() -> u64 {
    3600 // 1 hour
}

fn default_quota_max_attempts() -> u32 {
    3
}

fn default_service_step_secs() -> u64 {
    60
}

fn default_service_max_secs() -> u64 {
    300 // 5 minutes
}

fn default_service_max_attempts() -> u32 {
    5
}

fn default_unknown_max_attempts() -> u32 {
    1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            exponential_base_secs: default_exponential_base_secs(),
            exponential_max_secs: default_exponential_max_secs(),
            network_max_attempts: default_network_max_attempts(),
            quota_delay_secs: default_quota_delay_secs(),
            quota_max_attempts: default_quota_max_attempts(),
            service_step_secs: default_service_step_secs(),
            service_max_secs: default_service_max_secs(),
            service_max_attempts: default_service_max_attempts(),
            unknown_max_attempts: default_unknown_max_attempts(),
        }
    }
}

/// Connection health configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures at which a connection is reported unhealthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Window before token expiry in which the token counts as expiring soon, in seconds.
    #[serde(default = "default_token_expiry_warning_secs")]
    pub token_expiry_warning_secs: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_token_expiry_warning_secs() -> u64 {
    3600 // 1 hour
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            token_expiry_warning_secs: default_token_expiry_warning_secs(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("UPLINK").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
