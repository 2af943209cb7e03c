use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "ISK";
const DEFAULT_SPOT_HOLD_TTL_SECS: u64 = 600;
const DEFAULT_SPOT_HOLD_BACKEND: &str = "database";
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

pub const HOLD_BACKEND_DATABASE: &str = "database";
pub const HOLD_BACKEND_IN_MEMORY: &str = "in-memory";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key (minimum 64 characters)
    #[validate(length(min = 64), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[validate(range(min = 300, max = 86400))]
    pub jwt_expiration: usize,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_expiration")]
    #[validate(range(min = 600, max = 2592000))]
    pub refresh_token_expiration: usize,

    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Upper bound for a single HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of the domain event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// API pagination
    #[serde(default = "default_api_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub api_default_page_size: u64,
    #[serde(default = "default_api_max_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub api_max_page_size: u64,

    /// ISO 4217 code used for prices and payments
    #[serde(default = "default_currency")]
    #[validate(custom = "validate_currency")]
    pub currency: String,

    /// How long a checkout session may hold a spot
    #[serde(default = "default_spot_hold_ttl_secs")]
    #[validate(range(min = 30, max = 7200))]
    pub spot_hold_ttl_secs: u64,

    /// Spot hold storage: "database" (multi-process safe) or "in-memory" (single process only)
    #[serde(default = "default_spot_hold_backend")]
    #[validate(custom = "validate_spot_hold_backend")]
    pub spot_hold_backend: String,

    /// Interval of the expired-hold sweeper, 0 disables it
    #[serde(default = "default_hold_sweep_interval_secs")]
    pub hold_sweep_interval_secs: u64,

    /// Timeout applied to every outbound provider call
    #[serde(default = "default_http_client_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub http_client_timeout_secs: u64,

    /// Payment gateway
    #[serde(default)]
    pub payment_gateway_url: Option<String>,
    #[serde(default)]
    pub payment_api_key: Option<String>,
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,
    #[serde(default = "default_payment_webhook_tolerance_secs")]
    pub payment_webhook_tolerance_secs: u64,
    #[serde(default = "default_payment_return_url")]
    pub payment_return_url: String,

    /// Flight data provider
    #[serde(default)]
    pub flight_data_url: Option<String>,
    #[serde(default)]
    pub flight_data_api_key: Option<String>,
    #[serde(default = "default_flight_cache_ttl_secs")]
    pub flight_cache_ttl_secs: u64,

    /// Vehicle registry provider
    #[serde(default)]
    pub vehicle_registry_url: Option<String>,
    #[serde(default)]
    pub vehicle_registry_api_key: Option<String>,
    #[serde(default = "default_vehicle_cache_ttl_secs")]
    pub vehicle_cache_ttl_secs: u64,

    /// Outbound email (SMTP); a logging sender is used when no host is set
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default = "default_email_from")]
    pub email_from: String,

    /// Drop-off reminders
    #[serde(default = "default_reminder_lead_hours")]
    pub reminder_lead_hours: i64,
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,

    /// Per-IP limits for the public flight and vehicle lookups
    #[serde(default = "default_lookup_rate_limit_requests")]
    pub lookup_rate_limit_requests: u32,
    #[serde(default = "default_lookup_rate_limit_window_secs")]
    pub lookup_rate_limit_window_secs: u64,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            refresh_token_expiration: default_refresh_token_expiration(),
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
            currency: default_currency(),
            spot_hold_ttl_secs: default_spot_hold_ttl_secs(),
            spot_hold_backend: default_spot_hold_backend(),
            hold_sweep_interval_secs: default_hold_sweep_interval_secs(),
            http_client_timeout_secs: default_http_client_timeout_secs(),
            payment_gateway_url: None,
            payment_api_key: None,
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: default_payment_webhook_tolerance_secs(),
            payment_return_url: default_payment_return_url(),
            flight_data_url: None,
            flight_data_api_key: None,
            flight_cache_ttl_secs: default_flight_cache_ttl_secs(),
            vehicle_registry_url: None,
            vehicle_registry_api_key: None,
            vehicle_cache_ttl_secs: default_vehicle_cache_ttl_secs(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            email_from: default_email_from(),
            reminder_lead_hours: default_reminder_lead_hours(),
            reminder_interval_secs: default_reminder_interval_secs(),
            lookup_rate_limit_requests: default_lookup_rate_limit_requests(),
            lookup_rate_limit_window_secs: default_lookup_rate_limit_window_secs(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn spot_hold_ttl(&self) -> Duration {
        Duration::from_secs(self.spot_hold_ttl_secs)
    }

    pub fn http_client_timeout(&self) -> Duration {
        Duration::from_secs(self.http_client_timeout_secs)
    }

    pub fn uses_in_memory_holds(&self) -> bool {
        self.spot_hold_backend
            .eq_ignore_ascii_case(HOLD_BACKEND_IN_MEMORY)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique, secure value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.is_production() && self.uses_in_memory_holds() {
            let mut err = ValidationError::new("spot_hold_backend_single_process");
            err.message = Some(
                "The in-memory spot hold store is only safe for a single process; use \"database\" in production"
                    .into(),
            );
            errors.add("spot_hold_backend", err);
        }

        if self.api_default_page_size > self.api_max_page_size {
            let mut err = ValidationError::new("api_default_page_size_above_max");
            err.message = Some("api_default_page_size must not exceed api_max_page_size".into());
            errors.add("api_default_page_size", err);
        }

        if self.is_production() && self.payment_webhook_secret.is_none() {
            let mut err = ValidationError::new("payment_webhook_secret_required");
            err.message = Some("Set APP__PAYMENT_WEBHOOK_SECRET in production".into());
            errors.add("payment_webhook_secret", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_refresh_token_expiration() -> usize {
    7 * 24 * 3600
}

fn default_auth_issuer() -> String {
    "airpark-auth".to_string()
}

fn default_auth_audience() -> String {
    "airpark-api".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_api_page_size() -> u64 {
    20
}

fn default_api_max_page_size() -> u64 {
    100
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_spot_hold_ttl_secs() -> u64 {
    DEFAULT_SPOT_HOLD_TTL_SECS
}

fn default_spot_hold_backend() -> String {
    DEFAULT_SPOT_HOLD_BACKEND.to_string()
}

fn default_hold_sweep_interval_secs() -> u64 {
    300
}

fn default_http_client_timeout_secs() -> u64 {
    10
}

fn default_payment_webhook_tolerance_secs() -> u64 {
    300
}

fn default_payment_return_url() -> String {
    "http://localhost:3000/booking/complete".to_string()
}

fn default_flight_cache_ttl_secs() -> u64 {
    300
}

fn default_vehicle_cache_ttl_secs() -> u64 {
    86_400
}

fn default_smtp_port() -> u16 {
    587
}

fn default_email_from() -> String {
    "Airpark <bookings@airpark.local>".to_string()
}

fn default_reminder_lead_hours() -> i64 {
    24
}

fn default_reminder_interval_secs() -> u64 {
    900
}

fn default_lookup_rate_limit_requests() -> u32 {
    30
}

fn default_lookup_rate_limit_window_secs() -> u64 {
    60
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_spot_hold_backend(value: &str) -> Result<(), ValidationError> {
    if value.eq_ignore_ascii_case(HOLD_BACKEND_DATABASE)
        || value.eq_ignore_ascii_case(HOLD_BACKEND_IN_MEMORY)
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("spot_hold_backend");
        err.message = Some("Must be one of: database, in-memory".into());
        Err(err)
    }
}

fn validate_currency(value: &str) -> Result<(), ValidationError> {
    if value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency");
        err.message = Some("Currency must be a three-letter ISO 4217 code".into());
        Err(err)
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 64 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must be at least 64 characters for adequate security".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let lower = trimmed.to_ascii_lowercase();
    let weak_fragments = ["changeme", "password", "12345", "abcdef"];
    if weak_fragments.iter().any(|pattern| lower.contains(pattern)) {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some(
            "JWT secret appears to be weak; use a cryptographically strong random string".into(),
        );
        return Err(err);
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("airpark_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret has no default and must come from a file or APP__JWT_SECRET
    let config = Config::builder()
        .set_default("database_url", "sqlite://airpark.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", run_env.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET (minimum 64 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
