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
const DEFAULT_STORE_BACKEND: &str = "in-memory";
const DEFAULT_STORE_NAMESPACE: &str = "gameshop";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_MOLLIE_API_URL: &str = "https://api.mollie.com/v2";
const POSTNL_PRODUCTION_URL: &str = "https://api.postnl.nl";
const POSTNL_SANDBOX_URL: &str = "https://api-sandbox.postnl.nl";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_OUTBOX_POLL_SECS: u64 = 30;
const DEFAULT_OUTBOX_MAX_ENTRIES: usize = 1000;
const DEFAULT_OUTBOX_RETENTION_DAYS: i64 = 7;
const MIN_ADMIN_TOKEN_LEN: u64 = 16;

/// Document store configuration
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct StoreConfig {
    /// "in-memory" or "redis"
    #[serde(default = "default_store_backend")]
    #[validate(custom = "validate_store_backend")]
    pub backend: String,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix for every key written to Redis
    #[serde(default = "default_store_namespace")]
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_url: default_redis_url(),
            namespace: default_store_namespace(),
        }
    }
}

/// Payment gateway (Mollie) settings
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PaymentsConfig {
    /// Without a key the offline gateway is used
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_mollie_api_url")]
    #[validate(url)]
    pub api_url: String,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_mollie_api_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Sender address printed on shipping labels
#[derive(Clone, Debug, Deserialize)]
pub struct SenderAddress {
    #[serde(default = "default_sender_company")]
    pub company_name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub house_number: String,
    #[serde(default)]
    pub zipcode: String,
    #[serde(default)]
    pub city: String,
}

impl Default for SenderAddress {
    fn default() -> Self {
        Self {
            company_name: default_sender_company(),
            street: String::new(),
            house_number: String::new(),
            zipcode: String::new(),
            city: String::new(),
        }
    }
}

/// Carrier (PostNL) settings
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CarrierConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Use the sandbox endpoint instead of production
    #[serde(default = "default_true")]
    pub sandbox: bool,

    /// Overrides the sandbox/production switch when set
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default)]
    pub customer_number: String,

    #[serde(default)]
    pub customer_code: String,

    #[serde(default)]
    pub collection_location: String,

    #[serde(default)]
    pub sender: SenderAddress,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            sandbox: true,
            api_url: None,
            customer_number: String::new(),
            customer_code: String::new(),
            collection_location: String::new(),
            sender: SenderAddress::default(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl CarrierConfig {
    pub fn base_url(&self) -> String {
        match &self.api_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ if self.sandbox => POSTNL_SANDBOX_URL.to_string(),
            _ => POSTNL_PRODUCTION_URL.to_string(),
        }
    }
}

/// Transactional email settings
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct EmailConfig {
    /// HTTP endpoint of the email provider; unset means log-only delivery
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_from_address")]
    pub from_address: String,

    #[serde(default)]
    pub reply_to: Option<String>,

    /// Receives the "new order" notification
    #[serde(default = "default_owner_address")]
    #[validate(email)]
    pub owner_address: String,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            from_address: default_from_address(),
            reply_to: None,
            owner_address: default_owner_address(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Email outbox worker settings
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct OutboxConfig {
    #[serde(default = "default_outbox_poll_secs")]
    #[validate(range(min = 1, max = 3600))]
    pub poll_interval_secs: u64,

    /// Upper bound on stored entries; oldest finished entries are pruned first
    #[serde(default = "default_outbox_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_outbox_retention_days")]
    pub retention_days: i64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_outbox_poll_secs(),
            max_entries: default_outbox_max_entries(),
            retention_days: default_outbox_retention_days(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Bearer token guarding every admin endpoint
    #[validate(length(min = 16))]
    pub admin_token: String,

    /// Public URL of the storefront, used for payment redirect and webhook URLs
    #[serde(default = "default_public_base_url")]
    #[validate(url)]
    pub public_base_url: String,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    #[validate]
    pub store: StoreConfig,

    #[serde(default)]
    #[validate]
    pub payments: PaymentsConfig,

    #[serde(default)]
    #[validate]
    pub carrier: CarrierConfig,

    #[serde(default)]
    #[validate]
    pub email: EmailConfig,

    #[serde(default)]
    #[validate]
    pub outbox: OutboxConfig,
}

impl AppConfig {
    /// Development configuration with the given admin token and all defaults.
    pub fn with_admin_token(admin_token: impl Into<String>) -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            admin_token: admin_token.into(),
            public_base_url: default_public_base_url(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            request_timeout_secs: default_request_timeout_secs(),
            store: StoreConfig::default(),
            payments: PaymentsConfig::default(),
            carrier: CarrierConfig::default(),
            email: EmailConfig::default(),
            outbox: OutboxConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn uses_redis_store(&self) -> bool {
        self.store.backend.eq_ignore_ascii_case("redis")
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn payment_redirect_url(&self, order_number: &str) -> String {
        format!(
            "{}/bestelling-bevestigd?order={}",
            self.public_base_url.trim_end_matches('/'),
            order_number
        )
    }

    pub fn payment_webhook_url(&self) -> String {
        format!(
            "{}/api/v1/payments/webhook",
            self.public_base_url.trim_end_matches('/')
        )
    }

    /// The gateway cannot call back to a loopback address.
    pub fn webhook_reachable(&self) -> bool {
        match url::Url::parse(&self.public_base_url) {
            Ok(parsed) => !matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("[::1]") | None
            ),
            Err(_) => false,
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && self.allowed_origins().is_empty() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        let has_payment_key = self
            .payments
            .api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);
        if self.is_production() && !has_payment_key {
            let mut err = ValidationError::new("payments_api_key_required");
            err.message =
                Some("Set APP__PAYMENTS__API_KEY; the offline gateway is not allowed in production".into());
            errors.add("payments", err);
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

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_store_backend() -> String {
    DEFAULT_STORE_BACKEND.to_string()
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_store_namespace() -> String {
    DEFAULT_STORE_NAMESPACE.to_string()
}
fn default_mollie_api_url() -> String {
    DEFAULT_MOLLIE_API_URL.to_string()
}
fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn default_true() -> bool {
    true
}
fn default_sender_company() -> String {
    "Gameshop Enter".to_string()
}
fn default_from_address() -> String {
    "Gameshop Enter <noreply@gameshopenter.nl>".to_string()
}
fn default_owner_address() -> String {
    "info@gameshopenter.nl".to_string()
}
fn default_outbox_poll_secs() -> u64 {
    DEFAULT_OUTBOX_POLL_SECS
}
fn default_outbox_max_entries() -> usize {
    DEFAULT_OUTBOX_MAX_ENTRIES
}
fn default_outbox_retention_days() -> i64 {
    DEFAULT_OUTBOX_RETENTION_DAYS
}

fn validate_store_backend(backend: &str) -> Result<(), ValidationError> {
    match backend.to_ascii_lowercase().as_str() {
        "in-memory" | "redis" => Ok(()),
        _ => {
            let mut err = ValidationError::new("store_backend");
            err.message = Some("store backend must be \"in-memory\" or \"redis\"".into());
            Err(err)
        }
    }
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("gameshop_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads configuration from defaults, `config/` files and `APP__*` environment variables.
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

    // admin_token has no default; it must come from a file or APP__ADMIN_TOKEN.
    let config = Config::builder()
        .set_default("environment", run_env.clone())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("admin_token").is_err() {
        error!("Admin token is not configured. Set APP__ADMIN_TOKEN (minimum {} characters).", MIN_ADMIN_TOKEN_LEN);
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "admin_token is required but not configured. Set APP__ADMIN_TOKEN environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        environment = %app_config.environment,
        store = %app_config.store.backend,
        "Configuration loaded"
    );
    Ok(app_config)
}
