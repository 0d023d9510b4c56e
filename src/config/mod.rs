use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub purchase: PurchaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    /// Lifetime of login sessions in days
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            session_ttl_days: default_session_ttl_days(),
        }
    }
}

fn default_admin_email() -> String {
    "admin@rafflr.local".to_string()
}

fn default_admin_password() -> String {
    // Random password per install if not configured; printed nowhere,
    // so operators must set one to use the bootstrap account.
    uuid::Uuid::new_v4().to_string()
}

fn default_session_ttl_days() -> i64 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseConfig {
    /// How long a pending reservation holds its ticket numbers, in minutes
    #[serde(default = "default_pending_ttl_minutes")]
    pub pending_ttl_minutes: i64,
    /// Maximum tickets in a single order
    #[serde(default = "default_max_tickets_per_order")]
    pub max_tickets_per_order: i64,
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            pending_ttl_minutes: default_pending_ttl_minutes(),
            max_tickets_per_order: default_max_tickets_per_order(),
        }
    }
}

fn default_pending_ttl_minutes() -> i64 {
    15
}

fn default_max_tickets_per_order() -> i64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Interval between background sweeps in seconds (default: 60)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: default_sweep_interval(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_tls: default_smtp_tls(),
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.is_some() && self.from_address.is_some()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Rafflr".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Upstream endpoint that exchanges a session_id for user identity
    pub session_endpoint: Option<String>,
    /// Timeout for the exchange request in seconds
    #[serde(default = "default_oauth_timeout")]
    pub timeout_seconds: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            session_endpoint: None,
            timeout_seconds: default_oauth_timeout(),
        }
    }
}

fn default_oauth_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty means allow any origin
    #[serde(default)]
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { origins: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// General API requests per window per IP
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    /// Auth (register/login) requests per window per IP
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            window_seconds: default_window_seconds(),
            api_requests_per_window: default_api_requests(),
            auth_requests_per_window: default_auth_requests(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_window_seconds() -> u64 {
    60
}

fn default_api_requests() -> u32 {
    120
}

fn default_auth_requests() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            purchase: PurchaseConfig::default(),
            engine: EngineConfig::default(),
            email: EmailConfig::default(),
            oauth: OAuthConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.purchase.pending_ttl_minutes, 15);
        assert_eq!(config.purchase.max_tickets_per_order, 100);
        assert_eq!(config.engine.sweep_interval, 60);
        assert!(!config.email.is_configured());
    }

    #[test]
    fn test_parse_partial_config() {
        let raw = r#"
            [server]
            port = 9000

            [purchase]
            pending_ttl_minutes = 5
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.purchase.pending_ttl_minutes, 5);
        assert_eq!(config.purchase.max_tickets_per_order, 100);
    }
}
