//! API configuration
//!
//! Loaded from `API_*` environment variables (after `.env`), on top of the
//! defaults below.

use serde::Deserialize;

use core_kernel::Timezone;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub database_connect_timeout_secs: u64,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    pub log_format: LogFormat,
    /// HMAC secret shared with the payment provider; unset disables
    /// signature verification
    pub webhook_secret: Option<String>,
    /// Pre-provisioned QR image shown to the payer
    pub static_qr_image_url: String,
    /// Directory for proof-of-delivery photos; unset stores them inline
    pub blob_root: Option<String>,
    /// Path prefix the blob directory is served under; mounted as a route,
    /// so it must start with `/` and cannot be `/` itself
    pub blob_public_base_url: String,
    /// Business-day timezone for rider summaries
    pub timezone: Timezone,
    /// Mounts `POST /webhooks/payrex/test`
    pub expose_test_webhook: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/cod_dispatch".to_string(),
            database_max_connections: 10,
            database_min_connections: 2,
            database_connect_timeout_secs: 30,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            webhook_secret: None,
            static_qr_image_url: "/static-qrph.png".to_string(),
            blob_root: None,
            blob_public_base_url: "/media".to_string(),
            timezone: Timezone::default(),
            expose_test_webhook: false,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port)?
            .set_default("database_url", defaults.database_url)?
            .set_default("database_max_connections", defaults.database_max_connections)?
            .set_default("database_min_connections", defaults.database_min_connections)?
            .set_default("database_connect_timeout_secs", defaults.database_connect_timeout_secs)?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", "pretty")?
            .set_default("static_qr_image_url", defaults.static_qr_image_url)?
            .set_default("blob_public_base_url", defaults.blob_public_base_url)?
            .set_default("timezone", defaults.timezone.name())?
            .set_default("expose_test_webhook", defaults.expose_test_webhook)?
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    fn validated(self) -> Result<Self, config::ConfigError> {
        let base = self.blob_public_base_url.as_str();
        if !base.starts_with('/') || base.trim_end_matches('/').is_empty() {
            return Err(config::ConfigError::Message(format!(
                "blob_public_base_url must be a path like /media, got {:?}",
                base
            )));
        }
        Ok(self)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn signature_verification_enabled(&self) -> bool {
        self.webhook_secret
            .as_deref()
            .is_some_and(|secret| !secret.trim().is_empty())
    }
}
