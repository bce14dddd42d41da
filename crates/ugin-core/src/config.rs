//! UGIN Configuration Management
//!
//! Handles configuration from environment variables and TOML files with
//! sensible defaults for development. Secrets (signing key, admin accounts)
//! have no usable defaults and must be supplied at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Minimum accepted length of the token signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub database: DatabaseConfig,

    /// Token and password settings
    pub auth: AuthConfig,

    /// Listing bounds
    pub listing: ListingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Admin dashboard accounts
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = split_list(&origins);
        }
        if let Some(limit) = parse_env("MAX_CONCURRENT_REQUESTS")? {
            self.server.max_concurrent_requests = limit;
        }

        // Storage
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(size) = parse_env("DATABASE_POOL_SIZE")? {
            self.database.pool_size = size;
        }
        if let Some(ms) = parse_env("STORE_TIMEOUT_MS")? {
            self.database.store_timeout_ms = ms;
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            self.auth.issuer = issuer;
        }
        if let Some(secs) = parse_env("JWT_ACCESS_EXPIRATION_SECS")? {
            self.auth.access_ttl_secs = secs;
        }
        if let Some(secs) = parse_env("JWT_REFRESH_EXPIRATION_SECS")? {
            self.auth.refresh_ttl_secs = secs;
        }

        // Listing
        if let Some(size) = parse_env("LISTING_DEFAULT_PAGE_SIZE")? {
            self.listing.default_page_size = size;
        }
        if let Some(size) = parse_env("LISTING_MAX_PAGE_SIZE")? {
            self.listing.max_page_size = size;
        }

        // Admin accounts: "user:pass,user2:pass2"
        if let Ok(accounts) = std::env::var("ADMIN_ACCOUNTS") {
            self.admin.accounts = AdminAccount::parse_list(&accounts)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }

    /// Check the invariants the server relies on at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_CONCURRENT_REQUESTS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::MissingRequired(format!(
                "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs <= self.auth.access_ttl_secs
        {
            return Err(ConfigError::InvalidValue {
                key: "JWT_REFRESH_EXPIRATION_SECS".to_string(),
                value: format!(
                    "refresh ttl {} must exceed access ttl {}",
                    self.auth.refresh_ttl_secs, self.auth.access_ttl_secs
                ),
            });
        }
        if self.listing.default_page_size == 0
            || self.listing.max_page_size == 0
            || self.listing.default_page_size > self.listing.max_page_size
        {
            return Err(ConfigError::InvalidValue {
                key: "LISTING_DEFAULT_PAGE_SIZE".to_string(),
                value: format!(
                    "default {} / max {}",
                    self.listing.default_page_size, self.listing.max_page_size
                ),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS; empty allows any origin
    pub cors_origins: Vec<String>,

    /// Requests handled at once; further requests wait for a slot
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            cors_origins: vec![],
            max_concurrent_requests: 200,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory store is used when unset
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,

    /// Deadline for a single store operation, in milliseconds
    pub store_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
            store_timeout_ms: 5_000,
        }
    }
}

/// Token signing configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret
    pub jwt_secret: String,

    /// Token issuer identifier
    pub issuer: String,

    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: "ugin".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

/// Listing page-size bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Page size used when the client sends none or an invalid one
    pub default_page_size: u32,

    /// Hard cap on page size
    pub max_page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Admin dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// Accounts allowed through HTTP Basic auth
    pub accounts: Vec<AdminAccount>,
}

/// One admin credential pair
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminAccount {
    pub username: String,
    pub password: String,
}

impl AdminAccount {
    /// Parse `user:pass` entries separated by commas
    pub fn parse_list(value: &str) -> Result<Vec<Self>, ConfigError> {
        split_list(value)
            .into_iter()
            .map(|entry| match entry.split_once(':') {
                Some((user, pass)) if !user.is_empty() && !pass.is_empty() => Ok(Self {
                    username: user.to_string(),
                    password: pass.to_string(),
                }),
                _ => Err(ConfigError::InvalidValue {
                    key: "ADMIN_ACCOUNTS".to_string(),
                    value: "<entry without user:password>".to_string(),
                }),
            })
            .collect()
    }
}

impl fmt::Debug for AdminAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminAccount")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
