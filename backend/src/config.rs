//! Configuration management for the Stone Stock platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with STONE_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    /// Object storage for photos and avatars
    pub storage: StorageConfig,

    /// Spreadsheet import limits
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per bucket
    pub root: String,

    /// Base URL under which `/storage/{bucket}/{key}` is reachable
    pub public_base_url: String,

    /// Key for signing private bucket URLs
    pub signing_secret: String,

    pub signed_url_ttl_secs: i64,

    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Planned rows committed per transaction
    pub batch_size: usize,

    pub max_rows: usize,

    /// Minimum similarity for fuzzy location matches
    pub fuzzy_threshold: f64,

    /// Download photos referenced by URL into the products bucket
    pub fetch_photos: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STONE_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("storage.root", "./storage")?
            .set_default("storage.public_base_url", "http://localhost:3000/api/v1")?
            .set_default("storage.signed_url_ttl_secs", 3600)?
            .set_default("storage.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("import.batch_size", 50)?
            .set_default("import.max_rows", 5000)?
            .set_default("import.fuzzy_threshold", 0.88)?
            .set_default("import.fetch_photos", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STONE_ prefix)
            .add_source(
                Environment::with_prefix("STONE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
