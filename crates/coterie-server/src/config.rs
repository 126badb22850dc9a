//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (COTERIE_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use coterie_core::ReadOnlyRooms;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Display name shown by the client.
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Shared secret required to join.
    #[serde(default = "default_invite_code")]
    pub invite_code: String,

    /// Shared secret required to elevate a session to admin.
    #[serde(default = "default_admin_code")]
    pub admin_code: String,

    /// Secret used to sign session tokens.
    #[serde(default = "default_session_secret")]
    pub session_secret: String,

    /// Slugs of rooms where only admins may post.
    #[serde(default = "default_readonly_rooms")]
    pub readonly_rooms: Vec<String>,

    /// Maximum number of messages returned as room history.
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("COTERIE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("COTERIE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000)
}

fn default_database_url() -> String {
    std::env::var("COTERIE_DATABASE_URL").unwrap_or_else(|_| "sqlite:coterie.db?mode=rwc".to_string())
}

fn default_site_name() -> String {
    std::env::var("COTERIE_SITE_NAME").unwrap_or_else(|_| "Coterie".to_string())
}

fn default_invite_code() -> String {
    std::env::var("COTERIE_INVITE_CODE").unwrap_or_else(|_| "tmb-2025".to_string())
}

fn default_admin_code() -> String {
    std::env::var("COTERIE_ADMIN_CODE").unwrap_or_else(|_| "let-me-in".to_string())
}

fn default_session_secret() -> String {
    std::env::var("COTERIE_SESSION_SECRET").unwrap_or_else(|_| "dev-secret".to_string())
}

fn default_readonly_rooms() -> Vec<String> {
    std::env::var("COTERIE_READONLY_ROOMS")
        .map(|raw| ReadOnlyRooms::from_csv(&raw).slugs().to_vec())
        .unwrap_or_default()
}

fn default_history_limit() -> i64 {
    200
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            site_name: default_site_name(),
            invite_code: default_invite_code(),
            admin_code: default_admin_code(),
            session_secret: default_session_secret(),
            readonly_rooms: default_readonly_rooms(),
            history_limit: default_history_limit(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        // Try to load from default paths
        let config_paths = [
            "coterie.toml",
            "/etc/coterie/coterie.toml",
            "~/.config/coterie/coterie.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// The configured read-only room set.
    #[must_use]
    pub fn readonly_rooms(&self) -> ReadOnlyRooms {
        ReadOnlyRooms::new(self.readonly_rooms.iter().cloned())
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid host:port")
    }
}
