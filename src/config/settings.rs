//! Application settings and configuration
//!
//! Settings are loaded from environment variables (and a `.env` file when
//! present) with sensible defaults. Command-line flags override them in
//! `main`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::exchange::GITHUB_API_BASE;
use crate::services::executor::DEFAULT_MAX_ROUNDS;
use crate::services::refresh::RefreshConfig;

/// Secret files checked for primary credentials, in order
pub const DEFAULT_SECRET_PATHS: [&str; 3] = [
    "/etc/secrets/.env",
    "/etc/secrets/tokens",
    "/etc/secrets/gh_tokens",
];

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub log_level: String,

    // Status server
    pub host: String,
    pub port: u16,

    // Upstream
    pub github_api_base_url: String,
    pub vscode_version: String,
    pub exchange_timeout_secs: u64,

    // Rotation and refresh
    pub max_retry_rounds: u32,
    pub default_refresh_secs: u64,
    pub refresh_lead_secs: u64,
    /// Expiry stamped on derived credentials written without one
    pub derived_default_ttl_secs: u64,

    // Credential sources
    pub secret_paths: Vec<PathBuf>,

    /// Primary credential(s) given on the command line
    #[serde(skip)]
    pub github_token: Option<String>,

    // Debug options
    /// Log primary and session tokens in clear text
    #[serde(default)]
    pub show_token: bool,
}

impl Settings {
    /// Load settings from environment variables with defaults
    ///
    /// Values are parsed but not validated; call [`validate`](Self::validate)
    /// once command-line overrides have been applied.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            app_name: env_or_default("APP_NAME", "copilot-token-pool"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: env_or_default("LOG_LEVEL", "info"),

            host: env_or_default("HOST", "0.0.0.0"),
            port: env_or_default("PORT", "4141")
                .parse()
                .context("Invalid PORT value")?,

            github_api_base_url: env_or_default("GITHUB_API_BASE_URL", GITHUB_API_BASE),
            vscode_version: env_or_default("VSCODE_VERSION", "1.99.3"),
            exchange_timeout_secs: env_or_default("EXCHANGE_TIMEOUT_SECS", "30")
                .parse()
                .unwrap_or(30),

            max_retry_rounds: env_or_default("MAX_RETRY_ROUNDS", "5")
                .parse()
                .context("Invalid MAX_RETRY_ROUNDS value")?,
            default_refresh_secs: env_or_default("DEFAULT_REFRESH_SECS", "1800")
                .parse()
                .unwrap_or(1800),
            refresh_lead_secs: env_or_default("REFRESH_LEAD_SECS", "60")
                .parse()
                .unwrap_or(60),
            derived_default_ttl_secs: env_or_default("DERIVED_DEFAULT_TTL_SECS", "1800")
                .parse()
                .unwrap_or(1800),

            secret_paths: env::var("SECRET_FILE_PATHS")
                .map(|paths| {
                    paths
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_else(|_| default_secret_paths()),

            github_token: None,

            show_token: env_or_default("SHOW_TOKEN", "false")
                .parse()
                .unwrap_or(false),
        })
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }
        if self.max_retry_rounds == 0 {
            anyhow::bail!("MAX_RETRY_ROUNDS must be > 0");
        }
        if self.default_refresh_secs <= self.refresh_lead_secs {
            anyhow::bail!(
                "DEFAULT_REFRESH_SECS ({}) must be greater than REFRESH_LEAD_SECS ({})",
                self.default_refresh_secs,
                self.refresh_lead_secs
            );
        }
        if self.derived_default_ttl_secs == 0 {
            anyhow::bail!("DERIVED_DEFAULT_TTL_SECS must be > 0");
        }

        if self.show_token {
            tracing::warn!("Token display enabled, secrets will appear in logs");
        }

        Ok(())
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    /// Expiry applied to derived credentials written through the facade
    pub fn derived_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.derived_default_ttl_secs as i64)
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            default_refresh_in: Duration::from_secs(self.default_refresh_secs),
            lead: Duration::from_secs(self.refresh_lead_secs),
            show_token: self.show_token,
            ..RefreshConfig::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "copilot-token-pool".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 4141,
            github_api_base_url: GITHUB_API_BASE.to_string(),
            vscode_version: "1.99.3".to_string(),
            exchange_timeout_secs: 30,
            max_retry_rounds: DEFAULT_MAX_ROUNDS,
            default_refresh_secs: 1800,
            refresh_lead_secs: 60,
            derived_default_ttl_secs: 1800,
            secret_paths: default_secret_paths(),
            github_token: None,
            show_token: false,
        }
    }
}

fn default_secret_paths() -> Vec<PathBuf> {
    DEFAULT_SECRET_PATHS.iter().map(PathBuf::from).collect()
}

/// Helper function to get environment variable with default
fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
