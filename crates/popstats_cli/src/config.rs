//! Configuration file support for popstats.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `POPSTATS_`, nested keys joined
//!    with `__`, e.g. `POPSTATS_GITHUB__TOKEN`)
//! 3. Config file (./popstats.toml, then ~/.config/popstats/config.toml)
//! 4. `GITHUB_TOKEN` from the environment, for the GitHub token only
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/popstats/popstats.db"  # optional, this is the default
//!
//! [github]
//! token = "ghp_..."
//! requests_per_second = 10
//!
//! [npm]
//! registry_url = "https://www.npmjs.com"
//! downloads_url = "https://api.npmjs.org"
//! requests_per_second = 5
//!
//! [sync]
//! concurrency = 10
//! scrape_attempts = 3
//! continuation_delay_ms = 0
//! max_deliveries = 5
//!
//! [server]
//! bind = "127.0.0.1:8787"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use popstats::github::{GITHUB_API_URL, GITHUB_WEB_URL};
use popstats::npm::{NPM_DOWNLOADS_URL, NPM_WEBSITE_URL};
use popstats::rate_limits::{GITHUB_DEFAULT_RPS, NPM_DEFAULT_RPS};
use popstats::sync::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_DELIVERIES, DEFAULT_SCRAPE_ATTEMPTS, SyncOptions,
};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
    pub npm: NpmConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    pub url: Option<String>,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API token used for repository listings.
    pub token: Option<String>,
    pub api_url: String,
    /// Base URL of the repository pages that get scraped.
    pub web_url: String,
    /// Proactive pacing for API calls and page scrapes; 0 disables it.
    pub requests_per_second: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: GITHUB_API_URL.to_string(),
            web_url: GITHUB_WEB_URL.to_string(),
            requests_per_second: GITHUB_DEFAULT_RPS,
        }
    }
}

/// npm configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NpmConfig {
    /// Website serving organization listings.
    pub registry_url: String,
    pub downloads_url: String,
    /// Proactive pacing for listings and download ranges; 0 disables it.
    pub requests_per_second: u32,
}

impl Default for NpmConfig {
    fn default() -> Self {
        Self {
            registry_url: NPM_WEBSITE_URL.to_string(),
            downloads_url: NPM_DOWNLOADS_URL.to_string(),
            requests_per_second: NPM_DEFAULT_RPS,
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum concurrent detail resolutions per page.
    pub concurrency: usize,
    pub scrape_attempts: u32,
    /// Delay before the next page of a chain runs.
    pub continuation_delay_ms: u64,
    /// Deliveries of a failing step before it is dropped.
    pub max_deliveries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            scrape_attempts: DEFAULT_SCRAPE_ATTEMPTS,
            continuation_delay_ms: 0,
            max_deliveries: DEFAULT_MAX_DELIVERIES,
        }
    }
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            concurrency: self.concurrency.max(1),
            scrape_attempts: self.scrape_attempts.max(1),
            continuation_delay: Duration::from_millis(self.continuation_delay_ms),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Ok(token) = std::env::var("GITHUB_TOKEN")
            && !token.is_empty()
        {
            builder = match builder.set_default("github.token", token) {
                Ok(builder) => builder,
                Err(e) => {
                    tracing::warn!("Ignoring GITHUB_TOKEN: {}", e);
                    ConfigBuilder::builder()
                }
            };
        }

        if let Some(proj_dirs) = ProjectDirs::from("", "", "popstats") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("popstats.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./popstats.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // POPSTATS_SYNC__SCRAPE_ATTEMPTS -> sync.scrape_attempts
        builder = builder.add_source(
            Environment::with_prefix("POPSTATS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// `mode=rwc` creates the SQLite file if it does not exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("popstats.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn github_token(&self) -> Option<String> {
        self.github.token.clone().filter(|t| !t.is_empty())
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/popstats` or `~/.local/state/popstats`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "popstats").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}
