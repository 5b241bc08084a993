//! Application configuration with layered loading.
//!
//! Configuration is loaded with figment from multiple sources:
//!
//! 1. Environment variables (PAYLATER_SW_*)
//! 2. TOML config file (if PAYLATER_SW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PAYLATER_SW_*)
/// 2. TOML config file (if PAYLATER_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via PAYLATER_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin that relative manifest locators resolve against.
    ///
    /// Set via PAYLATER_SW_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Cache generation identifier. Bump on every deployment.
    ///
    /// Set via PAYLATER_SW_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Locator of the page served when neither cache nor network can answer.
    ///
    /// Set via PAYLATER_SW_OFFLINE_URL environment variable.
    #[serde(default = "default_offline_url")]
    pub offline_url: String,

    /// Resources fetched and stored at install time.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via PAYLATER_SW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via PAYLATER_SW_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via PAYLATER_SW_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./paylater-sw-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_generation() -> String {
    "paylater-v1".into()
}

fn default_offline_url() -> String {
    "/offline.html".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/offline.html",
        "/manifest.json",
        "/app.js",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
        "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_user_agent() -> String {
    "paylater-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            generation: default_generation(),
            offline_url: default_offline_url(),
            precache: default_precache(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PAYLATER_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PAYLATER_SW_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Whether the offline placeholder is part of the precache manifest.
    pub fn precaches_offline_url(&self) -> bool {
        self.precache.iter().any(|l| l.trim() == self.offline_url.trim())
    }
}
