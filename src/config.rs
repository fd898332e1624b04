use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use dirs_next::config_dir;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::types::Language;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
pub const ENV_PREFIX: &str = "NEXUS";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub search: SearchConfig,
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Anime-sama scraper base URL.
    pub base_url: String,
    /// Local backend hosting `/api/embed`.
    pub backend_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_step_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    pub min_query_len: usize,
    pub trending_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    pub default_language: Language,
    pub player: String,
    pub auto_load: bool,
    #[serde(default)]
    pub episode_table: Option<PathBuf>,
}

impl AppConfig {
    /// Built-in defaults, then the user file (if any), then `NEXUS_*` variables.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let user_path = match override_path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path(),
        };

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));
        if let Some(path) = &user_path {
            builder = builder.add_source(
                File::new(&path.to_string_lossy(), FileFormat::Toml)
                    .required(override_path.is_some()),
            );
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("failed to assemble configuration")?;
        settings
            .try_deserialize()
            .context("failed to parse configuration")
    }

    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("otaku-nexus").join("config.toml"))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        if self.retry.max_attempts <= 1 {
            return RetryPolicy::no_retry();
        }
        RetryPolicy::linear(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.backoff_step_ms),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .expect("built-in default config is valid TOML")
    }
}
