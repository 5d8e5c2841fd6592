use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::application::compare::{CompareSettings, DiffSource};
use crate::application::session::VisibilityFilter;

/// Prefix for environment overrides, e.g. `PAYLOADIFF__STORE__BASE_URL`.
pub const ENV_PREFIX: &str = "PAYLOADIFF";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub compare: CompareConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Root of the store API, e.g. "https://payloads.internal:7216".
    pub base_url: String,
    #[serde(default = "default_template_id")]
    pub default_template_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bearer token sent with every request. Usually supplied through
    /// `PAYLOADIFF__STORE__ACCESS_TOKEN` rather than the file.
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_template_id() -> String {
    "default".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompareConfig {
    #[serde(default)]
    pub diff_source: DiffSource,
    #[serde(default = "default_log_checks")]
    pub log_checks: bool,
    #[serde(default)]
    pub filter: VisibilityFilter,
}

fn default_log_checks() -> bool {
    true
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            diff_source: DiffSource::default(),
            log_checks: default_log_checks(),
            filter: VisibilityFilter::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    "./output".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl AppConfig {
    /// Load `path` (TOML) and apply `PAYLOADIFF__*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let cfg = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        cfg.try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// `<config dir>/payloadiff/config.toml`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("payloadiff").join("config.toml"))
    }

    pub fn compare_settings(&self) -> CompareSettings {
        CompareSettings {
            default_template_id: self.store.default_template_id.clone(),
            diff_source: self.compare.diff_source,
            log_checks: self.compare.log_checks,
        }
    }
}
