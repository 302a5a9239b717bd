use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Detection service endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Per-request timeout for the native client; browsers use their own.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Shared polling loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Status checks per task before giving up. `None` polls until the backend
    /// reports a terminal status.
    pub max_attempts: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            max_attempts: None,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

/// Encoding of the pre-processed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub output: OutputFormat,
    pub jpeg_quality: u8,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            output: OutputFormat::Jpeg,
            jpeg_quality: 95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: "recognition_history.json".to_string(),
        }
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub processing: ProcessingConfig,
    pub history: HistoryConfig,
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env`, then the YAML file named by `FLOWER_CONFIG` (if any), then
    /// apply `FLOWER_*` environment overrides.
    #[cfg(feature = "native")]
    pub fn load() -> ConfigResult<Self> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var("FLOWER_CONFIG") {
            Ok(path) => {
                let yaml = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                serde_yaml::from_str(&yaml)?
            }
            Err(_) => PipelineConfig::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        log::info!(
            "Pipeline config: api={}, poll every {} ms",
            config.api.base_url,
            config.polling.interval_ms
        );
        Ok(config)
    }

    /// Apply `FLOWER_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FLOWER_API_URL") {
            self.api.base_url = url;
        }
        if let Some(value) = lookup("FLOWER_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = parse_env("FLOWER_REQUEST_TIMEOUT_SECS", value)?;
        }
        if let Some(value) = lookup("FLOWER_POLL_INTERVAL_MS") {
            self.polling.interval_ms = parse_env("FLOWER_POLL_INTERVAL_MS", value)?;
        }
        if let Some(value) = lookup("FLOWER_MAX_POLL_ATTEMPTS") {
            let keyword = value.trim().to_ascii_lowercase();
            self.polling.max_attempts = match keyword.as_str() {
                "" | "none" | "unlimited" => None,
                _ => Some(parse_env("FLOWER_MAX_POLL_ATTEMPTS", value)?),
            };
        }
        if let Some(path) = lookup("FLOWER_HISTORY_PATH") {
            self.history.path = path;
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.base_url()?;
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.polling.max_attempts == Some(0) {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if !(1..=100).contains(&self.processing.jpeg_quality) {
            return Err(ConfigError::InvalidJpegQuality(self.processing.jpeg_quality));
        }
        Ok(())
    }

    /// Parsed base URL, normalized to end with `/` so endpoint joins keep any path prefix.
    pub fn base_url(&self) -> ConfigResult<Url> {
        let mut raw = self.api.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.api.base_url.clone(),
            source,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}
