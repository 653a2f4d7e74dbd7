//! # Configuration
//!
//! Layered configuration for every adapter: built-in defaults, an optional TOML
//! file, then `MEDIA_SOURCES__SECTION__KEY` environment variables, then CLI
//! overrides.

use crate::mapping::MissingTimestamp;
use crate::resilience::RetryConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "MEDIA_SOURCES";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub retry: RetrySettings,
    pub mapping: MappingConfig,
    pub jamendo: JamendoConfig,
    pub archive: ArchiveConfig,
    pub pluto: PlutoConfig,
    pub suno: SunoConfig,
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("media-source-adapters/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Retry budget and backoff for the resilient callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetrySettings {
    #[must_use]
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            jitter: self.jitter,
        }
    }
}

/// Field-mapping behaviour that is a policy decision rather than a fact
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MappingConfig {
    /// What a record with no usable publish date reports
    pub missing_timestamp: MissingTimestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JamendoConfig {
    pub base_url: String,
    pub site_url: String,
    /// Interchangeable client ids, rotated on rate-limit or auth failures
    pub client_ids: Vec<String>,
    pub page_size: u32,
    /// Template for image tokens that are not absolute URLs; `{}` is the token
    pub image_proxy: String,
}

impl Default for JamendoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jamendo.com/v3.0".to_string(),
            site_url: "https://www.jamendo.com".to_string(),
            client_ids: vec![
                "0ed7affd".to_string(),
                "c6b1f8c4".to_string(),
                "2c9bb9a5".to_string(),
            ],
            page_size: 20,
            image_proxy: "https://imgproxy.ra.co/_/quality:75/plain/{}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub page_size: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: "https://archive.org".to_string(),
            page_size: 20,
        }
    }
}

/// Which Pluto TV catalogue the home feed and search draw from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    Live,
    #[serde(rename = "ondemand")]
    OnDemand,
    #[default]
    Both,
}

impl ContentMode {
    #[must_use]
    pub const fn includes_live(self) -> bool {
        matches!(self, Self::Live | Self::Both)
    }

    #[must_use]
    pub const fn includes_on_demand(self) -> bool {
        matches!(self, Self::OnDemand | Self::Both)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlutoConfig {
    pub api_url: String,
    pub site_url: String,
    pub vod_url: String,
    pub boot_url: String,
    pub stitcher_url: String,
    pub region: String,
    pub content: ContentMode,
    /// Bearer token for on-demand content; passed through untouched
    pub auth_token: Option<String>,
    pub max_live_channels: usize,
    pub max_items: usize,
}

impl Default for PlutoConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.pluto.tv".to_string(),
            site_url: "https://pluto.tv".to_string(),
            vod_url: "https://service-vod.clusters.pluto.tv".to_string(),
            boot_url: "https://boot.pluto.tv".to_string(),
            stitcher_url: "https://cfd-v4-service-channel-stitcher-use1-1.prd.pluto.tv"
                .to_string(),
            region: "us".to_string(),
            content: ContentMode::Both,
            auth_token: None,
            max_live_channels: 50,
            max_items: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SunoConfig {
    pub search_url: String,
    pub api_url: String,
    pub site_url: String,
    pub cdn_url: String,
    pub page_size: u32,
}

impl Default for SunoConfig {
    fn default() -> Self {
        Self {
            search_url: "https://studio-api.suno.ai".to_string(),
            api_url: "https://studio-api.prod.suno.com".to_string(),
            site_url: "https://suno.com".to_string(),
            cdn_url: "https://cdn2.suno.ai".to_string(),
            page_size: 30,
        }
    }
}

/// Command-line overrides applied on top of file and environment configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub missing_timestamp: Option<MissingTimestamp>,
    pub pluto_auth_token: Option<String>,
    pub pluto_region: Option<String>,
}

impl Config {
    /// Default location of the configuration file
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("media-sources").join("config.toml"))
    }

    /// Load configuration from an explicit file, the default file (if present),
    /// and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("jamendo.client_ids")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        info!("Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a TOML file only
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(timeout) = overrides.timeout_secs {
            self.http.timeout_secs = timeout;
        }
        if let Some(attempts) = overrides.max_attempts {
            self.retry.max_attempts = attempts;
        }
        if let Some(policy) = overrides.missing_timestamp {
            self.mapping.missing_timestamp = policy;
        }
        if let Some(token) = &overrides.pluto_auth_token {
            self.pluto.auth_token = Some(token.clone());
        }
        if let Some(region) = &overrides.pluto_region {
            self.pluto.region.clone_from(region);
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_input("http.timeout_secs", "must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_input("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(Error::invalid_input("retry.multiplier", "must be at least 1.0"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(Error::invalid_input("retry.jitter", "must be between 0.0 and 1.0"));
        }

        for (field, url) in [
            ("jamendo.base_url", &self.jamendo.base_url),
            ("archive.base_url", &self.archive.base_url),
            ("pluto.api_url", &self.pluto.api_url),
            ("pluto.site_url", &self.pluto.site_url),
            ("pluto.vod_url", &self.pluto.vod_url),
            ("pluto.boot_url", &self.pluto.boot_url),
            ("pluto.stitcher_url", &self.pluto.stitcher_url),
            ("suno.search_url", &self.suno.search_url),
            ("suno.api_url", &self.suno.api_url),
        ] {
            url::Url::parse(url)
                .map_err(|e| Error::invalid_input(field, format!("invalid URL '{url}': {e}")))?;
        }

        if self.jamendo.client_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::invalid_input(
                "jamendo.client_ids",
                "client ids cannot be empty strings",
            ));
        }
        if !self.jamendo.image_proxy.contains("{}") {
            return Err(Error::invalid_input(
                "jamendo.image_proxy",
                "template must contain a '{}' placeholder",
            ));
        }

        for (field, size) in [
            ("jamendo.page_size", self.jamendo.page_size),
            ("archive.page_size", self.archive.page_size),
            ("suno.page_size", self.suno.page_size),
        ] {
            if size == 0 || size > 200 {
                return Err(Error::invalid_input(field, "must be between 1 and 200"));
            }
        }

        if self.pluto.region.trim().is_empty() {
            return Err(Error::invalid_input("pluto.region", "region cannot be empty"));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidInput {
            field: "config".to_string(),
            reason: format!("failed to render TOML: {e}"),
        })
    }
}
