use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
use crate::strategies::ExtractionOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per-request defaults, overridable from the CLI
    pub defaults: DefaultsConfig,

    /// Per-backend settings
    pub strategies: StrategiesConfig,

    /// Circuit breaker settings
    pub breaker: BreakerConfig,

    /// Retry/backoff settings used inside backends
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Ordered language preference; `*` means "any"
    pub preferred_languages: Vec<String>,

    /// Prefix transcript lines with timestamps
    pub include_timestamps: bool,

    /// Per-strategy attempt timeout
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategiesConfig {
    pub watch_page: WatchPageConfig,
    pub innertube: InnertubeConfig,
    pub ytdlp: YtdlpConfig,
    pub data_api: DataApiConfig,
    pub scraping_api: ScrapingApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchPageConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnertubeConfig {
    pub enabled: bool,

    /// Skip registering this memory-heavy backend below this headroom
    pub min_free_memory_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtdlpConfig {
    pub enabled: bool,

    /// Path or command name of the external downloader
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataApiConfig {
    pub enabled: bool,

    /// Official data API key; the backend stays disabled without one
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingApiConfig {
    pub enabled: bool,

    /// Third-party scraping API base URL
    pub endpoint: String,

    /// Token-provider base URL
    pub token_endpoint: String,

    /// How long an acquired token stays cached
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout_ms: u64,
    pub success_threshold: u32,

    /// One breaker per strategy instead of the shared default.
    /// The shared breaker trades fallback diversity for system-wide
    /// fail-fast under sustained upstream failure.
    pub per_strategy: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig {
                preferred_languages: vec!["en".to_string(), "*".to_string()],
                include_timestamps: true,
                timeout_ms: 30_000,
            },
            strategies: StrategiesConfig {
                watch_page: WatchPageConfig { enabled: true },
                innertube: InnertubeConfig {
                    enabled: true,
                    min_free_memory_mb: 512,
                },
                ytdlp: YtdlpConfig {
                    enabled: true,
                    path: "yt-dlp".to_string(),
                },
                data_api: DataApiConfig {
                    enabled: false,
                    api_key: None,
                },
                scraping_api: ScrapingApiConfig {
                    enabled: false,
                    endpoint: "".to_string(),
                    token_endpoint: "".to_string(),
                    token_ttl_secs: 300,
                },
            },
            breaker: BreakerConfig {
                failure_threshold: 5,
                open_timeout_ms: 30_000,
                success_threshold: 2,
                per_strategy: false,
            },
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-fetcher").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.breaker.failure_threshold == 0 {
            anyhow::bail!("breaker.failure_threshold must be at least 1");
        }
        if self.breaker.success_threshold == 0 {
            anyhow::bail!("breaker.success_threshold must be at least 1");
        }
        if self.defaults.preferred_languages.is_empty() {
            anyhow::bail!("defaults.preferred_languages must not be empty");
        }
        if self.strategies.scraping_api.enabled
            && (self.strategies.scraping_api.endpoint.is_empty()
                || self.strategies.scraping_api.token_endpoint.is_empty())
        {
            anyhow::bail!("scraping_api requires endpoint and token_endpoint when enabled");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Languages: {}", self.defaults.preferred_languages.join(", "));
        println!("  Timestamps: {}", self.defaults.include_timestamps);
        println!("  Attempt Timeout: {} ms", self.defaults.timeout_ms);
        println!(
            "  Breaker: threshold={} open_timeout={}ms per_strategy={}",
            self.breaker.failure_threshold,
            self.breaker.open_timeout_ms,
            self.breaker.per_strategy
        );
        println!(
            "  Retry: max_retries={} base_delay={}ms",
            self.retry.max_retries, self.retry.base_delay_ms
        );
        println!("  watch_page: enabled={}", self.strategies.watch_page.enabled);
        println!(
            "  innertube: enabled={} min_free_memory={}MB",
            self.strategies.innertube.enabled, self.strategies.innertube.min_free_memory_mb
        );
        println!(
            "  ytdlp: enabled={} path={}",
            self.strategies.ytdlp.enabled, self.strategies.ytdlp.path
        );
        println!(
            "  data_api: enabled={} key_configured={}",
            self.strategies.data_api.enabled,
            self.strategies.data_api.api_key.is_some()
        );
        println!("  scraping_api: enabled={}", self.strategies.scraping_api.enabled);
    }

    /// Per-request extraction defaults from this config
    pub fn default_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            preferred_languages: self.defaults.preferred_languages.clone(),
            include_timestamps: self.defaults.include_timestamps,
            timeout_ms: self.defaults.timeout_ms,
        }
    }

    /// Breaker settings in the resilience layer's shape
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            open_timeout_ms: self.breaker.open_timeout_ms,
            success_threshold: self.breaker.success_threshold,
        }
    }
}
