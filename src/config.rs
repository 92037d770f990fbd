use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::limiter::{DEFAULT_MAX_CALLS, RateLimitConfig};

pub const API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";
/// Longest accepted limiter window: one day.
pub const MAX_WINDOW_SECS: u64 = 86_400;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlphaVantageConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            api_key: "demo".to_string(),
            base_url: "https://www.alphavantage.co/query".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_calls: usize,
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
            window_secs: 60,
        }
    }
}

impl RateLimitSettings {
    pub fn to_limiter_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_calls: self.max_calls,
            window: Duration::from_secs(self.window_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CacheSettings {
    // Persist the daily cache to this JSON file; in-memory when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConverterConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.frankfurter.app".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub alpha_vantage: AlphaVantageConfig,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub converter: ConverterConfig,

    // Upper bound on one historical fetch, on top of the HTTP client timeout.
    pub fetch_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            alpha_vantage: AlphaVantageConfig::default(),
            rate_limit: RateLimitSettings::default(),
            cache: CacheSettings::default(),
            converter: ConverterConfig::default(),
            fetch_timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from the 'config.yaml' file in the current working directory.
    /// `ALPHA_VANTAGE_API_KEY`, when set, overrides the configured key.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_content = fs::read_to_string("config.yaml")
            .map_err(|_| "❌ Failed to read config.yaml. Make sure the file exists in the root directory.")?;

        let config = Self::from_yaml_str(&yaml_content)?
            .with_api_key_override(std::env::var(API_KEY_ENV).ok());

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: ServiceConfig = serde_yaml::from_str(yaml)
            .map_err(|e| format!("❌ Failed to parse config.yaml: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces the API key with `key` when it is present and non-empty.
    pub fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.alpha_vantage.api_key = key.trim().to_string();
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.rate_limit.max_calls == 0 {
            return Err("❌ rate_limit.max_calls in config.yaml must be at least 1".into());
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.window_secs > MAX_WINDOW_SECS {
            return Err(format!(
                "❌ rate_limit.window_secs in config.yaml must be between 1 and {}",
                MAX_WINDOW_SECS
            )
            .into());
        }
        if self.fetch_timeout_secs == 0 {
            return Err("❌ fetch_timeout_secs in config.yaml must be at least 1".into());
        }
        if self.alpha_vantage.api_key.trim().is_empty() {
            return Err("❌ alpha_vantage.api_key in config.yaml is empty!".into());
        }
        Ok(())
    }
}
