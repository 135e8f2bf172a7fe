use crate::types::{DigestError, FeedConfig, Result, RetryConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;
use url::Url;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, Clone, Deserialize)]
pub struct GhostConfig {
    pub url: String,
    pub admin_key: String,
}

/// Host configuration for a digest run, loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default)]
    pub ghost: Option<GhostConfig>,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub notify_bot_token: Option<String>,
    #[serde(default)]
    pub nvd_api_key: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            ghost: None,
            notify: Vec::new(),
            notify_bot_token: None,
            nvd_api_key: None,
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!(
            "Loaded config from {}: {} feeds, lookback {} days",
            path.display(),
            config.feeds.len(),
            config.lookback_days
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookback_days <= 0 {
            return Err(DigestError::Config(format!(
                "lookback_days must be positive, got {}",
                self.lookback_days
            )));
        }

        for feed in &self.feeds {
            Url::parse(&feed.url).map_err(|e| {
                DigestError::Config(format!("feed '{}' has an invalid URL: {}", feed.id, e))
            })?;
        }

        Ok(())
    }
}

fn default_lookback_days() -> i64 {
    DEFAULT_LOOKBACK_DAYS
}
