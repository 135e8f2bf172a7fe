use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One configured RSS/Atom source with its own filter/enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub docs_url_template: Option<String>,
    #[serde(default)]
    pub enrich_cve: bool,
    #[serde(default)]
    pub cvss_threshold: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Per-feed override of the run-wide retry policy.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

/// A syndication entry as parsed off the wire, before window filtering.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub snippet: Option<String>,
}

/// One advisory item that survived the window/keyword filter and dedup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub pub_date: DateTime<Utc>,
    pub content: Option<String>,
    pub version: Option<String>,
    pub product: Option<String>,
    pub feed_id: String,
    pub feed_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseType {
    Feature,
    Major,
    Patch,
}

impl std::fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseType::Feature => write!(f, "Feature"),
            ReleaseType::Major => write!(f, "Major"),
            ReleaseType::Patch => write!(f, "Patch"),
        }
    }
}

/// Firmware release derived from an item whose title matches the
/// `<Product> <version> release notes` convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareEntry {
    pub product: String,
    pub version: String,
    pub release_type: ReleaseType,
    pub pub_date: String,
    pub docs_url: Option<String>,
    pub feed_id: String,
    pub feed_name: String,
}

/// CVE record as returned by the vulnerability database collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveEntry {
    pub id: String,
    pub score: f64,
    pub description: String,
    pub url: String,
    pub feed_id: String,
}

/// Aggregate outcome of one digest run. Lives for a single invocation,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestRunResult {
    pub success: bool,
    pub feeds_processed: usize,
    pub total_items: usize,
    pub total_cves: usize,
    pub total_firmware: usize,
    pub ghost_url: Option<String>,
    pub ghost_error: Option<String>,
    pub notified: bool,
    pub dry_run: bool,
}

impl DigestRunResult {
    pub fn empty(dry_run: bool) -> Self {
        Self {
            success: true,
            feeds_processed: 0,
            total_items: 0,
            total_cves: 0,
            total_firmware: 0,
            ghost_url: None,
            ghost_error: None,
            notified: false,
            dry_run,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed fetch failed: {0}")]
    Fetch(String),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("CVE lookup failed: {0}")]
    Enrichment(String),

    #[error("draft publish failed: {0}")]
    Publish(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DigestError>;
