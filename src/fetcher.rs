use crate::filter::{dedupe_by_link, filter_entries};
use crate::firmware::{self, classify_release, parse_release_title};
use crate::types::{
    DigestError, FeedConfig, FeedItem, FirmwareEntry, RawEntry, Result, RetryConfig,
};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("advisory-digest/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Outcome of fetching and reducing a single feed: the advisory items that
/// survived filtering and dedup, plus the firmware releases derived from
/// them. Both views coexist; extraction does not consume items.
#[derive(Debug, Clone, Default)]
pub struct FeedFetchResult {
    pub items: Vec<FeedItem>,
    pub firmware: Vec<FirmwareEntry>,
}

pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetches one feed with exponential backoff, then runs the entries
    /// through the window/keyword filter, link dedup, and firmware
    /// extraction. After `max_retries` failed retries the last error is
    /// propagated unchanged.
    pub async fn fetch_feed(
        &self,
        feed: &FeedConfig,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        retry: Option<&RetryConfig>,
    ) -> Result<FeedFetchResult> {
        let default_retry;
        let retry = match retry {
            Some(retry) => retry,
            None => {
                default_retry = RetryConfig::default();
                &default_retry
            }
        };

        let mut delays: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_millis(retry.initial_delay_ms),
            initial_interval: Duration::from_millis(retry.initial_delay_ms),
            randomization_factor: 0.0,
            multiplier: retry.backoff_multiplier,
            max_interval: Duration::from_secs(3600),
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=retry.max_retries {
            match self.fetch_entries(&feed.url).await {
                Ok(entries) => {
                    debug!("Feed '{}': {} raw entries", feed.name, entries.len());
                    return Ok(reduce_entries(feed, entries, start, end));
                }
                Err(e) => {
                    if attempt < retry.max_retries {
                        let delay = delays
                            .next_backoff()
                            .unwrap_or(Duration::from_millis(retry.initial_delay_ms));
                        warn!(
                            "Attempt {} failed for feed '{}', retrying in {:?}: {}",
                            attempt + 1,
                            feed.name,
                            delay,
                            e
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DigestError::Fetch("unknown error".to_string())))
    }

    /// One fetch attempt: HTTP GET plus syndication parse. A non-2xx status
    /// or unparseable body counts as a failed attempt.
    async fn fetch_entries(&self, url: &str) -> Result<Vec<RawEntry>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(DigestError::Fetch(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.bytes().await?;
        let feed = parser::parse(body.as_ref())
            .map_err(|e| DigestError::Parse(format!("failed to parse feed: {}", e)))?;

        Ok(feed
            .entries
            .into_iter()
            .filter_map(raw_entry_from)
            .collect())
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn raw_entry_from(entry: feed_rs::model::Entry) -> Option<RawEntry> {
    let link = entry.links.first()?.href.clone();
    let title = entry
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled".to_string());
    let snippet = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body));
    let published = entry.published.map(|dt| dt.with_timezone(&Utc));

    Some(RawEntry {
        title,
        link,
        published,
        snippet,
    })
}

/// Filter -> dedup -> extract, in that order. Item counts reflect the
/// deduplicated set; extraction runs over the same set in the same order.
fn reduce_entries(
    feed: &FeedConfig,
    entries: Vec<RawEntry>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> FeedFetchResult {
    let entries = filter_entries(entries, start, end, &feed.keywords);
    let entries = dedupe_by_link(entries);

    let mut items = Vec::with_capacity(entries.len());
    let mut firmware = Vec::new();

    for entry in &entries {
        let Some(pub_date) = entry.published else {
            continue;
        };

        if let Some(release) = firmware::extract(entry, feed, classify_release) {
            firmware.push(release);
        }

        let (product, version) = match parse_release_title(&entry.title) {
            Some((product, version)) => (Some(product.to_lowercase()), Some(version)),
            None => (None, None),
        };

        items.push(FeedItem {
            title: entry.title.clone(),
            link: entry.link.clone(),
            pub_date,
            content: entry.snippet.clone(),
            version,
            product,
            feed_id: feed.id.clone(),
            feed_name: feed.name.clone(),
        });
    }

    info!(
        "Feed '{}': kept {} items, {} firmware releases",
        feed.name,
        items.len(),
        firmware.len()
    );

    FeedFetchResult { items, firmware }
}
