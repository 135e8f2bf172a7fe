#![allow(dead_code)]

use advisory_digest::types::{FeedConfig, RetryConfig};
use chrono::{DateTime, TimeZone, Utc};

pub fn feed_config(id: &str, name: &str, url: &str) -> FeedConfig {
    FeedConfig {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        keywords: Vec::new(),
        docs_url_template: None,
        enrich_cve: false,
        cvss_threshold: None,
        tags: Vec::new(),
        retry: None,
    }
}

/// Retry policy with millisecond delays so retry tests stay fast.
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay_ms: 5,
        backoff_multiplier: 2.0,
    }
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn rss_item(title: &str, link: &str, pub_date: Option<DateTime<Utc>>, description: &str) -> String {
    let pub_date = pub_date
        .map(|date| format!("<pubDate>{}</pubDate>", date.to_rfc2822()))
        .unwrap_or_default();

    format!(
        "<item><title>{}</title><link>{}</link>{}<description>{}</description></item>",
        title, link, pub_date, description
    )
}

pub fn rss_feed(title: &str, items: &[String]) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<rss version=\"2.0\"><channel>",
            "<title>{}</title>",
            "<link>https://example.com/</link>",
            "<description>test feed</description>",
            "{}",
            "</channel></rss>"
        ),
        title,
        items.concat()
    )
}
