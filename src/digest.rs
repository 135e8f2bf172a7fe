use crate::config::AppConfig;
use crate::cve::{CveSource, NvdClient};
use crate::fetcher::Fetcher;
use crate::ghost::{DraftPublisher, GhostClient, Tag};
use crate::notifier::{build_digest_notification, NotificationSender, TelegramSender};
use crate::types::{CveEntry, DigestRunResult, FeedConfig, FeedItem, FirmwareEntry};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const DEFAULT_CVSS_THRESHOLD: f64 = 7.0;
const DIGEST_TITLE_SUFFIX: &str = "Security & Firmware Digest";

#[derive(Debug, Clone, Copy, Default)]
pub struct RunArgs {
    pub dry_run: bool,
}

/// Drives one digest run: resolves the date window, walks the configured
/// feeds sequentially through the fetch pipeline, enriches with CVE data,
/// assembles the digest document, and publishes/notifies unless dry-running.
///
/// Every per-feed and per-collaborator failure is caught here, logged with
/// the offending feed or target, and folded into the aggregate result. The
/// run itself always completes.
pub struct DigestRunner {
    config: AppConfig,
    fetcher: Fetcher,
    cve_source: Arc<dyn CveSource>,
    publisher: Option<Arc<dyn DraftPublisher>>,
    notifier: Arc<dyn NotificationSender>,
}

impl DigestRunner {
    /// Wires the runner with the production collaborators. The publisher is
    /// only present when a Ghost target is configured.
    pub fn new(config: AppConfig) -> Self {
        let publisher: Option<Arc<dyn DraftPublisher>> = config
            .ghost
            .as_ref()
            .map(|ghost| {
                Arc::new(GhostClient::new(ghost.url.clone(), ghost.admin_key.clone()))
                    as Arc<dyn DraftPublisher>
            });
        let notifier: Arc<dyn NotificationSender> =
            Arc::new(TelegramSender::new(config.notify_bot_token.clone()));

        Self {
            config,
            fetcher: Fetcher::new(),
            cve_source: Arc::new(NvdClient::new()),
            publisher,
            notifier,
        }
    }

    /// Swaps in alternate collaborators, used by tests and embedders.
    pub fn with_collaborators(
        config: AppConfig,
        cve_source: Arc<dyn CveSource>,
        publisher: Option<Arc<dyn DraftPublisher>>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            config,
            fetcher: Fetcher::new(),
            cve_source,
            publisher,
            notifier,
        }
    }

    pub async fn execute(&self, args: RunArgs) -> DigestRunResult {
        let run_id = Uuid::new_v4();
        let mut result = DigestRunResult::empty(args.dry_run);

        info!("Starting digest run {} (dry_run: {})", run_id, args.dry_run);

        if self.config.feeds.is_empty() {
            warn!("No feeds configured, nothing to digest");
            return result;
        }

        let (start, end) = resolve_window(self.config.lookback_days);
        info!("Digest window: {} .. {}", start, end);

        let mut items: Vec<FeedItem> = Vec::new();
        let mut firmware: Vec<FirmwareEntry> = Vec::new();
        let mut contributing: Vec<&FeedConfig> = Vec::new();

        for feed in &self.config.feeds {
            let retry = feed.retry.as_ref().unwrap_or(&self.config.retry);
            match self.fetcher.fetch_feed(feed, start, end, Some(retry)).await {
                Ok(fetched) => {
                    items.extend(fetched.items);
                    firmware.extend(fetched.firmware);
                    contributing.push(feed);
                }
                Err(e) => {
                    error!("Feed '{}' failed after retries: {}", feed.name, e);
                }
            }
            result.feeds_processed += 1;
        }

        let cves = self.enrich_cves(start, end).await;

        result.total_items = items.len();
        result.total_cves = cves.len();
        result.total_firmware = firmware.len();

        let title = digest_title(&contributing);
        let html = render_digest_html(&items, &firmware, &cves, start, end);
        let tags = collect_tags(&contributing);

        if args.dry_run {
            info!("Dry run: skipping publish and notifications");
        } else {
            self.publish(&mut result, &title, &html, &tags).await;
            self.send_notifications(&mut result, &title).await;
        }

        info!(
            "Digest run {} complete: {} feeds, {} items, {} firmware releases, {} CVEs",
            run_id,
            result.feeds_processed,
            result.total_items,
            result.total_firmware,
            result.total_cves
        );

        result
    }

    /// Best-effort CVE enrichment for every feed that opted in. A lookup
    /// failure contributes nothing and never aborts the run.
    async fn enrich_cves(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<CveEntry> {
        let mut cves = Vec::new();

        for feed in &self.config.feeds {
            if !feed.enrich_cve {
                continue;
            }

            let threshold = feed.cvss_threshold.unwrap_or(DEFAULT_CVSS_THRESHOLD);
            match self
                .cve_source
                .fetch_cves(
                    &feed.keywords,
                    start,
                    end,
                    threshold,
                    &feed.id,
                    self.config.nvd_api_key.as_deref(),
                )
                .await
            {
                Ok(found) => {
                    info!("Feed '{}': {} CVEs from enrichment", feed.name, found.len());
                    cves.extend(found);
                }
                Err(e) => {
                    error!("CVE enrichment for feed '{}' failed: {}", feed.name, e);
                }
            }
        }

        cves
    }

    async fn publish(&self, result: &mut DigestRunResult, title: &str, html: &str, tags: &[Tag]) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        match publisher.publish_draft(title, html, tags).await {
            Ok(outcome) if outcome.success => {
                info!(
                    "Published digest draft ({})",
                    outcome.post_url.as_deref().unwrap_or("no url")
                );
                result.ghost_url = outcome.post_url;
            }
            Ok(outcome) => {
                let error = outcome.error.unwrap_or_else(|| "unknown error".to_string());
                error!("Ghost publish failed: {}", error);
                result.ghost_error = Some(error);
            }
            Err(e) => {
                error!("Ghost publish failed: {}", e);
                result.ghost_error = Some(e.to_string());
            }
        }
    }

    async fn send_notifications(&self, result: &mut DigestRunResult, title: &str) {
        if self.config.notify.is_empty() {
            return;
        }

        let message = build_digest_notification(result, title);
        match self.notifier.notify(&self.config.notify, &message).await {
            Ok(()) => {
                info!("Notified {} targets", self.config.notify.len());
                result.notified = true;
            }
            Err(e) => {
                error!("Notification dispatch failed: {}", e);
            }
        }
    }
}

/// `end` is the start of the current UTC day; `start` reaches back
/// `lookback_days` whole days. Shared by every feed in the run.
fn resolve_window(lookback_days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = Utc::now()
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    let start = end - Duration::days(lookback_days);
    (start, end)
}

/// Title from the deduplicated names of feeds that contributed, e.g.
/// "Fortinet & BSI Security & Firmware Digest".
fn digest_title(contributing: &[&FeedConfig]) -> String {
    let mut seen = HashSet::new();
    let names: Vec<&str> = contributing
        .iter()
        .map(|feed| feed.name.as_str())
        .filter(|name| seen.insert(*name))
        .collect();

    if names.is_empty() {
        DIGEST_TITLE_SUFFIX.to_string()
    } else {
        format!("{} {}", names.join(" & "), DIGEST_TITLE_SUFFIX)
    }
}

/// First-seen-order deduplicated union of the contributing feeds' tags.
fn collect_tags(contributing: &[&FeedConfig]) -> Vec<Tag> {
    let mut seen = HashSet::new();
    contributing
        .iter()
        .flat_map(|feed| feed.tags.iter())
        .filter(|tag| seen.insert(tag.as_str()))
        .map(|tag| Tag { name: tag.clone() })
        .collect()
}

fn render_digest_html(
    items: &[FeedItem],
    firmware: &[FirmwareEntry],
    cves: &[CveEntry],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> String {
    let mut html = String::new();

    html.push_str(&format!(
        "<p>Advisories published between {} and {}.</p>\n",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    ));

    if !firmware.is_empty() {
        html.push_str("<h2>Firmware Releases</h2>\n<ul>\n");
        for release in firmware {
            html.push_str(&format!(
                "<li><strong>{} {}</strong> ({})",
                escape_html(&release.product),
                escape_html(&release.version),
                release.release_type
            ));
            if let Some(docs_url) = &release.docs_url {
                html.push_str(&format!(
                    " &ndash; <a href=\"{}\">Release notes</a>",
                    escape_html(docs_url)
                ));
            }
            html.push_str("</li>\n");
        }
        html.push_str("</ul>\n");
    }

    if !items.is_empty() {
        html.push_str("<h2>Advisories</h2>\n");
        let mut current_feed = None;
        for item in items {
            if current_feed != Some(&item.feed_name) {
                if current_feed.is_some() {
                    html.push_str("</ul>\n");
                }
                html.push_str(&format!("<h3>{}</h3>\n<ul>\n", escape_html(&item.feed_name)));
                current_feed = Some(&item.feed_name);
            }
            html.push_str(&format!(
                "<li><a href=\"{}\">{}</a> ({})</li>\n",
                escape_html(&item.link),
                escape_html(&item.title),
                item.pub_date.format("%Y-%m-%d")
            ));
        }
        html.push_str("</ul>\n");
    }

    if !cves.is_empty() {
        html.push_str("<h2>Related CVEs</h2>\n<ul>\n");
        for cve in cves {
            html.push_str(&format!(
                "<li><strong><a href=\"{}\">{}</a></strong> (CVSS {:.1}) {}</li>\n",
                escape_html(&cve.url),
                escape_html(&cve.id),
                cve.score,
                escape_html(&cve.description)
            ));
        }
        html.push_str("</ul>\n");
    }

    if firmware.is_empty() && items.is_empty() && cves.is_empty() {
        html.push_str("<p>No advisories matched this digest window.</p>\n");
    }

    html
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
