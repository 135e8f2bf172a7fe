use crate::types::{CveEntry, DigestError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const NVD_BASE_URL: &str = "https://services.nvd.nist.gov";
const NVD_TIMEOUT_SECS: u64 = 30;

/// Vulnerability database collaborator. The orchestrator only decides which
/// feeds request enrichment and with what arguments; lookups may fail and
/// are treated as non-fatal by the caller.
#[async_trait]
pub trait CveSource: Send + Sync {
    async fn fetch_cves(
        &self,
        keywords: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cvss_threshold: f64,
        feed_id: &str,
        api_key: Option<&str>,
    ) -> Result<Vec<CveEntry>>;
}

/// NVD CVE API 2.0 client.
pub struct NvdClient {
    client: Client,
    base_url: String,
}

impl NvdClient {
    pub fn new() -> Self {
        Self::with_base_url(NVD_BASE_URL.to_string())
    }

    /// Points the client at an alternate API host, used by tests.
    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(NVD_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }
}

impl Default for NvdClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CveSource for NvdClient {
    async fn fetch_cves(
        &self,
        keywords: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cvss_threshold: f64,
        feed_id: &str,
        api_key: Option<&str>,
    ) -> Result<Vec<CveEntry>> {
        let endpoint = format!("{}/rest/json/cves/2.0", self.base_url);
        let keyword_search = keywords.join(" ");
        let pub_start = format_nvd_date(start);
        let pub_end = format_nvd_date(end);

        debug!(
            "Querying NVD for feed '{}': keywords='{}', window {}..{}",
            feed_id, keyword_search, start, end
        );

        let mut request = self.client.get(&endpoint).query(&[
            ("keywordSearch", keyword_search.as_str()),
            ("pubStartDate", pub_start.as_str()),
            ("pubEndDate", pub_end.as_str()),
        ]);

        if let Some(api_key) = api_key {
            request = request.header("apiKey", api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Enrichment(format!(
                "NVD returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: NvdResponse = response.json().await?;

        let entries: Vec<CveEntry> = body
            .vulnerabilities
            .into_iter()
            .filter_map(|vulnerability| {
                let cve = vulnerability.cve;
                let score = cve.base_score()?;
                if score < cvss_threshold {
                    return None;
                }
                Some(CveEntry {
                    url: format!("https://nvd.nist.gov/vuln/detail/{}", cve.id),
                    description: cve.english_description(),
                    id: cve.id,
                    score,
                    feed_id: feed_id.to_string(),
                })
            })
            .collect();

        info!(
            "NVD lookup for feed '{}': {} CVEs at or above CVSS {}",
            feed_id,
            entries.len(),
            cvss_threshold
        );

        Ok(entries)
    }
}

/// NVD expects extended ISO 8601 with milliseconds and no offset suffix.
fn format_nvd_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

#[derive(Debug, Deserialize)]
struct NvdResponse {
    #[serde(default)]
    vulnerabilities: Vec<NvdVulnerability>,
}

#[derive(Debug, Deserialize)]
struct NvdVulnerability {
    cve: NvdCve,
}

#[derive(Debug, Deserialize)]
struct NvdCve {
    id: String,
    #[serde(default)]
    descriptions: Vec<NvdDescription>,
    #[serde(default)]
    metrics: NvdMetrics,
}

impl NvdCve {
    /// Highest CVSS v3.1 base score, if any metric is present.
    fn base_score(&self) -> Option<f64> {
        self.metrics
            .cvss_metric_v31
            .iter()
            .map(|metric| metric.cvss_data.base_score)
            .fold(None, |best, score| match best {
                Some(best) if best >= score => Some(best),
                _ => Some(score),
            })
    }

    fn english_description(&self) -> String {
        self.descriptions
            .iter()
            .find(|description| description.lang == "en")
            .or_else(|| self.descriptions.first())
            .map(|description| description.value.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct NvdDescription {
    lang: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct NvdMetrics {
    #[serde(rename = "cvssMetricV31", default)]
    cvss_metric_v31: Vec<NvdCvssMetric>,
}

#[derive(Debug, Deserialize)]
struct NvdCvssMetric {
    #[serde(rename = "cvssData")]
    cvss_data: NvdCvssData,
}

#[derive(Debug, Deserialize)]
struct NvdCvssData {
    #[serde(rename = "baseScore")]
    base_score: f64,
}
