use crate::types::{FeedConfig, FirmwareEntry, RawEntry, ReleaseType};
use regex::Regex;
use std::sync::LazyLock;

/// Titles following the `<Product> <version> release notes` convention,
/// e.g. "FortiGate 7.4.4 release notes".
static RELEASE_TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([A-Za-z]+)\s+(\d+(?:\.\d+)*)\s+release\s+notes$").unwrap()
});

/// Classifies a release from its version string and snippet wording.
/// Must be deterministic for a given input pair.
pub type ReleaseClassifier = fn(version: &str, snippet: &str) -> ReleaseType;

/// Default classification heuristic: explicit "feature" wording wins, a
/// zero patch segment marks a major/minor line release, everything else
/// is a patch.
pub fn classify_release(version: &str, snippet: &str) -> ReleaseType {
    let snippet = snippet.to_lowercase();

    if snippet.contains("feature") {
        return ReleaseType::Feature;
    }
    if version.split('.').next_back() == Some("0") {
        return ReleaseType::Major;
    }
    ReleaseType::Patch
}

/// Splits a release-notes title into its product and version parts.
/// Returns the product as written in the title.
pub fn parse_release_title(title: &str) -> Option<(String, String)> {
    let captures = RELEASE_TITLE_PATTERN.captures(title.trim())?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

/// Derives a firmware release from an entry whose title matches the
/// release-notes convention. Entries without a publish timestamp never
/// reach this point (the window filter drops them).
pub fn extract(
    entry: &RawEntry,
    feed: &FeedConfig,
    classify: ReleaseClassifier,
) -> Option<FirmwareEntry> {
    let (product, version) = parse_release_title(&entry.title)?;
    let pub_date = entry.published?;

    let snippet = entry.snippet.as_deref().unwrap_or("");
    let release_type = classify(&version, snippet);

    let docs_url = feed
        .docs_url_template
        .as_ref()
        .map(|template| render_docs_url(template, &product, &version));

    Some(FirmwareEntry {
        product: product.to_uppercase(),
        version,
        release_type,
        pub_date: pub_date.to_rfc3339(),
        docs_url,
        feed_id: feed.id.clone(),
        feed_name: feed.name.clone(),
    })
}

fn render_docs_url(template: &str, product: &str, version: &str) -> String {
    template
        .replace("{product}", &product.to_lowercase())
        .replace("{version}", version)
}
