use crate::types::RawEntry;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

/// Keeps entries published within `[start, end)` that match at least one
/// configured keyword. An empty keyword list matches everything. Entries
/// without a parseable publish timestamp are treated as out-of-window.
pub fn filter_entries(
    entries: Vec<RawEntry>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    keywords: &[String],
) -> Vec<RawEntry> {
    entries
        .into_iter()
        .filter(|entry| {
            let in_window = match entry.published {
                Some(ts) => ts >= start && ts < end,
                None => false,
            };
            in_window && matches_keywords(entry, keywords)
        })
        .collect()
}

fn matches_keywords(entry: &RawEntry, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }

    let title = entry.title.to_lowercase();
    let snippet = entry.snippet.as_deref().unwrap_or("").to_lowercase();

    keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        title.contains(&keyword) || snippet.contains(&keyword)
    })
}

/// Collapses entries sharing the same link, keeping the first occurrence
/// in input order.
pub fn dedupe_by_link(entries: Vec<RawEntry>) -> Vec<RawEntry> {
    let mut seen_links = HashSet::new();
    let mut unique = Vec::with_capacity(entries.len());

    for entry in entries {
        if seen_links.insert(entry.link.clone()) {
            unique.push(entry);
        } else {
            debug!("Skipping duplicate entry with link: {}", entry.link);
        }
    }

    unique
}
