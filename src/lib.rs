pub mod config;
pub mod cve;
pub mod digest;
pub mod fetcher;
pub mod filter;
pub mod firmware;
pub mod ghost;
pub mod notifier;
pub mod types;

pub use config::{AppConfig, GhostConfig};
pub use cve::{CveSource, NvdClient};
pub use digest::{DigestRunner, RunArgs};
pub use fetcher::{FeedFetchResult, Fetcher};
pub use ghost::{DraftPublisher, GhostClient, PublishOutcome, Tag};
pub use notifier::{build_digest_notification, NotificationSender, TelegramSender};
pub use types::*;
