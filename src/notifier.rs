use crate::types::{DigestError, DigestRunResult, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

const NOTIFY_TIMEOUT_SECS: u64 = 15;

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Delivers one message to all targets. Failures are reported to the
    /// caller but never abort a digest run.
    async fn notify(&self, targets: &[String], message: &str) -> Result<()>;
}

/// Plain-text summary of a finished run, sent to the notification targets.
pub fn build_digest_notification(result: &DigestRunResult, title: &str) -> String {
    let mut message = format!(
        "{}\n{} feeds processed, {} advisories, {} firmware releases, {} CVEs",
        title,
        result.feeds_processed,
        result.total_items,
        result.total_firmware,
        result.total_cves
    );

    if let Some(url) = &result.ghost_url {
        message.push_str(&format!("\nDraft: {}", url));
    }
    if let Some(error) = &result.ghost_error {
        message.push_str(&format!("\nPublish failed: {}", error));
    }

    message
}

/// Sends digest notifications to `telegram:<chat_id>` targets through the
/// Telegram Bot API. Targets with an unknown scheme are skipped with a
/// warning.
pub struct TelegramSender {
    client: Client,
    bot_token: Option<String>,
    api_base: String,
}

impl TelegramSender {
    pub fn new(bot_token: Option<String>) -> Self {
        Self::with_api_base(bot_token, "https://api.telegram.org".to_string())
    }

    /// Points the sender at an alternate API host, used by tests.
    pub fn with_api_base(bot_token: Option<String>, api_base: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            bot_token,
            api_base,
        }
    }

    async fn send_telegram(&self, chat_id: &str, message: &str) -> Result<()> {
        let bot_token = self.bot_token.as_deref().ok_or_else(|| {
            DigestError::Notify("telegram target configured without a bot token".to_string())
        })?;

        let endpoint = format!("{}/bot{}/sendMessage", self.api_base, bot_token);
        let response = self
            .client
            .post(&endpoint)
            .json(&json!({ "chat_id": chat_id, "text": message }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Notify(format!(
                "telegram returned HTTP {} for chat {}",
                status.as_u16(),
                chat_id
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn notify(&self, targets: &[String], message: &str) -> Result<()> {
        let mut failures = Vec::new();

        for target in targets {
            if let Some(chat_id) = target.strip_prefix("telegram:") {
                match self.send_telegram(chat_id, message).await {
                    Ok(()) => info!("Notified {}", target),
                    Err(e) => failures.push(format!("{}: {}", target, e)),
                }
            } else {
                warn!("Skipping notification target with unknown scheme: {}", target);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DigestError::Notify(failures.join("; ")))
        }
    }
}
