use crate::types::{DigestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

const PUBLISH_TIMEOUT_SECS: u64 = 30;
const TOKEN_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// What the CMS reported back. `success: false` is a non-exception failure
/// the orchestrator surfaces as `ghost_error` without failing the run.
#[derive(Debug, Clone, Default)]
pub struct PublishOutcome {
    pub success: bool,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait DraftPublisher: Send + Sync {
    async fn publish_draft(&self, title: &str, html: &str, tags: &[Tag]) -> Result<PublishOutcome>;
}

/// Ghost Admin API client. The admin key is the `keyId:hexSecret` pair shown
/// in the Ghost integration settings; every request carries a short-lived
/// HS256 token derived from it.
pub struct GhostClient {
    client: Client,
    url: String,
    admin_key: String,
}

impl GhostClient {
    pub fn new(url: String, admin_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(PUBLISH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url,
            admin_key,
        }
    }

    fn admin_token(&self) -> Result<String> {
        let (key_id, secret) = self
            .admin_key
            .split_once(':')
            .ok_or_else(|| DigestError::Config("Ghost admin key must be 'id:secret'".to_string()))?;

        let secret = hex::decode(secret)
            .map_err(|e| DigestError::Config(format!("Ghost admin key secret is not hex: {}", e)))?;

        let now = Utc::now().timestamp();
        let claims = AdminTokenClaims {
            iat: now,
            exp: now + TOKEN_TTL_SECS,
            aud: "/admin/".to_string(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(key_id.to_string());

        jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(&secret))
            .map_err(|e| DigestError::Publish(format!("failed to sign admin token: {}", e)))
    }
}

#[async_trait]
impl DraftPublisher for GhostClient {
    async fn publish_draft(&self, title: &str, html: &str, tags: &[Tag]) -> Result<PublishOutcome> {
        let token = self.admin_token()?;
        let endpoint = format!(
            "{}/ghost/api/admin/posts/?source=html",
            self.url.trim_end_matches('/')
        );

        debug!("Publishing draft '{}' to {}", title, endpoint);

        let body = json!({
            "posts": [{
                "title": title,
                "html": html,
                "tags": tags,
                "status": "draft",
            }]
        });

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Ghost {}", token))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Ok(PublishOutcome {
                success: false,
                error: Some(format!("HTTP {}: {}", status.as_u16(), error)),
                ..Default::default()
            });
        }

        let created: PostsResponse = response.json().await?;
        let post = created.posts.into_iter().next();

        let outcome = PublishOutcome {
            success: true,
            post_id: post.as_ref().map(|p| p.id.clone()),
            post_url: post.and_then(|p| p.url),
            error: None,
        };

        info!(
            "Published draft '{}' ({})",
            title,
            outcome.post_url.as_deref().unwrap_or("no url")
        );

        Ok(outcome)
    }
}

#[derive(Debug, Serialize)]
struct AdminTokenClaims {
    iat: i64,
    exp: i64,
    aud: String,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<CreatedPost>,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
    #[serde(default)]
    url: Option<String>,
}
