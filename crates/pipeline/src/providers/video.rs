//! Video renderers.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ProviderError, RenderedVideo, VideoRenderer};

/// Length of the narration digest embedded in placeholder URLs.
const DIGEST_LEN: usize = 12;

// ---------------------------------------------------------------------------
// HTTP render service
// ---------------------------------------------------------------------------

/// Posts `{ "script": narration }` to a render service and expects
/// `{ "videoUrl", "thumbnailUrl"? }` back.
pub struct HttpVideoRenderer {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderResponse {
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

impl HttpVideoRenderer {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl VideoRenderer for HttpVideoRenderer {
    async fn render(&self, narration: &str) -> Result<RenderedVideo, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "script": narration }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<RenderResponse>().await?;
        match parsed.video_url.filter(|url| !url.trim().is_empty()) {
            Some(video_url) => Ok(RenderedVideo {
                video_url,
                thumbnail_url: parsed.thumbnail_url,
            }),
            None => Err(ProviderError::EmptyResponse),
        }
    }
}

// ---------------------------------------------------------------------------
// Placeholder
// ---------------------------------------------------------------------------

/// Development renderer: returns `{base}/videos/{millis}_{digest}.mp4`
/// without rendering anything.
pub struct PlaceholderVideoRenderer {
    base_url: String,
}

impl PlaceholderVideoRenderer {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, narration: &str, millis: i64) -> String {
        let digest = Sha256::digest(narration.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!(
            "{}/videos/{millis}_{}.mp4",
            self.base_url,
            &hex[..DIGEST_LEN]
        )
    }
}

#[async_trait]
impl VideoRenderer for PlaceholderVideoRenderer {
    async fn render(&self, narration: &str) -> Result<RenderedVideo, ProviderError> {
        let millis = chrono::Utc::now().timestamp_millis();
        Ok(RenderedVideo {
            video_url: self.url_for(narration, millis),
            thumbnail_url: None,
        })
    }
}
