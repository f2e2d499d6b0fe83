//! Adapters for the external AI services: a text model used for the script
//! and quiz, and a video renderer that turns narration into a video URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod text;
pub mod video;

pub use text::GeminiTextGenerator;
pub use video::{HttpVideoRenderer, PlaceholderVideoRenderer};

/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default base URL for placeholder video links.
pub const DEFAULT_VIDEO_CDN_BASE_URL: &str = "https://cdn.local";

const DEFAULT_TEXT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider is not configured (e.g. no API key).
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Prompt in, free text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedVideo {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
}

/// Narration in, video location out.
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    async fn render(&self, narration: &str) -> Result<RenderedVideo, ProviderError>;
}

/// Provider settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Upper bound on one text-model call.
    pub text_timeout: Duration,
    /// Render service endpoint. Without one, placeholder URLs are produced.
    pub video_render_url: Option<String>,
    pub video_cdn_base_url: String,
    /// Upper bound on one render call.
    pub video_timeout: Duration,
}

impl ProviderConfig {
    /// Load provider configuration from environment variables.
    ///
    /// | Env var               | Default                                      |
    /// |-----------------------|----------------------------------------------|
    /// | `GOOGLE_API_KEY`      | unset (text calls fail as unavailable)       |
    /// | `GEMINI_MODEL`        | `gemini-2.5-flash`                           |
    /// | `GEMINI_BASE_URL`     | `https://generativelanguage.googleapis.com`  |
    /// | `TEXT_TIMEOUT_SECS`   | `120`                                        |
    /// | `VIDEO_RENDER_URL`    | unset (placeholder renderer)                 |
    /// | `VIDEO_CDN_BASE_URL`  | `https://cdn.local`                          |
    /// | `VIDEO_TIMEOUT_SECS`  | `600`                                        |
    pub fn from_env() -> Self {
        let google_api_key = std::env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let gemini_model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.into());

        let gemini_base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.into());

        let text_timeout_secs: u64 = std::env::var("TEXT_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TEXT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("TEXT_TIMEOUT_SECS must be a valid u64");

        let video_render_url = std::env::var("VIDEO_RENDER_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let video_cdn_base_url = std::env::var("VIDEO_CDN_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_VIDEO_CDN_BASE_URL.into());

        let video_timeout_secs: u64 = std::env::var("VIDEO_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_VIDEO_TIMEOUT_SECS.to_string())
            .parse()
            .expect("VIDEO_TIMEOUT_SECS must be a valid u64");

        Self {
            google_api_key,
            gemini_model,
            gemini_base_url,
            text_timeout: Duration::from_secs(text_timeout_secs),
            video_render_url,
            video_cdn_base_url,
            video_timeout: Duration::from_secs(video_timeout_secs),
        }
    }

    pub fn text_generator(&self, client: reqwest::Client) -> Arc<dyn TextGenerator> {
        Arc::new(GeminiTextGenerator::new(
            client,
            self.gemini_base_url.clone(),
            self.gemini_model.clone(),
            self.google_api_key.clone(),
        ))
    }

    pub fn video_renderer(&self, client: reqwest::Client) -> Arc<dyn VideoRenderer> {
        match &self.video_render_url {
            Some(url) => Arc::new(HttpVideoRenderer::new(client, url.clone())),
            None => {
                tracing::warn!(
                    cdn_base_url = %self.video_cdn_base_url,
                    "VIDEO_RENDER_URL not set; using placeholder video renderer",
                );
                Arc::new(PlaceholderVideoRenderer::new(self.video_cdn_base_url.clone()))
            }
        }
    }
}
