//! Unsplash photo search

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{FoundImage, ImageSearch};
use crate::config::ImageConfig;
use crate::types::{ErrorClassifier, LessonError, Result};

const DEFAULT_API_BASE: &str = "https://api.unsplash.com";

pub struct UnsplashSearch {
    access_key: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for UnsplashSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnsplashSearch")
            .field("access_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl UnsplashSearch {
    pub fn new(config: &ImageConfig) -> Result<Self> {
        let access_key = config
            .search_api_key
            .clone()
            .or_else(|| std::env::var("UNSPLASH_ACCESS_KEY").ok())
            .ok_or_else(|| {
                LessonError::Config(
                    "Unsplash access key not found. Set UNSPLASH_ACCESS_KEY or images.search_provider = \"none\""
                        .to_string(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LessonError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            access_key: SecretString::from(access_key),
            api_base: DEFAULT_API_BASE.to_string(),
            client,
        })
    }

    fn search_url(&self, query: &str) -> Result<url::Url> {
        url::Url::parse_with_params(
            &format!("{}/search/photos", self.api_base),
            &[("query", query), ("per_page", "1")],
        )
        .map_err(|e| LessonError::Config(format!("Invalid Unsplash URL: {}", e)))
    }
}

#[async_trait]
impl ImageSearch for UnsplashSearch {
    async fn search(&self, query: &str) -> Result<Option<FoundImage>> {
        let url = self.search_url(query)?;
        debug!("Searching Unsplash for '{}'", query);

        let response = self
            .client
            .get(url)
            .header(
                "Authorization",
                format!("Client-ID {}", self.access_key.expose_secret()),
            )
            .header("Accept-Version", "v1")
            .send()
            .await
            .map_err(|e| LessonError::Llm(ErrorClassifier::classify_transport(&e, "unsplash")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LessonError::Llm(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("Unsplash API error ({}): {}", status, body),
                "unsplash",
            )));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            LessonError::ImageResolution {
                prompt: query.to_string(),
                reason: format!("Failed to parse Unsplash response: {}", e),
            }
        })?;

        Ok(body.results.into_iter().next().map(FoundImage::from))
    }

    fn name(&self) -> &str {
        "unsplash"
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
    #[serde(default)]
    alt_description: Option<String>,
    #[serde(default)]
    user: Option<PhotoUser>,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct PhotoUser {
    name: String,
}

impl From<Photo> for FoundImage {
    fn from(photo: Photo) -> Self {
        Self {
            url: photo.urls.regular,
            alt: photo.alt_description,
            credit: photo.user.map(|u| u.name),
        }
    }
}
