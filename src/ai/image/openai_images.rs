//! OpenAI Images generation (base64 PNG)

use async_trait::async_trait;
use backon::Retryable;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::ImageGenerator;
use crate::ai::provider::retry_policy;
use crate::config::ImageConfig;
use crate::constants::network;
use crate::types::{ErrorClassifier, LessonError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiImageGenerator {
    api_key: SecretString,
    api_base: String,
    model: String,
    size: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiImageGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiImageGenerator")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("size", &self.size)
            .finish()
    }
}

impl OpenAiImageGenerator {
    pub fn new(config: &ImageConfig, api_key: Option<&str>) -> Result<Self> {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                LessonError::Config(
                    "OpenAI API key not found for image generation. Set OPENAI_API_KEY or images.generator = \"none\""
                        .to_string(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LessonError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: DEFAULT_API_BASE.to_string(),
            model: config.generation_model.clone(),
            size: config.generation_size.clone(),
            client,
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ImageRequest<'a> {
        ImageRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: &self.size,
            response_format: "b64_json",
        }
    }

    async fn send(&self, request: &ImageRequest<'_>) -> Result<ImageResponse> {
        let url = format!("{}/images/generations", self.api_base);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                LessonError::Llm(ErrorClassifier::classify_transport(&e, "openai-images"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LessonError::Llm(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("OpenAI Images error ({}): {}", status, body),
                "openai-images",
            )));
        }

        response.json().await.map_err(|e| LessonError::ImageResolution {
            prompt: request.prompt.to_string(),
            reason: format!("Failed to parse OpenAI Images response: {}", e),
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Generating image with {} ({})", self.model, self.size);
        let request = self.build_request(prompt);

        let response = (|| self.send(&request))
            .retry(retry_policy(network::MAX_NETWORK_RETRIES))
            .when(|e: &LessonError| e.is_recoverable())
            .notify(|e: &LessonError, delay: Duration| {
                warn!("Image generation failed, retrying in {:?}: {}", delay, e);
            })
            .await?;

        response
            .data
            .into_iter()
            .find_map(|d| d.b64_json)
            .filter(|b64| !b64.is_empty())
            .ok_or_else(|| LessonError::ImageResolution {
                prompt: prompt.to_string(),
                reason: "No image data in response".to_string(),
            })
    }

    fn name(&self) -> &str {
        "openai-images"
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
}
