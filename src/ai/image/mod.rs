//! Image Backends
//!
//! Two seams used by the image enrichment stage:
//! - [`ImageSearch`]: stock photo lookup by a short query
//! - [`ImageGenerator`]: text-to-image generation returning base64 PNG
//!
//! Either backend may be disabled in configuration; the resolver then skips
//! that step.

mod openai_images;
mod unsplash;

pub use openai_images::OpenAiImageGenerator;
pub use unsplash::UnsplashSearch;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ImageConfig;
use crate::types::{LessonError, Result};

/// A photo found by search
#[derive(Debug, Clone, PartialEq)]
pub struct FoundImage {
    /// Direct image URL
    pub url: String,
    /// Alt text/description from the provider
    pub alt: Option<String>,
    /// Photographer credit, if provided
    pub credit: Option<String>,
}

/// Stock image search
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// First matching image, or `None` when the search has no results
    async fn search(&self, query: &str) -> Result<Option<FoundImage>>;

    fn name(&self) -> &str;
}

/// Text-to-image generation
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Base64-encoded PNG for `prompt`
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

pub type SharedImageSearch = Arc<dyn ImageSearch>;
pub type SharedImageGenerator = Arc<dyn ImageGenerator>;

/// Build the configured search backend (`None` when disabled)
pub fn create_image_search(config: &ImageConfig) -> Result<Option<SharedImageSearch>> {
    match config.search_provider.as_str() {
        "none" | "" => Ok(None),
        "unsplash" => Ok(Some(Arc::new(UnsplashSearch::new(config)?))),
        other => Err(LessonError::Config(format!(
            "Unknown image search provider: {}. Supported: unsplash, none",
            other
        ))),
    }
}

/// Build the configured generation backend (`None` when disabled)
pub fn create_image_generator(
    config: &ImageConfig,
    api_key: Option<&str>,
) -> Result<Option<SharedImageGenerator>> {
    match config.generator.as_str() {
        "none" | "" => Ok(None),
        "openai" => Ok(Some(Arc::new(OpenAiImageGenerator::new(config, api_key)?))),
        other => Err(LessonError::Config(format!(
            "Unknown image generator: {}. Supported: openai, none",
            other
        ))),
    }
}
