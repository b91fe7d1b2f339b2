//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/lessonloom/) and project (.lessonloom/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ai::provider::ProviderConfig;
use crate::constants::{cache as cache_constants, network, pipeline as pipeline_constants};
use crate::types::{ContentType, LessonError, Level, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Text generation backend
    pub llm: LlmConfig,

    /// Image search and generation backends
    pub images: ImageConfig,

    /// Durable content cache
    pub cache: CacheConfig,

    /// Generation pipeline behavior
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            images: ImageConfig::default(),
            cache: CacheConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `LessonError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(LessonError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(LessonError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.cache.capacity_bytes == 0 || self.cache.max_item_bytes == 0 {
            return Err(LessonError::Config(
                "Cache capacity_bytes and max_item_bytes must be greater than 0".to_string(),
            ));
        }

        if self.cache.max_item_bytes > self.cache.capacity_bytes {
            return Err(LessonError::Config(format!(
                "Cache max_item_bytes ({}) exceeds capacity_bytes ({})",
                self.cache.max_item_bytes, self.cache.capacity_bytes
            )));
        }

        if !(0.0..=1.0).contains(&self.cache.eviction_threshold)
            || self.cache.eviction_threshold == 0.0
        {
            return Err(LessonError::Config(format!(
                "Cache eviction_threshold must be in (0.0, 1.0], got {}",
                self.cache.eviction_threshold
            )));
        }

        if self.pipeline.page_concurrency == 0
            || self.pipeline.page_concurrency > pipeline_constants::MAX_PAGE_CONCURRENCY
        {
            return Err(LessonError::Config(format!(
                "Pipeline page_concurrency must be between 1 and {}, got {}",
                pipeline_constants::MAX_PAGE_CONCURRENCY,
                self.pipeline.page_concurrency
            )));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai" or "ollama"
    pub provider: String,

    /// Model name (provider default when empty)
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for generation (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Maximum tokens per response
    pub max_tokens: usize,

    /// Custom endpoint base URL
    pub api_base: Option<String>,

    /// API key; prefer the provider's environment variable
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Retries for rate-limit, network and 5xx failures
    pub max_retries: usize,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.7,
            max_tokens: 4096,
            api_base: None,
            api_key: None,
            max_retries: network::MAX_NETWORK_RETRIES,
        }
    }
}

impl LlmConfig {
    /// Provider construction parameters
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
            temperature: self.temperature,
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone(),
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
        }
    }
}

// =============================================================================
// Image Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Search backend: "unsplash" or "none"
    pub search_provider: String,

    /// Search API key (falls back to UNSPLASH_ACCESS_KEY)
    #[serde(skip_serializing)]
    pub search_api_key: Option<String>,

    /// Generation backend: "openai" or "none"
    pub generator: String,

    /// Image generation model
    pub generation_model: String,

    /// Generated image size, e.g. "1024x1024"
    pub generation_size: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ImageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageConfig")
            .field("search_provider", &self.search_provider)
            .field(
                "search_api_key",
                &self.search_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("generator", &self.generator)
            .field("generation_model", &self.generation_model)
            .field("generation_size", &self.generation_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            search_provider: "unsplash".to_string(),
            search_api_key: None,
            generator: "openai".to_string(),
            generation_model: "dall-e-3".to_string(),
            generation_size: "1024x1024".to_string(),
            timeout_secs: network::IMAGE_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

/// Storage backend for the content cache
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend kind
    pub backend: CacheBackendKind,

    /// SQLite file (defaults to .lessonloom/cache.db)
    pub path: Option<PathBuf>,

    /// Total capacity in bytes
    pub capacity_bytes: usize,

    /// Per-item ceiling in bytes
    pub max_item_bytes: usize,

    /// Usage ratio that triggers eviction
    pub eviction_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Sqlite,
            path: None,
            capacity_bytes: cache_constants::DEFAULT_CAPACITY_BYTES,
            max_item_bytes: cache_constants::DEFAULT_MAX_ITEM_BYTES,
            eviction_threshold: cache_constants::EVICTION_THRESHOLD,
        }
    }
}

// =============================================================================
// Pipeline Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pages generated concurrently (1 = strictly sequential)
    pub page_concurrency: usize,

    /// Run the tone/verbosity refinement pass on each page
    pub refine_content: bool,

    /// Generate a quiz for the final References page as well
    pub quiz_for_references: bool,

    /// Level used when the CLI does not specify one
    pub default_level: Level,

    /// Content type used when the CLI does not specify one
    pub default_content_type: ContentType,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_concurrency: pipeline_constants::DEFAULT_PAGE_CONCURRENCY,
            refine_content: true,
            quiz_for_references: true,
            default_level: Level::SchoolKid,
            default_content_type: ContentType::Concise,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.cache.capacity_bytes, 5 * 1024 * 1024);
        assert_eq!(config.pipeline.page_concurrency, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.page_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.max_item_bytes = config.cache.capacity_bytes + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_is_redacted_and_not_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".to_string());

        let debug = format!("{:?}", config.llm);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));

        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("sk-secret"));
    }

    #[test]
    fn test_cache_backend_deserialize() {
        let config: CacheConfig = toml::from_str("backend = \"memory\"").unwrap();
        assert_eq!(config.backend, CacheBackendKind::Memory);
        assert_eq!(config.max_item_bytes, 1024 * 1024);
    }
}
