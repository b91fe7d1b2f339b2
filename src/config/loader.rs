//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/lessonloom/config.toml)
//! 3. Project config (.lessonloom/config.toml)
//! 4. Environment variables (LESSONLOOM_* prefix, `__` separates sections)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{LessonError, Result};

/// Project data directory name
pub const PROJECT_DIR: &str = ".lessonloom";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LESSONLOOM_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        Self::extract(figment.merge(Self::env_provider()))
    }

    /// Load configuration from a specific file (plus environment overrides)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Self::env_provider());
        Self::extract(figment)
    }

    /// e.g. LESSONLOOM_LLM__MODEL -> llm.model
    fn env_provider() -> Env {
        Env::prefixed(ENV_PREFIX).split("__").lowercase(true)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| LessonError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Global config directory (platform config dir + lessonloom)
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lessonloom").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(PROJECT_DIR)
    }

    /// Default SQLite cache location
    pub fn default_cache_path() -> PathBuf {
        Self::project_dir().join("cache.db")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());

        let cache = Self::default_cache_path();
        let exists = if cache.exists() { "✓" } else { "✗" };
        println!("  Cache:   {} {}", exists, cache.display());
    }

    /// Show current effective configuration
    pub fn show_config(as_json: bool) -> Result<()> {
        let config = Self::load()?;

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| LessonError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            LessonError::Config("Cannot determine global config directory".to_string())
        })?;
        Self::write_config(&global_dir, force)
    }

    /// Initialize project configuration in `.lessonloom/`
    pub fn init_project(force: bool) -> Result<PathBuf> {
        Self::write_config(&Self::project_dir(), force)
    }

    fn write_config(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_config_template())?;
            info!("Created config: {}", config_path.display());
        } else {
            info!("Config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Default config file content (TOML)
    fn default_config_template() -> String {
        r#"# lessonloom configuration
# Project settings in .lessonloom/config.toml override the global file.
# Environment overrides use LESSONLOOM_<SECTION>__<KEY>, e.g. LESSONLOOM_LLM__MODEL.

version = "1.0"

[llm]
provider = "openai"        # openai | ollama
# model = "gpt-4o-mini"
timeout_secs = 300
temperature = 0.7
max_tokens = 4096
max_retries = 3

[images]
search_provider = "unsplash"   # unsplash | none (key from UNSPLASH_ACCESS_KEY)
generator = "openai"           # openai | none
generation_model = "dall-e-3"
generation_size = "1024x1024"

[cache]
backend = "sqlite"             # sqlite | memory
capacity_bytes = 5242880
max_item_bytes = 1048576
eviction_threshold = 0.9

[pipeline]
page_concurrency = 1
refine_content = true
quiz_for_references = true
default_level = "school-kid"
default_content_type = "concise"
"#
        .to_string()
    }
}
