//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/lessonloom/config.toml)
//! 3. Project config (.lessonloom/config.toml)
//! 4. Environment variables (LESSONLOOM_*)
//! 5. CLI arguments (highest priority)

mod loader;
mod types;

pub use loader::{ConfigLoader, ENV_PREFIX, PROJECT_DIR};
pub use types::*;
