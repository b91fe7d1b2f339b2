//! CLI Common Utilities
//!
//! Shared configuration and cache setup for command handlers.

use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, ConfigLoader};
use crate::storage::{ContentCache, SharedCache};
use crate::types::Result;

/// Resources every command that touches lessons needs
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    pub cache: SharedCache,
}

impl CommandContext {
    /// Load configuration (from `config_path` when given) and open the cache
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        let cache = Arc::new(ContentCache::open(&config.cache)?);
        Ok(Self { config, cache })
    }
}

/// Resolve configuration from an explicit file or the standard chain
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let b = bytes as f64;
    if b >= MIB {
        format!("{:.2} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}
