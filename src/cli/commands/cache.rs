//! Cache Command
//!
//! Inspect and clear the content cache.
//!
//! Usage:
//!   lessonloom cache info
//!   lessonloom cache keys [--prefix P]
//!   lessonloom cache clear [--prefix P]

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::{format_bytes, load_config};
use crate::storage::ContentCache;
use crate::types::Result;

pub fn info(config_path: Option<&Path>, as_json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = ContentCache::open(&config.cache)?;
    let info = cache.storage_info();
    let entries = cache.keys_by_prefix("").len();

    if as_json {
        let status = serde_json::json!({
            "backend": config.cache.backend,
            "path": ContentCache::resolved_path(&config.cache),
            "entries": entries,
            "usage": info,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let out = Output::new();
    out.header("Content Cache");
    out.field("Backend", format!("{:?}", config.cache.backend).to_lowercase());
    if let Some(path) = ContentCache::resolved_path(&config.cache) {
        out.field("Path", path.display());
    }
    out.field("Entries", entries);
    out.field("Used", format_bytes(info.used_bytes));
    out.field("Capacity", format_bytes(info.total_bytes));
    out.field("Usage", format!("{:.1}%", info.percentage_used));
    Ok(())
}

pub fn keys(config_path: Option<&Path>, prefix: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = ContentCache::open(&config.cache)?;

    for key in cache.keys_by_prefix(prefix.unwrap_or("")) {
        println!("{}", key);
    }
    Ok(())
}

pub fn clear(config_path: Option<&Path>, prefix: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = ContentCache::open(&config.cache)?;

    let removed = match prefix {
        Some(prefix) => cache.clear_prefix(prefix),
        None => cache.clear(),
    };

    Output::new().success(&format!("Removed {} cache entries", removed));
    Ok(())
}
