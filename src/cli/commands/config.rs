//! Config Command
//!
//! Manage lessonloom configuration.
//!
//! Usage:
//!   lessonloom config show [--global] [--json]
//!   lessonloom config path
//!   lessonloom config init [--global] [--force]

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged configuration, or the raw global file
pub fn show(global: bool, as_json: bool) -> Result<()> {
    if !global {
        return ConfigLoader::show_config(as_json);
    }

    let out = Output::new();
    match ConfigLoader::global_config_path() {
        Some(path) if path.exists() => {
            println!("# Global Config: {}\n", path.display());
            println!("{}", std::fs::read_to_string(&path)?);
        }
        Some(_) => {
            out.info("No global config found.");
            out.info("Run 'lessonloom config init --global' to create one.");
        }
        None => out.warning("Cannot determine global config directory."),
    }
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init(global: bool, force: bool) -> Result<()> {
    let config_path = if global {
        ConfigLoader::init_global(force)?
    } else {
        ConfigLoader::init_project(force)?
    };

    let out = Output::new();
    out.success(if global {
        "Initialized global configuration"
    } else {
        "Initialized project configuration"
    });
    out.field("Config", config_path.display());
    Ok(())
}
