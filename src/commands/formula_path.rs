// src/commands/formula_path.rs
//! Formula search path configuration

use super::load_config;
use anyhow::{Context, Result};
use std::path::Path;

/// Show the formula search path, replacing or extending it first if a
/// directory is given
pub fn cmd_formula_path(path: Option<&Path>, append: bool) -> Result<()> {
    let mut config = load_config()?;

    if let Some(path) = path {
        let path = std::path::absolute(path)?;
        if append {
            if !config.formula_paths.contains(&path) {
                config.formula_paths.push(path);
            }
        } else {
            config.formula_paths = vec![path];
        }
        config.save().context("Failed to save configuration")?;
    }

    println!("Formula search path:");
    for dir in config.search_paths() {
        println!("  {}", dir.display());
    }
    Ok(())
}
