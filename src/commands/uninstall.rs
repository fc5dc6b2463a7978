// src/commands/uninstall.rs
//! Package removal

use super::{load_config, open_current_bundle};
use anyhow::{Context, Result};
use std::path::Path;

/// Remove a package, and unless `keep` is set, everything depending on it
pub fn cmd_uninstall(package: &str, keep: bool) -> Result<()> {
    let config = load_config()?;
    let bundle = open_current_bundle(&config)?;

    let name = package_name(package);
    let removed = cellar::builder::uninstall(&bundle, &name, keep)
        .with_context(|| format!("Failed to uninstall {}", name))?;

    println!("Removed: {}", removed.join(", "));
    Ok(())
}

/// Package name for an argument that may be a path to a formula file
fn package_name(arg: &str) -> String {
    let path = Path::new(arg);
    let looks_like_path = path.components().count() > 1 || arg.ends_with(".toml");
    if looks_like_path && let Some(stem) = path.file_stem() {
        return stem.to_string_lossy().into_owned();
    }
    arg.to_string()
}
