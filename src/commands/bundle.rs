// src/commands/bundle.rs
//! Bundle creation, selection and archiving

use super::{load_config, open_current_bundle};
use anyhow::{Context, Result};
use cellar::Bundle;
use cellar::bundle::expand_path_template;
use cellar::system::{Runner, os_name};
use std::path::{Path, PathBuf};
use tracing::info;

/// Create a bundle and make it the current one
pub fn cmd_new(path: &str, toolchain: &str, arch: &str) -> Result<()> {
    let mut config = load_config()?;
    let platform = os_name();

    let expanded = PathBuf::from(expand_path_template(path, platform, toolchain, arch));
    let path = if expanded.components().count() == 1 {
        config.root().join(expanded)
    } else {
        std::path::absolute(&expanded)?
    };

    Bundle::create(&path, platform, toolchain, arch)
        .with_context(|| format!("Failed to create bundle {}", path.display()))?;

    config.current_bundle = Some(path.clone());
    config.save().context("Failed to save configuration")?;

    println!("Created bundle {} ({} {} {})", path.display(), platform, toolchain, arch);
    Ok(())
}

/// Make an existing bundle the current one
pub fn cmd_use(path: &Path) -> Result<()> {
    let mut config = load_config()?;
    let path = std::path::absolute(path)?;

    let bundle =
        Bundle::load(&path).with_context(|| format!("{} is not a bundle", path.display()))?;
    info!(
        "Selected bundle {} ({} {} {})",
        path.display(),
        bundle.platform(),
        bundle.toolchain(),
        bundle.arch()
    );

    config.current_bundle = Some(path.clone());
    config.save().context("Failed to save configuration")?;

    println!("Using bundle {}", path.display());
    Ok(())
}

/// Pack the current bundle into a 7z or zip archive
pub fn cmd_archive(dest: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let bundle = open_current_bundle(&config)?;

    let dest = match dest {
        Some(dir) => dir.to_path_buf(),
        None => bundle
            .path()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let archive = bundle
        .archive(&Runner::from_host(), &dest)
        .with_context(|| format!("Failed to archive bundle {}", bundle.path().display()))?;
    println!("Created {}", archive.display());
    Ok(())
}
