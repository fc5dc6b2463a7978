// src/commands/list.rs
//! Queries on the current bundle's manifest

use super::{load_config, open_current_bundle};
use anyhow::{Context, Result};
use cellar::Category;

/// List installed packages, or the recorded files of one package
pub fn cmd_list(package: Option<&str>, category: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let bundle = open_current_bundle(&config)?;
    let manifest = bundle.manifest();

    let Some(name) = package else {
        let packages = manifest.installed().context("Failed to query installed packages")?;
        if packages.is_empty() {
            println!("No packages installed in {}", bundle.path().display());
            return Ok(());
        }

        println!("Installed packages ({}):", packages.len());
        for pkg in &packages {
            let deps = manifest.deps(&pkg.name)?;
            if deps.is_empty() {
                println!("  {} {}", pkg.name, pkg.version);
            } else {
                println!("  {} {} (depends on: {})", pkg.name, pkg.version, deps.join(", "));
            }
        }
        return Ok(());
    };

    let category = category
        .map(|c| Category::parse(c).ok_or_else(|| anyhow::anyhow!("Unknown category '{}'", c)))
        .transpose()?;

    let files = manifest
        .list_files(name, category)
        .with_context(|| format!("Failed to list files of {}", name))?;
    for file in &files {
        println!("{}\t{}", file.category, file.name);
    }
    Ok(())
}
