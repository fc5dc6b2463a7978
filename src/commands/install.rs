// src/commands/install.rs
//! Formula installation

use super::{load_config, open_current_bundle};
use anyhow::{Context, Result};
use cellar::builder::{BuildContext, FormulaBuilder, InstallOptions, ShellPause};
use cellar::env::HostEnvironment;
use cellar::formula::Registry;
use cellar::source::SourceLayout;
use cellar::system::os_name;
use tracing::info;

/// Build a formula and its dependencies into the current bundle
pub fn cmd_install(formula: &str, force: bool, interactive: bool, clean_src: bool) -> Result<()> {
    let config = load_config()?;
    let bundle = open_current_bundle(&config)?;
    info!("Installing {} into {}", formula, bundle.path().display());

    let registry = Registry::with_toml(
        config.search_paths(),
        bundle.toolchain(),
        bundle.arch(),
        os_name(),
    );
    let build_dir = config.build_dir(bundle.toolchain(), bundle.arch());
    let context = BuildContext::new(
        &bundle,
        &HostEnvironment::new(),
        build_dir.clone(),
        config.tmp_install_dir(),
    )
    .context("Failed to set up the build environment")?;
    let layout = SourceLayout::new(config.source_cache(), build_dir);

    let mut builder = FormulaBuilder::new(bundle, registry, context, layout);
    if interactive {
        println!("Type 'exit' to continue with the installation, 'exit 1' to abort");
        builder = builder.with_pause(Box::new(ShellPause));
    }

    let options = InstallOptions {
        force,
        clean_source: clean_src,
    };
    match builder.install(formula, &options) {
        Ok(built) if built.is_empty() => {
            println!("Nothing to do, {} is already installed", formula);
        }
        Ok(built) => {
            println!("Installed: {}", built.join(", "));
        }
        Err(e) if e.is_abort() => {
            println!("Installation aborted");
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to install {}", formula));
        }
    }

    Ok(())
}
