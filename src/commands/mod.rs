// src/commands/mod.rs
//! Command handlers for the Cellar CLI

mod bundle;
mod formula_path;
mod install;
mod list;
mod uninstall;

pub use bundle::{cmd_archive, cmd_new, cmd_use};
pub use formula_path::cmd_formula_path;
pub use install::cmd_install;
pub use list::cmd_list;
pub use uninstall::cmd_uninstall;

use anyhow::{Context, Result};
use cellar::{Bundle, Config};

/// Load the user configuration
fn load_config() -> Result<Config> {
    Config::load_default().context("Failed to load configuration")
}

/// Open the bundle selected with `new` or `use`
fn open_current_bundle(config: &Config) -> Result<Bundle> {
    let path = config.require_bundle()?;
    Bundle::load(&path).with_context(|| format!("Failed to open bundle {}", path.display()))
}
