// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::New { path, toolchain, arch } => commands::cmd_new(&path, &toolchain, &arch),
        Commands::Use { path } => commands::cmd_use(&path),
        Commands::Install {
            formula,
            force,
            interactive,
            clean_src,
        } => commands::cmd_install(&formula, force, interactive, clean_src),
        Commands::Uninstall { package, keep } => commands::cmd_uninstall(&package, keep),
        Commands::Archive { path } => commands::cmd_archive(path.as_deref()),
        Commands::FormulaPath { path, append } => {
            commands::cmd_formula_path(path.as_deref(), append)
        }
        Commands::List { package, category } => {
            commands::cmd_list(package.as_deref(), category.as_deref())
        }
    }
}
