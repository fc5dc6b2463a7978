// src/cli/mod.rs
//! CLI definitions for Cellar
//!
//! The command implementations are in the `commands` module. Every command
//! except `new`, `use` and `formula-path` works on the current bundle.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cellar")]
#[command(version)]
#[command(about = "Build native library bundles from source", long_about = None)]
pub struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new bundle and make it the current one
    New {
        /// Bundle directory; may contain {platform}, {toolchain} and {arch}.
        /// A plain name is created under the configured root.
        path: String,

        /// Toolchain to build with (e.g. gcc, clang, vc12)
        toolchain: String,

        /// Target architecture (x86, x64)
        arch: String,
    },

    /// Make an existing bundle the current one
    Use {
        /// Bundle directory
        path: PathBuf,
    },

    /// Build a formula and its dependencies into the current bundle
    Install {
        /// Formula name, kit.name, or path to a formula file or directory
        formula: String,

        /// Rebuild even if already installed
        #[arg(short, long)]
        force: bool,

        /// Start a shell after the source is fetched and patched
        #[arg(short, long)]
        interactive: bool,

        /// Delete working copies and stage the source again
        #[arg(long)]
        clean_src: bool,
    },

    /// Remove a package from the current bundle
    Uninstall {
        /// Package name (a formula path is accepted too)
        package: String,

        /// Keep packages that depend on it
        #[arg(short, long)]
        keep: bool,
    },

    /// Create a compressed archive of the current bundle
    Archive {
        /// Directory to create the archive in (default: next to the bundle)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Show or set the formula search path
    FormulaPath {
        /// Directory to search for formulas
        path: Option<PathBuf>,

        /// Add to the search path instead of replacing it
        #[arg(short, long, requires = "path")]
        append: bool,
    },

    /// List installed packages, or the files of one package
    List {
        /// Package to list files for
        package: Option<String>,

        /// Only files of this category (build, build_dbg, run, run_dbg)
        #[arg(short, long, requires = "package")]
        category: Option<String>,
    },
}
