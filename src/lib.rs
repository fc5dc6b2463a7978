// src/lib.rs

//! Cellar: source-based builds of native library bundles
//!
//! A bundle is a directory of libraries built from source for one
//! toolchain and architecture, tracked by a SQLite manifest. Libraries are
//! described by formulas; installing one resolves its dependencies, fetches
//! and patches the sources, builds them in dependency order and stages the
//! results into the bundle by category.
//!
//! # Architecture
//!
//! - [`graph`]: dependency graph with ordered, cycle-checked traversal
//! - [`formula`]: build recipes, TOML loading and the formula registry
//! - [`source`]: fetch and stage strategies for archive, git, hg and svn
//! - [`filesystem`]: Ant-style pattern matching and artifact staging
//! - [`manifest`]: installed packages, files and dependency edges
//! - [`builder`]: install and uninstall orchestration

pub mod builder;
pub mod bundle;
pub mod config;
pub mod env;
mod error;
pub mod fileset;
pub mod filesystem;
pub mod formula;
pub mod graph;
pub mod manifest;
pub mod source;
pub mod system;

pub use builder::{BuildContext, FormulaBuilder, InstallOptions};
pub use bundle::Bundle;
pub use config::Config;
pub use error::{Error, Result};
pub use fileset::{Category, FileSet};
pub use formula::{Formula, Registry};
pub use graph::DependencyGraph;
pub use manifest::Manifest;
