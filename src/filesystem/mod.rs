// src/filesystem/mod.rs

//! Filesystem operations for Cellar
//!
//! This module provides:
//! - Ant-style hierarchical wildcard matching of paths
//! - Globbing of those patterns against the filesystem
//! - Symlink-preserving copy and tolerant removal
//! - Staging of build output into a bundle

mod glob;
mod ops;
pub mod pattern;
mod stage;

pub use glob::{Glob, glob};
pub use ops::{copy, remove};
pub use pattern::{match_any, matches};
pub use stage::copy_into_bundle;
