// src/env.rs

//! Build environment for a toolchain
//!
//! Deriving a compiler environment from vendor setup scripts is left to
//! other [`EnvironmentProvider`] implementations. [`HostEnvironment`] uses
//! the environment of the running process with the bundle's `bin` directory
//! put first on `PATH`.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Produces the environment build steps run in
pub trait EnvironmentProvider {
    fn environment(
        &self,
        bundle: &Path,
        toolchain: &str,
        arch: &str,
    ) -> Result<HashMap<String, String>>;
}

/// Environment of the running process, adjusted for the bundle and toolchain
#[derive(Debug, Clone, Default)]
pub struct HostEnvironment {
    base: Option<HashMap<String, String>>,
}

impl HostEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a fixed set of variables instead of the process environment
    pub fn with_base(base: HashMap<String, String>) -> Self {
        Self { base: Some(base) }
    }
}

impl EnvironmentProvider for HostEnvironment {
    fn environment(
        &self,
        bundle: &Path,
        toolchain: &str,
        arch: &str,
    ) -> Result<HashMap<String, String>> {
        let mut env = self
            .base
            .clone()
            .unwrap_or_else(|| std::env::vars().collect());

        let mut path_entries = vec![bundle.join("bin")];
        if let Some(path) = env.get("PATH") {
            path_entries.extend(std::env::split_paths(path));
        }
        let path = std::env::join_paths(path_entries)
            .map_err(|e| Error::BuildConfig(format!("Invalid PATH entry: {}", e)))?;
        env.insert("PATH".to_string(), path.to_string_lossy().into_owned());

        match toolchain {
            "gcc" => {
                env.insert("CC".to_string(), "gcc".to_string());
                env.insert("CXX".to_string(), "g++".to_string());
            }
            "clang" => {
                env.insert("CC".to_string(), "clang".to_string());
                env.insert("CXX".to_string(), "clang++".to_string());
            }
            tc if tc.starts_with("vc") && !cfg!(windows) => {
                return Err(Error::BuildConfig(format!(
                    "Toolchain {} ({}) is only available on Windows",
                    tc, arch
                )));
            }
            _ => {}
        }

        debug!("Build environment for {} {} prepared", toolchain, arch);
        Ok(env)
    }
}
