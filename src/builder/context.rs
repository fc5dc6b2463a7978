// src/builder/context.rs

//! Per-run build context handed to formulas

use crate::bundle::Bundle;
use crate::env::EnvironmentProvider;
use crate::error::Result;
use crate::filesystem;
use crate::system::{self, Runner};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Everything a formula needs to know about the bundle it builds for
///
/// Created once per install run and read-only to formulas. The install
/// dir is a scratch area wiped before every formula build.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub bundle_path: PathBuf,
    pub toolchain: String,
    pub arch: String,
    pub os_name: String,
    /// Environment every build subprocess runs with
    pub environment: HashMap<String, String>,
    /// Directory holding the working copies
    pub build_dir: PathBuf,
    /// Where builds install before files are staged into the bundle
    pub install_dir: PathBuf,
}

impl BuildContext {
    /// Context for `bundle`, with the environment taken from `provider`
    pub fn new(
        bundle: &Bundle,
        provider: &dyn EnvironmentProvider,
        build_dir: PathBuf,
        install_dir: PathBuf,
    ) -> Result<Self> {
        let environment = provider.environment(bundle.path(), bundle.toolchain(), bundle.arch())?;
        Ok(Self {
            bundle_path: bundle.path().to_path_buf(),
            toolchain: bundle.toolchain().to_string(),
            arch: bundle.arch().to_string(),
            os_name: system::os_name().to_string(),
            environment,
            build_dir,
            install_dir,
        })
    }

    /// Runner using the build environment
    pub fn runner(&self) -> Runner {
        Runner::new(self.environment.clone())
    }

    /// Delete and recreate the scratch install dir
    pub fn reset_install_dir(&self) -> Result<()> {
        debug!("Resetting {}", self.install_dir.display());
        filesystem::remove(&self.install_dir)?;
        fs::create_dir_all(&self.install_dir)?;
        Ok(())
    }
}
