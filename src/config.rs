// src/config.rs

//! Persisted user configuration
//!
//! Stored as TOML at `$CELLAR_HOME/config.toml` (`~/cellar/config.toml` by
//! default):
//!
//! ```toml
//! root = "/home/dev/cellar"
//! workspace = "/home/dev/cellar/workspace"
//! formula_paths = ["/home/dev/formulas"]
//! current_bundle = "/home/dev/cellar/linux-gcc-x64"
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the configuration directory
pub const HOME_ENV: &str = "CELLAR_HOME";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Data root, defaults to the configuration directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Scratch area for source caches and builds, defaults to `<root>/workspace`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    /// Extra formula directories, searched before `<root>/formula`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub formula_paths: Vec<PathBuf>,

    /// Bundle commands operate on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_bundle: Option<PathBuf>,

    #[serde(skip)]
    home: PathBuf,
}

impl Config {
    /// Directory holding `config.toml`
    pub fn home_dir() -> Result<PathBuf> {
        if let Some(home) = std::env::var_os(HOME_ENV) {
            return Ok(PathBuf::from(home));
        }
        dirs::home_dir()
            .map(|home| home.join("cellar"))
            .ok_or_else(|| Error::BuildConfig("Could not determine the home directory".to_string()))
    }

    /// Load the configuration from the default location
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::home_dir()?)
    }

    /// Load the configuration stored under `home`
    ///
    /// A missing file yields the defaults.
    pub fn load(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            debug!("Loading configuration from {}", path.display());
            let content = fs::read_to_string(&path)?;
            toml::from_str::<Config>(&content)
                .map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))?
        } else {
            Config::default()
        };
        config.home = home.to_path_buf();
        Ok(config)
    }

    /// Write the configuration back to `config.toml`
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Parse(format!("Failed to serialize configuration: {}", e)))?;
        fs::write(self.home.join(CONFIG_FILE), content)?;
        Ok(())
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| self.home.clone())
    }

    pub fn workspace(&self) -> PathBuf {
        self.workspace
            .clone()
            .unwrap_or_else(|| self.root().join("workspace"))
    }

    /// Default formula directory
    pub fn formula_dir(&self) -> PathBuf {
        self.root().join("formula")
    }

    /// Formula search path: configured directories, then the default one
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.formula_paths.clone();
        let default = self.formula_dir();
        if !paths.contains(&default) {
            paths.push(default);
        }
        paths
    }

    /// Shared download and repository cache
    pub fn source_cache(&self) -> PathBuf {
        self.workspace().join("src_cache")
    }

    /// Working copies for one toolchain and architecture
    pub fn build_dir(&self, toolchain: &str, arch: &str) -> PathBuf {
        self.workspace().join(format!("build_{}_{}", toolchain, arch))
    }

    /// Scratch install prefix, wiped before each formula build
    pub fn tmp_install_dir(&self) -> PathBuf {
        self.workspace().join("tmp_install")
    }

    /// The current bundle, or an error telling the user to pick one
    pub fn require_bundle(&self) -> Result<PathBuf> {
        self.current_bundle.clone().ok_or_else(|| {
            Error::Bundle("No bundle selected, run `cellar new` or `cellar use` first".to_string())
        })
    }
}
