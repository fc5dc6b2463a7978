// src/formula/registry.rs

//! Formula discovery, validation and caching
//!
//! A [`Registry`] turns a formula specifier into a validated formula. A
//! specifier is one of:
//!
//! - a bare name (`zlib`), looked up on the search path
//! - a kit-qualified name (`qt.qtbase`), looked up in the `qt` kit directory
//!   and its OS-specific subdirectory first
//! - a path to a formula file or to a directory named after the formula
//!
//! Each name is loaded once per registry; later lookups return the cached
//! instance.

use super::format::TomlFormula;
use super::{Formula, Options, SourceKind};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Locates and loads formula implementations from disk
pub trait FormulaLoader {
    /// File implementing formula `name` in `dir`, if there is one
    fn locate(&self, dir: &Path, name: &str) -> Option<PathBuf>;

    /// Load the formula at `path` with the given options
    fn load(&self, name: &str, path: &Path, options: &Options) -> Result<Box<dyn Formula>>;
}

/// Loader for TOML formula files
///
/// Looks for `<dir>/<name>.toml`, then `<dir>/<name>/<name>.toml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlLoader;

impl FormulaLoader for TomlLoader {
    fn locate(&self, dir: &Path, name: &str) -> Option<PathBuf> {
        let file_name = format!("{}.toml", name);
        [dir.join(&file_name), dir.join(name).join(&file_name)]
            .into_iter()
            .find(|p| p.is_file())
    }

    fn load(&self, name: &str, path: &Path, options: &Options) -> Result<Box<dyn Formula>> {
        Ok(Box::new(TomlFormula::load(name, path, options)?))
    }
}

/// A parsed formula specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    /// Canonical formula name
    pub name: String,
    /// Formula file named directly by the specifier
    pub file: Option<PathBuf>,
    /// Directories to search before the caller's and default paths
    pub search_paths: Vec<PathBuf>,
}

/// Split a specifier into a canonical name and extra search locations
///
/// `kit_roots` are the directories kit subdirectories are looked up in and
/// `os` selects the OS-specific kit subdirectory.
pub fn parse_specifier(spec: &str, kit_roots: &[PathBuf], os: &str) -> Specifier {
    let path = Path::new(spec);

    if path.is_file() {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| spec.to_string());
        return Specifier {
            name,
            file: Some(path.to_path_buf()),
            search_paths: path.parent().map(Path::to_path_buf).into_iter().collect(),
        };
    }

    if path.is_dir() {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| spec.to_string());
        return Specifier {
            name,
            file: None,
            search_paths: vec![path.to_path_buf()],
        };
    }

    if let Some((kit, name)) = spec.split_once('.')
        && !kit.is_empty()
        && !name.is_empty()
    {
        let mut search_paths = Vec::new();
        for root in kit_roots {
            search_paths.push(root.join(kit));
            search_paths.push(root.join(kit).join(os));
        }
        return Specifier {
            name: name.to_string(),
            file: None,
            search_paths,
        };
    }

    Specifier {
        name: spec.to_string(),
        file: None,
        search_paths: Vec::new(),
    }
}

/// Resolves, validates and caches formulas for one bundle target
pub struct Registry {
    loader: Box<dyn FormulaLoader>,
    search_paths: Vec<PathBuf>,
    toolchain: String,
    arch: String,
    os: String,
    cache: HashMap<String, Arc<dyn Formula>>,
}

impl Registry {
    /// Registry searching `search_paths` (in order) for formulas that
    /// must support `toolchain` and `arch`
    pub fn new(
        loader: Box<dyn FormulaLoader>,
        search_paths: Vec<PathBuf>,
        toolchain: &str,
        arch: &str,
        os: &str,
    ) -> Self {
        Self {
            loader,
            search_paths,
            toolchain: toolchain.to_string(),
            arch: arch.to_string(),
            os: os.to_string(),
            cache: HashMap::new(),
        }
    }

    /// Registry with the TOML loader
    pub fn with_toml(search_paths: Vec<PathBuf>, toolchain: &str, arch: &str, os: &str) -> Self {
        Self::new(Box::new(TomlLoader), search_paths, toolchain, arch, os)
    }

    /// Add a formula provided in code
    ///
    /// It is validated like a loaded formula and replaces any cached
    /// formula of the same name.
    pub fn register(&mut self, formula: Arc<dyn Formula>) -> Result<()> {
        self.validate(formula.as_ref())?;
        self.cache.insert(formula.name().to_string(), formula);
        Ok(())
    }

    /// True if a formula with this name has already been resolved
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Resolve a specifier to a validated formula
    ///
    /// `extra_paths` are searched after the specifier's own locations and
    /// before the registry's search path.
    pub fn get(
        &mut self,
        spec: &str,
        options: &Options,
        extra_paths: &[PathBuf],
    ) -> Result<Arc<dyn Formula>> {
        let specifier = parse_specifier(spec, &self.search_paths, &self.os);

        if let Some(formula) = self.cache.get(&specifier.name) {
            return Ok(Arc::clone(formula));
        }

        let path = match specifier.file {
            Some(file) => file,
            None => self.find(&specifier.name, &specifier.search_paths, extra_paths)?,
        };

        debug!("Loading formula {} from {}", specifier.name, path.display());
        let formula: Arc<dyn Formula> = Arc::from(self.load(&specifier.name, &path, options)?);

        if formula.name() != specifier.name {
            return Err(Error::formula(
                &specifier.name,
                format!("implementation reports name '{}'", formula.name()),
            ));
        }

        self.validate(formula.as_ref())?;
        self.cache.insert(specifier.name, Arc::clone(&formula));
        Ok(formula)
    }

    fn find(&self, name: &str, first: &[PathBuf], extra: &[PathBuf]) -> Result<PathBuf> {
        let dirs: Vec<&PathBuf> = first
            .iter()
            .chain(extra.iter())
            .chain(self.search_paths.iter())
            .collect();

        for dir in &dirs {
            if let Some(path) = self.loader.locate(dir, name) {
                return Ok(path);
            }
        }

        Err(Error::FormulaNotFound {
            name: name.to_string(),
            searched: dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Run the loader, turning a panic inside it into a load error
    fn load(&self, name: &str, path: &Path, options: &Options) -> Result<Box<dyn Formula>> {
        let loaded =
            panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(name, path, options)));
        match loaded {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "formula loader panicked".to_string());
                Err(Error::FormulaLoad {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                    source: message.into(),
                })
            }
        }
    }

    /// Check the fields every buildable formula must have
    fn validate(&self, formula: &dyn Formula) -> Result<()> {
        if formula.is_kit() {
            return Ok(());
        }

        let name = formula.name();
        if formula.version().trim().is_empty() {
            return Err(Error::formula(name, "missing version"));
        }

        let source = formula
            .source()
            .ok_or_else(|| Error::formula(name, "missing source"))?;
        if source.kind.parse::<SourceKind>().is_err() {
            return Err(Error::formula(
                name,
                format!("unsupported source type '{}'", source.kind),
            ));
        }
        if source.url.trim().is_empty() {
            return Err(Error::formula(name, "missing source url"));
        }

        let supported = formula
            .supported()
            .get(&self.toolchain)
            .is_some_and(|arches| arches.contains(&self.arch));
        if !supported {
            return Err(Error::formula(
                name,
                format!("{} {} is not supported", self.toolchain, self.arch),
            ));
        }

        Ok(())
    }
}
