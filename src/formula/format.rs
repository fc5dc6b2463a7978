// src/formula/format.rs

//! TOML formula files
//!
//! ```toml
//! [formula]
//! version = "1.2.8"
//! depends_on = ["zlib", { name = "libpng", options = { variant = "debug" } }]
//! patches = ["fix-build"]
//!
//! [source]
//! type = "archive"
//! url = "https://zlib.net/zlib-%(version)s.tar.gz"
//!
//! [supported]
//! gcc = ["x86", "x64"]
//!
//! [build]
//! system = "cmake"
//! steps = ["cmake --build cmake_build --target install"]
//!
//! [[files.run]]
//! include = ["lib/*.so*"]
//! dest = "lib"
//! ```
//!
//! Strings in the build section and in file rules may use `%(var)s`
//! placeholders: `name`, `version`, `install_dir`, `bundle`, `source_dir`,
//! `toolchain`, `arch`, `os` and every option. Relative file patterns are
//! taken relative to the install dir.

use super::buildtools;
use super::{Dependency, Formula, Options, SourceSpec};
use crate::builder::BuildContext;
use crate::error::{Error, Result};
use crate::fileset::FileSet;
use crate::system::{RunOptions, Runner};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Option every formula accepts
pub const VARIANT_OPTION: &str = "variant";
const DEFAULT_VARIANT: &str = "release";

/// A complete formula file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormulaFile {
    #[serde(default)]
    pub formula: FormulaSection,

    #[serde(default)]
    pub source: Option<SourceSpec>,

    /// Toolchain to architectures
    #[serde(default)]
    pub supported: BTreeMap<String, Vec<String>>,

    /// Declared options and their defaults
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    #[serde(default)]
    pub build: Option<BuildSection>,

    /// Staging rules by category name
    #[serde(default)]
    pub files: BTreeMap<String, Vec<FileRule>>,
}

/// Formula metadata section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormulaSection {
    #[serde(default)]
    pub version: String,

    /// Kits only aggregate dependencies
    #[serde(default)]
    pub kit: bool,

    #[serde(default)]
    pub depends_on: Vec<DependencyDecl>,

    #[serde(default)]
    pub patches: Vec<String>,
}

/// A dependency, either a bare name or a name with options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyDecl {
    Name(String),
    WithOptions {
        name: String,
        #[serde(default)]
        options: BTreeMap<String, String>,
    },
}

impl From<&DependencyDecl> for Dependency {
    fn from(decl: &DependencyDecl) -> Self {
        match decl {
            DependencyDecl::Name(name) => Dependency::new(name.clone()),
            DependencyDecl::WithOptions { name, options } => Dependency {
                name: name.clone(),
                options: options.clone(),
            },
        }
    }
}

/// Build system helper run before the build steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    Cmake,
    Autotools,
}

/// Build instructions section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub system: Option<BuildSystem>,

    /// CMake cache variables
    #[serde(default)]
    pub cmake_options: BTreeMap<String, String>,

    /// CMake build directory, relative to the working directory
    #[serde(default)]
    pub cmake_build_dir: Option<String>,

    /// Extra arguments for `./configure`
    #[serde(default)]
    pub configure_options: Vec<String>,

    /// Directory inside the working copy to build in
    #[serde(default)]
    pub workdir: Option<String>,

    /// Extra environment variables for the build
    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    /// Shell command lines, run in order
    #[serde(default)]
    pub steps: Vec<String>,
}

/// One staging rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRule {
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Destination relative to the bundle root
    #[serde(default)]
    pub dest: String,
}

/// A formula backed by a TOML file
#[derive(Debug, Clone)]
pub struct TomlFormula {
    name: String,
    dir: Option<PathBuf>,
    file: FormulaFile,
    options: Options,
    source: Option<SourceSpec>,
    supported: BTreeMap<String, BTreeSet<String>>,
    depends_on: Vec<Dependency>,
}

impl TomlFormula {
    /// Load a formula file
    pub fn load(name: &str, path: &Path, options: &Options) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::FormulaLoad {
            name: name.to_string(),
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        let file: FormulaFile = toml::from_str(&content).map_err(|e| Error::FormulaLoad {
            name: name.to_string(),
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;

        let dir = path.parent().map(Path::to_path_buf);
        Ok(Self::from_file(name, dir, file, options))
    }

    /// Build a formula from an already parsed file
    pub fn from_file(
        name: &str,
        dir: Option<PathBuf>,
        file: FormulaFile,
        options: &Options,
    ) -> Self {
        let mut merged = Options::new();
        merged.insert(VARIANT_OPTION.to_string(), DEFAULT_VARIANT.to_string());
        merged.extend(file.options.clone());

        for (key, value) in options {
            if merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            } else {
                warn!("Formula {}: unknown option '{}'", name, key);
            }
        }

        let mut formula = Self {
            name: name.to_string(),
            dir,
            options: merged,
            source: None,
            supported: file
                .supported
                .iter()
                .map(|(tc, arches)| (tc.clone(), arches.iter().cloned().collect()))
                .collect(),
            depends_on: file.formula.depends_on.iter().map(Dependency::from).collect(),
            file,
        };

        // The source may refer to the version and options
        formula.source = formula.file.source.clone().map(|mut source| {
            source.url = formula.expand(&source.url, &[]);
            source.revision = source.revision.map(|r| formula.expand(&r, &[]));
            source
        });

        formula
    }

    /// Effective option values
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Replace `%(name)s`, `%(version)s`, options and the given extra variables
    fn expand(&self, template: &str, extra: &[(&str, String)]) -> String {
        let mut result = template.to_string();
        result = result.replace("%(name)s", &self.name);
        result = result.replace("%(version)s", &self.file.formula.version);
        for (key, value) in extra {
            result = result.replace(&format!("%({})s", key), value);
        }
        for (key, value) in &self.options {
            result = result.replace(&format!("%({})s", key), value);
        }
        result
    }

    fn build_variables(ctx: &BuildContext, source_dir: &Path) -> Vec<(&'static str, String)> {
        vec![
            ("install_dir", ctx.install_dir.display().to_string()),
            ("bundle", ctx.bundle_path.display().to_string()),
            ("source_dir", source_dir.display().to_string()),
            ("toolchain", ctx.toolchain.clone()),
            ("arch", ctx.arch.clone()),
            ("os", ctx.os_name.clone()),
        ]
    }

    /// Expand a file pattern and anchor it at the install dir
    fn resolve_pattern(
        &self,
        pattern: &str,
        ctx: &BuildContext,
        vars: &[(&str, String)],
    ) -> String {
        let expanded = self.expand(pattern, vars);
        let path = Path::new(&expanded);
        if path.is_absolute() {
            expanded
        } else {
            ctx.install_dir.join(path).display().to_string()
        }
    }

    fn file_set(&self, ctx: &BuildContext, vars: &[(&str, String)]) -> Result<FileSet> {
        let mut files = FileSet::new();
        for (category, rules) in &self.file.files {
            for rule in rules {
                let include: Vec<String> = rule
                    .include
                    .iter()
                    .map(|p| self.resolve_pattern(p, ctx, vars))
                    .collect();
                let exclude: Vec<String> = rule
                    .exclude
                    .iter()
                    .map(|p| self.resolve_pattern(p, ctx, vars))
                    .collect();
                let dest = self.expand(&rule.dest, vars);
                files
                    .add_named(category, include, &dest, exclude)
                    .map_err(|e| Error::formula(&self.name, e.to_string()))?;
            }
        }
        Ok(files)
    }
}

impl Formula for TomlFormula {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.file.formula.version
    }

    fn source(&self) -> Option<&SourceSpec> {
        self.source.as_ref()
    }

    fn supported(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.supported
    }

    fn depends_on(&self) -> &[Dependency] {
        &self.depends_on
    }

    fn patches(&self) -> &[String] {
        &self.file.formula.patches
    }

    fn is_kit(&self) -> bool {
        self.file.formula.kit
    }

    fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn build(&self, ctx: &BuildContext, source_dir: &Path) -> Result<FileSet> {
        let vars = Self::build_variables(ctx, source_dir);

        let Some(build) = &self.file.build else {
            debug!("{} has no build section", self.name);
            return self.file_set(ctx, &vars);
        };

        let workdir = match &build.workdir {
            Some(dir) => source_dir.join(self.expand(dir, &vars)),
            None => source_dir.to_path_buf(),
        };

        let mut env = ctx.environment.clone();
        for (key, value) in &build.environment {
            env.insert(key.clone(), self.expand(value, &vars));
        }
        let runner = Runner::new(env);

        match build.system {
            Some(BuildSystem::Cmake) => {
                let cmake_options: BTreeMap<String, String> = build
                    .cmake_options
                    .iter()
                    .map(|(k, v)| (k.clone(), self.expand(v, &vars)))
                    .collect();
                let build_dir = build
                    .cmake_build_dir
                    .as_ref()
                    .map(|d| PathBuf::from(self.expand(d, &vars)));
                buildtools::cmake(&runner, ctx, &workdir, &cmake_options, build_dir.as_deref())?;
            }
            Some(BuildSystem::Autotools) => {
                let configure_options: Vec<String> = build
                    .configure_options
                    .iter()
                    .map(|o| self.expand(o, &vars))
                    .collect();
                buildtools::configure(&runner, ctx, &workdir, &configure_options)?;
            }
            None => {}
        }

        for step in &build.steps {
            let command = self.expand(step, &vars);
            info!("{}: {}", self.name, command);
            runner.run_shell(&command, &RunOptions::in_dir(&workdir))?;
        }

        self.file_set(ctx, &vars)
    }
}
