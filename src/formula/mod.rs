// src/formula/mod.rs

//! Formulas: build recipes for the libraries a bundle holds
//!
//! A formula names a library, its version, where its source comes from, the
//! toolchains and architectures it supports, what it depends on and how to
//! build it. Recipes come either from TOML files found on the formula
//! search path ([`TomlFormula`]) or from code registered directly with a
//! [`Registry`].
//!
//! A kit is a formula that only aggregates dependencies and never builds
//! anything itself.

pub mod buildtools;
mod format;
mod registry;

pub use format::{FormulaFile, TomlFormula};
pub use registry::{FormulaLoader, Registry, Specifier, TomlLoader, parse_specifier};

use crate::builder::BuildContext;
use crate::error::Result;
use crate::fileset::FileSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Options passed to a formula, by name
pub type Options = BTreeMap<String, String>;

/// Supported source kinds
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Tarball or zip file downloaded over HTTP
    Archive,
    Git,
    /// Mercurial
    Hg,
    /// Subversion
    Svn,
}

/// Where a formula's source comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Source kind as declared, checked against [`SourceKind`] on validation
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    /// Revision, tag or branch to check out; latest when unset
    #[serde(default)]
    pub revision: Option<String>,
}

impl SourceSpec {
    pub fn new(kind: SourceKind, url: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            url: url.into(),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Parsed source kind, `None` for an unsupported kind
    pub fn source_kind(&self) -> Option<SourceKind> {
        self.kind.parse().ok()
    }
}

/// A dependency and the options to build it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub options: Options,
}

impl Dependency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Options::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A build recipe
pub trait Formula {
    /// Canonical name, unique within a registry
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Source location, `None` for kits
    fn source(&self) -> Option<&SourceSpec>;

    /// Toolchain to supported architectures
    fn supported(&self) -> &BTreeMap<String, BTreeSet<String>>;

    /// Direct dependencies, in declaration order
    fn depends_on(&self) -> &[Dependency];

    /// Patch names, applied in order
    fn patches(&self) -> &[String] {
        &[]
    }

    fn is_kit(&self) -> bool {
        false
    }

    /// Directory the recipe was loaded from
    ///
    /// Used to locate patches and as an extra search path for dependencies.
    fn dir(&self) -> Option<&Path> {
        None
    }

    /// Build from the working copy at `source_dir` and describe the output
    ///
    /// Anything the build installs should go to `ctx.install_dir`.
    fn build(&self, ctx: &BuildContext, source_dir: &Path) -> Result<FileSet>;

    /// Names of the direct dependencies
    fn dependency_names(&self) -> Vec<String> {
        self.depends_on().iter().map(|d| d.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_names() {
        assert_eq!(SourceKind::Hg.to_string(), "hg");
        assert_eq!("svn".parse::<SourceKind>().unwrap(), SourceKind::Svn);
        assert!("cvs".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_source_spec() {
        let spec = SourceSpec::new(SourceKind::Git, "https://github.com/madler/zlib.git")
            .with_revision("v1.2.8");
        assert_eq!(spec.kind, "git");
        assert_eq!(spec.source_kind(), Some(SourceKind::Git));
        assert_eq!(spec.revision.as_deref(), Some("v1.2.8"));

        let bogus = SourceSpec {
            kind: "ftp".to_string(),
            url: "ftp://example.org".to_string(),
            revision: None,
        };
        assert_eq!(bogus.source_kind(), None);
    }

    #[test]
    fn test_dependency_options() {
        let dep = Dependency::new("libpng").with_option("variant", "debug");
        assert_eq!(dep.options.get("variant").map(String::as_str), Some("debug"));
    }
}
