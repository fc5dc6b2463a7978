// src/fileset.rs

//! File sets: what a formula build produced and where it goes in the bundle
//!
//! A [`FileSet`] groups staging rules by [`Category`]. Each rule is a list of
//! include patterns, a list of exclude patterns and a destination relative to
//! the bundle root.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Classification of staged files
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    /// Headers, import libraries and tools needed to build against the package
    Build,
    /// Debug variant of `Build`
    BuildDbg,
    /// Runtime files (shared libraries, executables)
    Run,
    /// Debug variant of `Run`
    RunDbg,
}

impl Category {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Parse a stored category name, accepting the legacy `rel`/`dbg`/`dev` names
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rel" => Some(Category::Run),
            "dbg" => Some(Category::RunDbg),
            "dev" => Some(Category::Build),
            other => Category::from_str(other).ok(),
        }
    }

    /// Every name this category may be stored under in a manifest
    pub fn stored_names(&self) -> &'static [&'static str] {
        match self {
            Category::Build => &["build", "dev"],
            Category::BuildDbg => &["build_dbg"],
            Category::Run => &["run", "rel"],
            Category::RunDbg => &["run_dbg", "dbg"],
        }
    }

    pub fn all() -> impl Iterator<Item = Category> {
        Category::iter()
    }
}

/// One staging rule: copy whatever `include` matches (minus `exclude`) to `dest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingRule {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Destination directory, relative to the bundle root
    pub dest: String,
}

/// Build output of a formula, grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    rules: BTreeMap<Category, Vec<StagingRule>>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to a category
    pub fn add<I, E, S, T>(&mut self, category: Category, include: I, dest: &str, exclude: E)
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        self.rules.entry(category).or_default().push(StagingRule {
            include: include.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
            dest: dest.to_string(),
        });
    }

    /// Add a rule to a category given by name
    pub fn add_named<I, E, S, T>(
        &mut self,
        category: &str,
        include: I,
        dest: &str,
        exclude: E,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let category = Category::parse(category)
            .ok_or_else(|| Error::Parse(format!("Unknown file category '{}'", category)))?;
        self.add(category, include, dest, exclude);
        Ok(())
    }

    /// Rules of one category, in insertion order
    pub fn rules(&self, category: Category) -> &[StagingRule] {
        self.rules.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Categories that have at least one rule
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.rules.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(Vec::is_empty)
    }
}
