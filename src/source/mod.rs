// src/source/mod.rs

//! Source acquisition
//!
//! Each source kind has a [`SourceFetcher`] with two idempotent steps:
//! `fetch` brings upstream content into the shared source cache, `stage`
//! turns the cached copy into a clean working copy at
//! `<build dir>/<name>-<version>`.
//!
//! A working copy is re-staged only when it is missing, empty, or older
//! than its cache entry (see [`needs_restage`]). Fetchers bump the cache
//! entry's modification time whenever a fetch brings in new content.

mod archive;
mod git;
mod hg;
mod svn;

pub use archive::ArchiveFetcher;
pub use git::GitFetcher;
pub use hg::HgFetcher;
pub use svn::SvnFetcher;

use crate::error::{Error, Result};
use crate::filesystem;
use crate::formula::{SourceKind, SourceSpec};
use crate::system::Runner;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fetch and stage strategy for one source kind
pub trait SourceFetcher {
    /// Bring upstream content into the source cache
    fn fetch(&self) -> Result<()>;

    /// Materialize the working copy if needed and return its path
    fn stage(&self) -> Result<PathBuf>;

    /// Path of the working copy
    fn working_dir(&self) -> &Path;

    /// Cache entry the working copy is staged from
    fn cache_path(&self) -> &Path;

    /// True if the next `stage` will materialize the working copy again
    fn is_stale(&self) -> Result<bool> {
        needs_restage(self.working_dir(), self.cache_path())
    }

    /// Delete the working copy so the next `stage` starts over
    fn clean(&self) -> Result<()> {
        filesystem::remove(self.working_dir())
    }
}

/// Where a formula's source lives on disk
#[derive(Debug, Clone)]
pub struct SourceLayout {
    /// Shared source cache root
    pub cache_dir: PathBuf,
    /// Directory holding working copies
    pub build_dir: PathBuf,
}

impl SourceLayout {
    pub fn new(cache_dir: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            build_dir: build_dir.into(),
        }
    }

    /// `<build dir>/<name>-<version>`
    pub fn working_dir(&self, name: &str, version: &str) -> PathBuf {
        self.build_dir.join(format!("{}-{}", name, version))
    }
}

/// Create the fetcher for a formula's source
pub fn fetcher_for(
    name: &str,
    version: &str,
    source: &SourceSpec,
    layout: &SourceLayout,
    runner: &Runner,
) -> Result<Box<dyn SourceFetcher>> {
    let kind = source
        .source_kind()
        .ok_or_else(|| Error::formula(name, format!("unsupported source type '{}'", source.kind)))?;
    let working = layout.working_dir(name, version);
    let revision = source.revision.clone();

    let fetcher: Box<dyn SourceFetcher> = match kind {
        SourceKind::Archive => Box::new(ArchiveFetcher::new(
            &source.url,
            &layout.cache_dir,
            working,
            runner.clone(),
        )?),
        SourceKind::Git => Box::new(GitFetcher::new(
            &source.url,
            revision,
            &layout.cache_dir,
            working,
            runner.clone(),
        )?),
        SourceKind::Hg => Box::new(HgFetcher::new(
            &source.url,
            revision,
            &layout.cache_dir,
            working,
            runner.clone(),
        )?),
        SourceKind::Svn => Box::new(SvnFetcher::new(
            &source.url,
            revision,
            layout.cache_dir.join(format!("{}-{}", name, version)),
            working,
            runner.clone(),
        )),
    };
    Ok(fetcher)
}

/// True if the working copy must be staged again
///
/// That is the case when it does not exist, is an empty directory, or was
/// modified before the cache entry it comes from. A missing cache entry
/// never counts as newer.
pub fn needs_restage(working: &Path, cache: &Path) -> Result<bool> {
    let working_meta = match fs::metadata(working) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    if working_meta.is_dir() && fs::read_dir(working)?.next().is_none() {
        return Ok(true);
    }

    let cache_meta = match fs::metadata(cache) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let working_mtime = FileTime::from_last_modification_time(&working_meta);
    let cache_mtime = FileTime::from_last_modification_time(&cache_meta);
    Ok(working_mtime < cache_mtime)
}

/// Mark a freshly staged working copy as newer than its cache entry
pub(crate) fn touch(path: &Path) -> Result<()> {
    filetime::set_file_mtime(path, FileTime::now())?;
    Ok(())
}

/// Last path segment of a URL, ignoring query, fragment and trailing slashes
pub(crate) fn url_basename(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    if name.is_empty() || name.contains(':') {
        return Err(Error::InvalidUrl(format!("No file name in URL: {}", url)));
    }
    Ok(name.to_string())
}

/// Find `<name>.diff` for each patch in the first candidate dir holding it
pub fn resolve_patches<S: AsRef<str>>(
    patches: &[S],
    candidates: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    patches
        .iter()
        .map(|name| {
            let file_name = format!("{}.diff", name.as_ref());
            candidates
                .iter()
                .map(|dir| dir.join(&file_name))
                .find(|path| path.is_file())
                .ok_or_else(|| {
                    let searched: Vec<String> =
                        candidates.iter().map(|d| d.display().to_string()).collect();
                    Error::FileNotFound(format!(
                        "Patch {} (searched: {})",
                        file_name,
                        searched.join(", ")
                    ))
                })
        })
        .collect()
}

/// Resolve and apply patches, in order, to a working copy
///
/// A missing patch file is an error; a patch that fails to apply is only
/// logged.
pub fn patch_source<S: AsRef<str>>(
    patches: &[S],
    candidates: &[PathBuf],
    source_dir: &Path,
    runner: &Runner,
) -> Result<()> {
    if patches.is_empty() {
        return Ok(());
    }
    let resolved = resolve_patches(patches, candidates)?;
    debug!("Resolved {} patches for {}", resolved.len(), source_dir.display());
    runner.patch(&resolved, source_dir)
}
