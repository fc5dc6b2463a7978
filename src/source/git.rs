// src/source/git.rs

//! Git sources: a bare mirror in the cache, exported per formula
//!
//! Staging runs `git archive` against the mirror, so the mirror's `HEAD`
//! and index stay as cloned. An unpinned formula therefore always gets the
//! tip of the upstream default branch.

use super::{SourceFetcher, needs_restage, touch, url_basename};
use crate::error::{Error, Result};
use crate::filesystem;
use crate::system::{RunOptions, Runner};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct GitFetcher {
    url: String,
    revision: Option<String>,
    git_dir: PathBuf,
    working: PathBuf,
    runner: Runner,
}

impl GitFetcher {
    /// The bare repository lives at `<cache_dir>/<url basename>`
    pub fn new(
        url: &str,
        revision: Option<String>,
        cache_dir: &Path,
        working: PathBuf,
        runner: Runner,
    ) -> Result<Self> {
        Ok(Self {
            url: url.to_string(),
            revision,
            git_dir: cache_dir.join(url_basename(url)?),
            working,
            runner,
        })
    }

    fn git_dir_arg(&self) -> String {
        format!("--git-dir={}", self.git_dir.display())
    }

    /// Arguments exporting the requested revision as a tarball at `output`
    fn archive_args(&self, output: &Path) -> Vec<String> {
        vec![
            self.git_dir_arg(),
            "archive".to_string(),
            "--format=tar".to_string(),
            format!("--output={}", output.display()),
            self.revision.clone().unwrap_or_else(|| "HEAD".to_string()),
        ]
    }

    /// Contents of every ref file in the mirror, loose and packed
    fn refs_snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let packed = self.git_dir.join("packed-refs");
        WalkDir::new(self.git_dir.join("refs"))
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .chain(std::iter::once(packed))
            .filter_map(|path| fs::read(&path).ok().map(|contents| (path, contents)))
            .collect()
    }

    fn fetch_args(&self) -> Vec<String> {
        vec![
            self.git_dir_arg(),
            "fetch".to_string(),
            "--tags".to_string(),
            "origin".to_string(),
            "+refs/heads/*:refs/heads/*".to_string(),
        ]
    }
}

impl SourceFetcher for GitFetcher {
    /// Clone a bare mirror, or update all branches and tags of an existing one
    ///
    /// The mirror is touched when an update moved any branch or tag.
    fn fetch(&self) -> Result<()> {
        if !self.git_dir.join("HEAD").is_file() {
            info!("Cloning {}", self.url);
            if let Some(parent) = self.git_dir.parent() {
                fs::create_dir_all(parent)?;
            }
            let args = [
                "clone".to_string(),
                "--bare".to_string(),
                self.url.clone(),
                self.git_dir.display().to_string(),
            ];
            return self.runner.run("git", &args, &RunOptions::default());
        }

        info!("Updating {}", self.git_dir.display());
        let before = self.refs_snapshot();
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&self.git_dir)?);
        self.runner.run("git", &self.fetch_args(), &RunOptions::default())?;

        if self.refs_snapshot() != before {
            debug!("{} has new commits", self.url);
            touch(&self.git_dir)?;
        } else {
            // Writing FETCH_HEAD alone must not make working copies stale
            filetime::set_file_mtime(&self.git_dir, mtime)?;
        }
        Ok(())
    }

    fn stage(&self) -> Result<PathBuf> {
        if !needs_restage(&self.working, &self.git_dir)? {
            debug!("Working copy {} is up to date", self.working.display());
            return Ok(self.working.clone());
        }

        let build_dir = self
            .working
            .parent()
            .ok_or_else(|| {
                Error::SourceArchive(format!("No parent for {}", self.working.display()))
            })?;
        fs::create_dir_all(build_dir)?;
        filesystem::remove(&self.working)?;

        let export = tempfile::Builder::new()
            .prefix(".git-export-")
            .suffix(".tar")
            .tempfile_in(build_dir)?;
        self.runner
            .run("git", &self.archive_args(export.path()), &RunOptions::default())?;
        self.runner.extract(export.path(), &self.working)?;

        touch(&self.working)?;
        Ok(self.working.clone())
    }

    fn working_dir(&self) -> &Path {
        &self.working
    }

    fn cache_path(&self) -> &Path {
        &self.git_dir
    }
}
