// src/source/hg.rs

//! Mercurial sources

use super::{SourceFetcher, needs_restage, touch, url_basename};
use crate::error::Result;
use crate::filesystem;
use crate::system::{RunOptions, Runner};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Keeps a clone without a working copy in the cache and exports
/// revisions from it with `hg archive`
#[derive(Debug)]
pub struct HgFetcher {
    url: String,
    revision: Option<String>,
    repo: PathBuf,
    working: PathBuf,
    runner: Runner,
}

impl HgFetcher {
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
            repo: cache_dir.join(url_basename(url)?),
            working,
            runner,
        })
    }

    /// Modification time of the changelog, which grows with every pulled changeset
    fn changelog_mtime(&self) -> Option<SystemTime> {
        fs::metadata(self.repo.join(".hg/store/00changelog.i"))
            .and_then(|m| m.modified())
            .ok()
    }

    fn archive_args(&self) -> Vec<String> {
        vec![
            "archive".to_string(),
            "-S".to_string(),
            "-y".to_string(),
            "-r".to_string(),
            self.revision.clone().unwrap_or_else(|| "tip".to_string()),
            "-t".to_string(),
            "files".to_string(),
            self.working.display().to_string(),
        ]
    }
}

impl SourceFetcher for HgFetcher {
    fn fetch(&self) -> Result<()> {
        if !self.repo.join(".hg").is_dir() {
            info!("Cloning {}", self.url);
            if let Some(parent) = self.repo.parent() {
                fs::create_dir_all(parent)?;
            }
            let args = [
                "clone".to_string(),
                "--noupdate".to_string(),
                self.url.clone(),
                self.repo.display().to_string(),
            ];
            self.runner.run("hg", &args, &RunOptions::default())
        } else {
            info!("Pulling {}", self.repo.display());
            let before = self.changelog_mtime();
            self.runner.run("hg", &["pull"], &RunOptions::in_dir(&self.repo))?;
            if self.changelog_mtime() != before {
                debug!("{} has new changesets", self.url);
                touch(&self.repo)?;
            }
            Ok(())
        }
    }

    fn stage(&self) -> Result<PathBuf> {
        if !needs_restage(&self.working, &self.repo)? {
            debug!("Working copy {} is up to date", self.working.display());
            return Ok(self.working.clone());
        }

        filesystem::remove(&self.working)?;
        self.runner
            .run("hg", &self.archive_args(), &RunOptions::in_dir(&self.repo))?;
        touch(&self.working)?;
        Ok(self.working.clone())
    }

    fn working_dir(&self) -> &Path {
        &self.working
    }

    fn cache_path(&self) -> &Path {
        &self.repo
    }
}
