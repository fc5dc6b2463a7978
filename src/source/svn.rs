// src/source/svn.rs

//! Subversion sources

use super::{SourceFetcher, needs_restage, touch};
use crate::error::Result;
use crate::filesystem;
use crate::system::{RunOptions, Runner};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Keeps a checkout per formula version in the cache and exports it
///
/// A checkout pinned to a revision is never updated after the first fetch.
/// An unpinned one is updated on every fetch and its working copy exported
/// again.
#[derive(Debug)]
pub struct SvnFetcher {
    url: String,
    revision: Option<String>,
    checkout: PathBuf,
    working: PathBuf,
    runner: Runner,
}

impl SvnFetcher {
    pub fn new(
        url: &str,
        revision: Option<String>,
        checkout: PathBuf,
        working: PathBuf,
        runner: Runner,
    ) -> Self {
        Self {
            url: url.to_string(),
            revision,
            checkout,
            working,
            runner,
        }
    }

    fn checkout_args(&self) -> Vec<String> {
        let mut args = vec![
            "checkout".to_string(),
            self.url.clone(),
            self.checkout.display().to_string(),
        ];
        if let Some(rev) = &self.revision {
            args.push("-r".to_string());
            args.push(rev.clone());
        }
        args
    }
}

impl SourceFetcher for SvnFetcher {
    fn fetch(&self) -> Result<()> {
        if !self.checkout.join(".svn").is_dir() {
            info!("Checking out {}", self.url);
            if let Some(parent) = self.checkout.parent() {
                fs::create_dir_all(parent)?;
            }
            self.runner.run("svn", &self.checkout_args(), &RunOptions::default())
        } else if self.revision.is_none() {
            info!("Updating {}", self.checkout.display());
            self.runner.run("svn", &["up", "-q"], &RunOptions::in_dir(&self.checkout))?;
            // svn leaves the checkout root untouched, mark it as updated
            touch(&self.checkout)
        } else {
            Ok(())
        }
    }

    fn stage(&self) -> Result<PathBuf> {
        if !needs_restage(&self.working, &self.checkout)? {
            debug!("Working copy {} is up to date", self.working.display());
            return Ok(self.working.clone());
        }

        filesystem::remove(&self.working)?;
        let args = [
            "export".to_string(),
            "--force".to_string(),
            self.checkout.display().to_string(),
            self.working.display().to_string(),
        ];
        self.runner.run("svn", &args, &RunOptions::default())?;
        touch(&self.working)?;
        Ok(self.working.clone())
    }

    fn working_dir(&self) -> &Path {
        &self.working
    }

    fn cache_path(&self) -> &Path {
        &self.checkout
    }
}
