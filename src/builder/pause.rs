// src/builder/pause.rs

//! Interactive pause between patching and building

use crate::error::{Error, Result};
use crate::system::Runner;
use std::path::Path;
use tracing::warn;

/// Called once per formula after its source is patched
///
/// Returning an error aborts the install; [`Error::AbortOperation`] is the
/// user-requested abort.
pub trait Pause {
    fn pause(&mut self, formula: &str, source_dir: &Path, runner: &Runner) -> Result<()>;
}

/// Never pauses
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

impl Pause for NoPause {
    fn pause(&mut self, _formula: &str, _source_dir: &Path, _runner: &Runner) -> Result<()> {
        Ok(())
    }
}

/// Drops into an interactive shell in the working copy
///
/// Exiting the shell with a non-zero status aborts the install.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellPause;

impl Pause for ShellPause {
    fn pause(&mut self, formula: &str, source_dir: &Path, runner: &Runner) -> Result<()> {
        if runner.shell(source_dir)? {
            Ok(())
        } else {
            warn!("Shell for {} exited with an error", formula);
            Err(Error::AbortOperation)
        }
    }
}
