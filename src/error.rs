// src/error.rs
//! Error types for Cellar

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, building or recording packages
#[derive(Error, Debug)]
pub enum Error {
    /// A formula is malformed (missing or invalid field)
    #[error("Formula '{name}' is invalid: {reason}")]
    Formula { name: String, reason: String },

    /// A formula implementation failed while being loaded
    #[error("Failed to load formula '{name}' from {}", path.display())]
    FormulaLoad {
        name: String,
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No formula with this name exists on the search path
    #[error("Formula '{name}' not found (searched: {searched})")]
    FormulaNotFound { name: String, searched: String },

    /// A patch or other required file could not be found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// No usable external tool found on the search path
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// An external tool exited unsuccessfully
    #[error("Command '{command}' failed with exit code {}", exit_code(code))]
    ProcessExecution { command: String, code: Option<i32> },

    /// A source archive did not contain exactly one top-level directory
    #[error("Invalid source archive: {0}")]
    SourceArchive(String),

    /// An archive URL is unreachable or does not point to an archive
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Download failed after the URL was validated
    #[error("Download failed: {0}")]
    Download(String),

    /// Manifest missing or malformed, or operation on an unusable bundle
    #[error("Bundle error: {0}")]
    Bundle(String),

    /// Toolchain environment could not be derived
    #[error("Build configuration error: {0}")]
    BuildConfig(String),

    /// Dependency cycle detected while traversing the graph
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// User requested an abort during an interactive pause
    #[error("Operation aborted")]
    AbortOperation,

    /// Failed to parse a configuration or formula file
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    /// Shorthand for a formula validation error
    pub fn formula(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Formula {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for the user-requested abort raised by an interactive pause
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::AbortOperation)
    }
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none (killed by signal)".to_string(), |c| c.to_string())
}
