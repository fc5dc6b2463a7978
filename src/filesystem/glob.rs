// src/filesystem/glob.rs

//! Filesystem expansion of hierarchical wildcard patterns
//!
//! [`glob`] lists every path under the fixed prefix of a pattern that
//! [`matches`](super::pattern::matches) it. The walk is bounded by the number
//! of wildcard segments unless the pattern contains `**`.

use super::pattern::{self, ANY_DEPTH};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Lazy iterator over the paths matching a pattern
pub struct Glob {
    state: State,
}

enum State {
    /// The pattern named an existing path
    Literal(Option<PathBuf>),
    Walk {
        entries: walkdir::IntoIter,
        pattern: Vec<String>,
        /// Strip a synthetic `./` prefix from results
        relative: bool,
    },
}

/// Expand `pattern` against the filesystem
///
/// An existing path is returned as-is without being walked. Otherwise the
/// leading segments without wildcards form the walk base (`.` when there are
/// none), and each entry below it is matched against the full pattern.
pub fn glob(pattern: impl AsRef<Path>) -> Glob {
    let pattern = pattern.as_ref();

    if pattern.symlink_metadata().is_ok() {
        return Glob {
            state: State::Literal(Some(pattern.to_path_buf())),
        };
    }

    let mut base = pattern.to_path_buf();
    let mut depth = 0usize;
    while has_wildcards(&base) {
        if !base.pop() {
            break;
        }
        depth += 1;
    }

    let relative = base.as_os_str().is_empty();
    if relative {
        base = PathBuf::from(".");
    }

    let pattern_segments = pattern::split_path(pattern);
    let mut walk = WalkDir::new(&base)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    if !pattern_segments.iter().any(|s| s == ANY_DEPTH) {
        walk = walk.max_depth(depth);
    }

    debug!("Globbing {} from {} (depth {})", pattern.display(), base.display(), depth);

    Glob {
        state: State::Walk {
            entries: walk.into_iter(),
            pattern: pattern_segments,
            relative,
        },
    }
}

fn has_wildcards(path: &Path) -> bool {
    pattern::has_wildcards(&path.to_string_lossy())
}

impl Iterator for Glob {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        match &mut self.state {
            State::Literal(path) => path.take(),
            State::Walk {
                entries,
                pattern,
                relative,
            } => {
                for entry in entries.by_ref() {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            debug!("Skipping unreadable entry while globbing: {}", e);
                            continue;
                        }
                    };

                    let path = entry.path();
                    let segments = pattern::split_path(path);
                    if !pattern::matches_split(&segments, pattern) {
                        continue;
                    }

                    let found = if *relative {
                        path.strip_prefix(".").unwrap_or(path).to_path_buf()
                    } else {
                        path.to_path_buf()
                    };
                    return Some(found);
                }
                None
            }
        }
    }
}
