// src/filesystem/stage.rs

//! Copy build output into a bundle
//!
//! Staging expands each include pattern, drops matches that hit an exclude
//! pattern, and copies the rest under a destination directory inside the
//! bundle. For patterns without `**` only the basename of each match is
//! kept. For patterns with `**` the directory structure below the `**`
//! position is preserved.

use super::glob::glob;
use super::ops;
use super::pattern::{self, ANY_DEPTH};
use crate::error::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Normalize a destination directory to a path relative to the bundle root
fn relative_dest(dest_dir: &str) -> PathBuf {
    pattern::split_path(dest_dir.trim_start_matches(['/', '\\']))
        .into_iter()
        .filter(|s| s != "/")
        .collect()
}

/// Stage files matching `patterns` into `bundle_root/dest_dir`
///
/// Returns the recorded bundle-relative paths. For `**` patterns only the
/// first path segment below the `**` position is recorded, so a whole
/// copied subtree is represented by its top entry.
pub fn copy_into_bundle<S, T>(
    bundle_root: &Path,
    patterns: &[S],
    dest_dir: &str,
    excludes: &[T],
) -> Result<BTreeSet<String>>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let dest_dir = relative_dest(dest_dir);
    let abs_dest = bundle_root.join(&dest_dir);
    let mut recorded = BTreeSet::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let pattern_segments = pattern::split_path(pattern);
        let any_depth_at = pattern_segments.iter().position(|s| s == ANY_DEPTH);

        for path in glob(pattern) {
            if pattern::match_any(&path, excludes) {
                debug!("Excluded {}", path.display());
                continue;
            }

            match any_depth_at {
                None => {
                    let Some(basename) = path.file_name() else {
                        continue;
                    };
                    ops::copy(&path, &abs_dest.join(basename), excludes)?;
                    recorded.insert(to_record(&dest_dir.join(basename)));
                }
                Some(k) => {
                    let path_segments = pattern::split_path(&path);
                    if k >= path_segments.len() {
                        continue;
                    }
                    let tail: PathBuf = path_segments[k..].iter().collect();
                    ops::copy(&path, &abs_dest.join(&tail), excludes)?;
                    recorded.insert(to_record(&dest_dir.join(&path_segments[k])));
                }
            }
        }
    }

    Ok(recorded)
}

/// Manifest form of a bundle-relative path, always `/`-separated
fn to_record(path: &Path) -> String {
    pattern::split_path(path).join("/")
}
