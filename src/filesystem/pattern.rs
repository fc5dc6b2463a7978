// src/filesystem/pattern.rs

//! Hierarchical wildcard matching in the style of Apache Ant
//!
//! Matching is done per path segment. `*`, `?` and `[...]` classes only match
//! within a single segment, so `lib/*.a` matches `lib/file.a` but not
//! `lib/debug/file.a`. A segment that is exactly `**` matches zero or more
//! whole segments:
//!
//! - `lib/*/*` matches `lib/a/b` and `lib/sub1/b.c`
//! - `lib/**/*.a` matches `lib/file.a`, `lib/a/file.a` and `lib/a/b/file.a`
//! - `**/test/**` matches `test`, `a/test`, `test/a` and `a/b/c/test/d/e`
//! - `dir/file_???.txt` matches `dir/file_abc.txt` but not `dir/file_abcd.txt`

use glob::Pattern;
use std::path::{Component, Path};

/// The any-depth segment marker
pub const ANY_DEPTH: &str = "**";

/// Split a path into its segments
///
/// `.` segments are dropped, a leading root is kept as its own segment so
/// absolute patterns only match absolute paths.
pub fn split_path(path: impl AsRef<Path>) -> Vec<String> {
    path.as_ref()
        .components()
        .filter_map(|c| match c {
            Component::CurDir => None,
            Component::RootDir => Some("/".to_string()),
            Component::ParentDir => Some("..".to_string()),
            Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().into_owned()),
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
        })
        .collect()
}

/// True if the string contains wildcard characters
pub fn has_wildcards(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Match a single segment against a single pattern segment
fn segment_matches(segment: &str, pattern: &str) -> bool {
    if !has_wildcards(pattern) {
        return segment == pattern;
    }
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches(segment),
        // An unparseable class like `[abc` is taken literally
        Err(_) => segment == pattern,
    }
}

/// Check if `path` matches `pattern`
pub fn matches(path: impl AsRef<Path>, pattern: impl AsRef<Path>) -> bool {
    let path = split_path(path);
    let pattern = split_path(pattern);
    matches_split(&path, &pattern)
}

/// Match pre-split path segments against pre-split pattern segments
pub fn matches_split(path: &[String], pattern: &[String]) -> bool {
    let path_len = path.len();
    let pattern_len = pattern.len();

    let mut i = 0;
    let mut j = 0;

    while i < pattern_len && j < path_len {
        if pattern[i] == ANY_DEPTH {
            if i + 1 < pattern_len {
                i += 1;
            } else {
                // Trailing `**` takes whatever is left
                return true;
            }

            // Advance the path cursor until the next pattern segment matches,
            // picking a position that leaves a reconcilable number of segments
            while j < path_len {
                let equal_remaining = path_len - j == pattern_len - i;
                let more_any_depth = pattern[i..].iter().any(|s| s == ANY_DEPTH);
                if segment_matches(&path[j], &pattern[i]) && (equal_remaining || more_any_depth) {
                    break;
                }
                j += 1;
            }
        } else {
            if !segment_matches(&path[j], &pattern[i]) {
                return false;
            }
            i += 1;
            j += 1;

            // `x/**` where x was the last path segment: the `**` matches nothing
            if i + 1 == pattern_len && pattern[i] == ANY_DEPTH && j == path_len {
                i += 1;
            }
        }
    }

    i == pattern_len && j == path_len
}

/// Check if `path` matches any of `patterns`
pub fn match_any<P, S>(path: P, patterns: &[S]) -> bool
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    if patterns.is_empty() {
        return false;
    }
    let path = split_path(path);
    patterns
        .iter()
        .any(|p| matches_split(&path, &split_path(p.as_ref())))
}
