// src/filesystem/ops.rs

//! Copy and remove helpers used when staging into a bundle

use super::pattern;
use crate::error::Result;
use std::fs;
use std::io;
use std::path::Path;

/// Copy a file, symlink or directory tree to `dest`
///
/// Parent directories of `dest` are created. An existing directory at `dest`
/// is replaced when copying a directory, files are always overwritten.
/// Symlinks are recreated rather than followed. Entries inside a copied
/// directory whose full source path matches one of `excludes` are skipped.
pub fn copy<S: AsRef<str>>(src: &Path, dest: &Path, excludes: &[S]) -> Result<()> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let meta = fs::symlink_metadata(src)?;
    if meta.file_type().is_symlink() {
        copy_symlink(src, dest)?;
    } else if meta.is_dir() {
        if dest.symlink_metadata().is_ok() {
            remove(dest)?;
        }
        copy_tree(src, dest, excludes)?;
    } else {
        if dest.is_dir() {
            remove(dest)?;
        }
        fs::copy(src, dest)?;
    }
    Ok(())
}

fn copy_tree<S: AsRef<str>>(src: &Path, dest: &Path, excludes: &[S]) -> Result<()> {
    fs::create_dir_all(dest)?;

    let mut entries = fs::read_dir(src)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if pattern::match_any(&path, excludes) {
            continue;
        }

        let target = dest.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            copy_symlink(&path, &target)?;
        } else if file_type.is_dir() {
            copy_tree(&path, &target, excludes)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    let link_target = fs::read_link(src)?;
    if dest.symlink_metadata().is_ok() {
        remove(dest)?;
    }
    std::os::unix::fs::symlink(link_target, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    // Without portable symlink creation the link is materialized
    if dest.symlink_metadata().is_ok() {
        remove(dest)?;
    }
    if src.is_dir() {
        copy_tree::<&str>(src, dest, &[])
    } else {
        fs::copy(src, dest)?;
        Ok(())
    }
}

/// Remove a file, symlink or directory tree
///
/// Missing paths are not an error. Read-only entries are made writable
/// before a retry.
pub fn remove(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            make_writable(path)?;
            if meta.is_dir() {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.path_is_symlink() {
            continue;
        }
        let mut perms = entry.metadata().map_err(io::Error::other)?.permissions();
        if perms.readonly() {
            perms.set_readonly(false);
            fs::set_permissions(entry.path(), perms)?;
        }
    }
    Ok(())
}
