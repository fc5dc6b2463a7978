// src/bundle.rs

//! Bundles: a toolchain/architecture specific install root plus its manifest

use crate::error::{Error, Result};
use crate::filesystem;
use crate::manifest::{BundleInfo, Manifest};
use crate::system::{RunOptions, Runner};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// An open bundle
#[derive(Debug)]
pub struct Bundle {
    path: PathBuf,
    info: BundleInfo,
    manifest: Manifest,
}

impl Bundle {
    /// Create a new bundle directory with an empty manifest
    ///
    /// Fails if anything already exists at `path`. Nothing is left behind
    /// when the manifest cannot be created.
    pub fn create(path: &Path, platform: &str, toolchain: &str, arch: &str) -> Result<Self> {
        let info = BundleInfo {
            platform: platform.to_string(),
            toolchain: toolchain.to_string(),
            arch: arch.to_string(),
        };
        Self::create_with(path, info, Manifest::create)
    }

    fn create_with<F>(path: &Path, info: BundleInfo, init: F) -> Result<Self>
    where
        F: FnOnce(&Path, &BundleInfo) -> Result<Manifest>,
    {
        if path.symlink_metadata().is_ok() {
            return Err(Error::Bundle(format!(
                "Directory already exists: {}",
                path.display()
            )));
        }

        fs::create_dir_all(path)?;
        let manifest = match init(path, &info) {
            Ok(manifest) => manifest,
            Err(e) => {
                filesystem::remove(path)?;
                return Err(e);
            }
        };

        info!(
            "Created bundle {} ({} {} {})",
            path.display(),
            info.platform,
            info.toolchain,
            info.arch
        );
        Ok(Self {
            path: path.to_path_buf(),
            info,
            manifest,
        })
    }

    /// Open an existing bundle, verifying its manifest
    pub fn load(path: &Path) -> Result<Self> {
        let manifest = Manifest::open(path)?;
        let info = manifest.info()?;
        Ok(Self {
            path: path.to_path_buf(),
            info,
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn platform(&self) -> &str {
        &self.info.platform
    }

    pub fn toolchain(&self) -> &str {
        &self.info.toolchain
    }

    pub fn arch(&self) -> &str {
        &self.info.arch
    }

    pub fn info(&self) -> &BundleInfo {
        &self.info
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Directory name of the bundle
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string())
    }

    /// Pack the bundle into `dest_dir`
    ///
    /// Uses `7z` when available (`<name>.7z`), `zip` otherwise
    /// (`<name>.zip`). Non-zero exits are tolerated since both tools report
    /// "nothing to update" that way, but the archive must exist afterwards.
    /// A relative `dest_dir` is taken from the current directory.
    pub fn archive(&self, runner: &Runner, dest_dir: &Path) -> Result<PathBuf> {
        let dest_dir = std::path::absolute(dest_dir)?;
        fs::create_dir_all(&dest_dir)?;

        let bundle_path = std::path::absolute(&self.path)?;
        let parent = bundle_path.parent().unwrap_or_else(|| Path::new("/"));
        let name = self.name();
        let options = RunOptions {
            cwd: Some(parent.to_path_buf()),
            ignore_errors: true,
            silent: false,
        };

        let archive = if runner.has_command("7z") {
            let archive = dest_dir.join(format!("{}.7z", name));
            let args = ["a".to_string(), archive.display().to_string(), name];
            runner.run("7z", &args, &options)?;
            archive
        } else if runner.has_command("zip") {
            let archive = dest_dir.join(format!("{}.zip", name));
            let args = ["-r".to_string(), archive.display().to_string(), name];
            runner.run("zip", &args, &options)?;
            archive
        } else {
            return Err(Error::CommandNotFound(
                "Could not find a program for archiving the bundle (7z, zip)".to_string(),
            ));
        };

        if !archive.is_file() {
            return Err(Error::Bundle(format!(
                "Archiving {} did not produce {}",
                self.path.display(),
                archive.display()
            )));
        }

        info!("Archived bundle to {}", archive.display());
        Ok(archive)
    }
}

/// Expand `{platform}`, `{toolchain}` and `{arch}` in a bundle path
pub fn expand_path_template(template: &str, platform: &str, toolchain: &str, arch: &str) -> String {
    template
        .replace("{platform}", platform)
        .replace("{toolchain}", toolchain)
        .replace("{arch}", arch)
}
