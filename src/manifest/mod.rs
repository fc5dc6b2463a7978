// src/manifest/mod.rs

//! Manifest store for a bundle
//!
//! Every bundle carries a SQLite database (`MANIFEST.db`) recording installed
//! packages, the files each package staged into the bundle (by category),
//! the direct dependencies of each package and the identity of the bundle
//! itself. Installing and uninstalling a package always updates those
//! records as a single transaction.

mod models;
pub mod schema;

pub use models::{DependencyEdge, FileRecord, InstalledPackage};

use crate::error::{Error, Result};
use crate::fileset::{Category, FileSet};
use crate::filesystem;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the manifest database inside a bundle
pub const MANIFEST_FILE: &str = "MANIFEST.db";

/// Identity of a bundle, written once at creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    pub platform: String,
    pub toolchain: String,
    pub arch: String,
}

/// Open handle on a bundle's manifest
pub struct Manifest {
    root: PathBuf,
    conn: Connection,
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest").field("root", &self.root).finish()
    }
}

impl Manifest {
    /// Create an empty manifest inside an existing bundle directory
    pub fn create(root: &Path, info: &BundleInfo) -> Result<Self> {
        let db_path = root.join(MANIFEST_FILE);
        if db_path.exists() {
            return Err(Error::Bundle(format!(
                "Manifest already exists: {}",
                db_path.display()
            )));
        }

        let conn = Connection::open(&db_path)?;
        schema::create(&conn, &info.platform, &info.toolchain, &info.arch)?;

        Ok(Self {
            root: root.to_path_buf(),
            conn,
        })
    }

    /// Open and verify the manifest of a bundle
    pub fn open(root: &Path) -> Result<Self> {
        let db_path = root.join(MANIFEST_FILE);
        if !db_path.is_file() {
            return Err(Error::Bundle(format!(
                "Not a valid bundle: missing manifest at {}",
                db_path.display()
            )));
        }

        let conn = Connection::open(&db_path)?;
        schema::verify(&conn)?;

        Ok(Self {
            root: root.to_path_buf(),
            conn,
        })
    }

    /// Bundle root the manifest describes
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the bundle identity row
    pub fn info(&self) -> Result<BundleInfo> {
        let info = self.conn.query_row(
            "SELECT platform, toolchain, arch FROM info LIMIT 1",
            [],
            |row| {
                Ok(BundleInfo {
                    platform: row.get(0)?,
                    toolchain: row.get(1)?,
                    arch: row.get(2)?,
                })
            },
        );
        match info {
            Ok(info) => Ok(info),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(Error::Bundle("Not a valid bundle: missing identity record".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(InstalledPackage::find_by_name(&self.conn, name)?.is_some())
    }

    /// Look up an installed package
    pub fn package(&self, name: &str) -> Result<Option<InstalledPackage>> {
        InstalledPackage::find_by_name(&self.conn, name)
    }

    /// Stage a package's files into the bundle and record it
    ///
    /// Without `force` an already installed package is left untouched and
    /// `false` is returned. With `force` the previous records are replaced.
    /// Staging happens inside the transaction, so a failed copy leaves the
    /// records as they were.
    pub fn install<S: AsRef<str>>(
        &self,
        name: &str,
        version: &str,
        deps: &[S],
        files: &FileSet,
        force: bool,
    ) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        if let Some(existing) = InstalledPackage::find_by_name(&tx, name)? {
            if !force {
                debug!("{} is already installed, skipping", name);
                return Ok(false);
            }
            if let Some(id) = existing.id {
                debug!("Replacing manifest records of {}", name);
                FileRecord::delete_by_package(&tx, id)?;
                InstalledPackage::delete(&tx, id)?;
            }
            DependencyEdge::delete_by_name(&tx, name)?;
        }

        let mut staged: Vec<(Category, String)> = Vec::new();
        for category in files.categories() {
            for rule in files.rules(category) {
                let copied = filesystem::copy_into_bundle(
                    &self.root,
                    &rule.include,
                    &rule.dest,
                    &rule.exclude,
                )?;
                staged.extend(copied.into_iter().map(|path| (category, path)));
            }
        }

        let mut package = InstalledPackage::new(name.to_string(), version.to_string());
        let package_id = package.insert(&tx)?;

        for (category, path) in staged {
            FileRecord::new(package_id, path, category.as_str().to_string()).insert(&tx)?;
        }
        for dep in deps {
            DependencyEdge::new(name.to_string(), dep.as_ref().to_string()).insert(&tx)?;
        }

        tx.commit()?;
        info!("Recorded {} {} in manifest", name, version);
        Ok(true)
    }

    /// Delete a package's files from the bundle and drop its records
    pub fn uninstall(&self, name: &str) -> Result<()> {
        let package = self.require(name)?;
        let id = package_id(&package)?;

        for record in FileRecord::find_by_package(&self.conn, id, None)? {
            let path = self.root.join(&record.name);
            debug!("Removing {}", path.display());
            filesystem::remove(&path)?;
        }

        let tx = self.conn.unchecked_transaction()?;
        FileRecord::delete_by_package(&tx, id)?;
        InstalledPackage::delete(&tx, id)?;
        DependencyEdge::delete_by_name(&tx, name)?;
        tx.commit()?;

        info!("Removed {} from manifest", name);
        Ok(())
    }

    /// All installed packages, in install order
    pub fn installed(&self) -> Result<Vec<InstalledPackage>> {
        InstalledPackage::list_all(&self.conn)
    }

    /// Direct dependencies recorded for an installed package
    pub fn deps(&self, name: &str) -> Result<Vec<String>> {
        self.require(name)?;
        Ok(DependencyEdge::find_by_name(&self.conn, name)?
            .into_iter()
            .map(|e| e.dependency)
            .collect())
    }

    /// Every recorded dependency edge
    pub fn dependency_edges(&self) -> Result<Vec<DependencyEdge>> {
        DependencyEdge::list_all(&self.conn)
    }

    /// Files recorded for an installed package, optionally of one category
    pub fn list_files(&self, name: &str, category: Option<Category>) -> Result<Vec<FileRecord>> {
        let package = self.require(name)?;
        let id = package_id(&package)?;
        FileRecord::find_by_package(&self.conn, id, category.map(|c| c.stored_names()))
    }

    fn require(&self, name: &str) -> Result<InstalledPackage> {
        InstalledPackage::find_by_name(&self.conn, name)?
            .ok_or_else(|| Error::Bundle(format!("{} is not installed", name)))
    }
}

fn package_id(package: &InstalledPackage) -> Result<i64> {
    package
        .id
        .ok_or_else(|| Error::Bundle(format!("{} has no manifest id", package.name)))
}
