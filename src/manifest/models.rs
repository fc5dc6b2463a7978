// src/manifest/models.rs

//! Records stored in a bundle manifest

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};

/// An installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
}

impl InstalledPackage {
    pub fn new(name: String, version: String) -> Self {
        Self {
            id: None,
            name,
            version,
        }
    }

    /// Insert this package into the manifest
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO installed (name, version) VALUES (?1, ?2)",
            params![&self.name, &self.version],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a package by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare("SELECT id, name, version FROM installed WHERE name = ?1")?;
        let package = stmt.query_row([name], Self::from_row).optional()?;
        Ok(package)
    }

    /// All installed packages, in install order
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT id, name, version FROM installed ORDER BY id")?;
        let packages = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    /// Delete a package row by id
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM installed WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
        })
    }
}

/// A file or directory staged into the bundle by a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub package_id: i64,
    /// Path relative to the bundle root
    pub name: String,
    /// Stored category name, possibly a legacy one
    pub category: String,
}

impl FileRecord {
    pub fn new(package_id: i64, name: String, category: String) -> Self {
        Self {
            package_id,
            name,
            category,
        }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO files (id, name, category) VALUES (?1, ?2, ?3)",
            params![self.package_id, &self.name, &self.category],
        )?;
        Ok(())
    }

    /// Files of a package, optionally restricted to a set of stored category names
    pub fn find_by_package(
        conn: &Connection,
        package_id: i64,
        categories: Option<&[&str]>,
    ) -> Result<Vec<Self>> {
        let records = match categories {
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, name, category FROM files WHERE id = ?1 ORDER BY rowid",
                )?;
                stmt.query_map([package_id], Self::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
            Some(names) => {
                let placeholders = vec!["?"; names.len()].join(", ");
                let sql = format!(
                    "SELECT id, name, category FROM files \
                     WHERE id = ? AND category IN ({}) ORDER BY rowid",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut args: Vec<&dyn ToSql> = vec![&package_id];
                args.extend(names.iter().map(|n| n as &dyn ToSql));
                stmt.query_map(args.as_slice(), Self::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(records)
    }

    pub fn delete_by_package(conn: &Connection, package_id: i64) -> Result<()> {
        conn.execute("DELETE FROM files WHERE id = ?1", [package_id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            package_id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
        })
    }
}

/// One direct dependency of an installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub name: String,
    pub dependency: String,
}

impl DependencyEdge {
    pub fn new(name: String, dependency: String) -> Self {
        Self { name, dependency }
    }

    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO dep_graph (name, deps) VALUES (?1, ?2)",
            params![&self.name, &self.dependency],
        )?;
        Ok(())
    }

    /// Direct dependencies of a package
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT name, deps FROM dep_graph WHERE name = ?1 ORDER BY rowid")?;
        let edges = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT name, deps FROM dep_graph ORDER BY rowid")?;
        let edges = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    pub fn delete_by_name(conn: &Connection, name: &str) -> Result<()> {
        conn.execute("DELETE FROM dep_graph WHERE name = ?1", [name])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            dependency: row.get(1)?,
        })
    }
}
