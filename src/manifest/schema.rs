// src/manifest/schema.rs

//! Manifest table layout
//!
//! The layout is fixed: bundles written by older releases use the same four
//! tables, so there is no migration step. Opening a manifest only checks that
//! every expected column can be selected.

use crate::error::{Error, Result};
use rusqlite::{Connection, params};
use tracing::debug;

/// Expected tables and their columns
pub const TABLES: &[(&str, &[&str])] = &[
    ("installed", &["id", "name", "version"]),
    ("files", &["id", "name", "category"]),
    ("dep_graph", &["name", "deps"]),
    ("info", &["platform", "toolchain", "arch"]),
];

/// Create the manifest tables and write the bundle identity row
pub fn create(conn: &Connection, platform: &str, toolchain: &str, arch: &str) -> Result<()> {
    debug!("Creating manifest tables");

    conn.execute_batch(
        "
        CREATE TABLE installed (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE,
            version TEXT
        );

        CREATE TABLE files (
            id INT,
            name TEXT,
            category TEXT
        );

        CREATE TABLE dep_graph (
            name TEXT,
            deps TEXT
        );

        CREATE TABLE info (
            platform TEXT,
            toolchain TEXT,
            arch TEXT
        );
        ",
    )?;

    conn.execute(
        "INSERT INTO info (platform, toolchain, arch) VALUES (?1, ?2, ?3)",
        params![platform, toolchain, arch],
    )?;

    Ok(())
}

/// Check that every expected table and column is queryable
pub fn verify(conn: &Connection) -> Result<()> {
    for (table, columns) in TABLES {
        for column in *columns {
            let sql = format!("SELECT {} FROM {}", column, table);
            if conn.prepare(&sql).is_err() {
                return Err(Error::Bundle(format!(
                    "Not a valid bundle: manifest is missing column '{}.{}'",
                    table, column
                )));
            }
        }
    }
    Ok(())
}
