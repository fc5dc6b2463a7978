// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use cellar::builder::{BuildContext, FormulaBuilder};
use cellar::env::HostEnvironment;
use cellar::formula::Registry;
use cellar::source::SourceLayout;
use cellar::system::os_name;
use cellar::Bundle;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch workspace with a bundle, a formula directory and a source cache.
///
/// Keep the value alive for the duration of the test; the directory is
/// deleted on drop.
pub struct TestEnv {
    pub dir: TempDir,
    pub bundle_path: PathBuf,
    pub formula_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub build_dir: PathBuf,
    pub install_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let env = Self {
            bundle_path: root.join("linux-gcc-x64"),
            formula_dir: root.join("formula"),
            cache_dir: root.join("workspace/src_cache"),
            build_dir: root.join("workspace/build_gcc_x64"),
            install_dir: root.join("workspace/tmp_install"),
            dir,
        };
        fs::create_dir_all(&env.formula_dir).unwrap();
        fs::create_dir_all(&env.cache_dir).unwrap();
        Bundle::create(&env.bundle_path, "linux", "gcc", "x64").unwrap();
        env
    }

    /// Write `<formula dir>/<name>.toml`
    pub fn write_formula(&self, name: &str, content: &str) {
        fs::write(self.formula_dir.join(format!("{}.toml", name)), content).unwrap();
    }

    /// Put a source tarball into the cache, as if it had been downloaded.
    ///
    /// Entries are `(path, contents)` pairs below the single top-level
    /// directory `top`.
    pub fn write_source_archive(
        &self,
        file_name: &str,
        top: &str,
        entries: &[(&str, &str)],
    ) -> PathBuf {
        let path = self.cache_dir.join(file_name);
        write_tarball(&path, top, entries);
        path
    }

    /// Formula with an archive source served from the cache
    ///
    /// Also writes the matching tarball, containing one `README` file.
    pub fn add_archive_formula(&self, name: &str, version: &str, deps: &[&str], extra: &str) {
        let deps: Vec<String> = deps.iter().map(|d| format!("\"{}\"", d)).collect();
        let content = format!(
            r#"
[formula]
version = "{version}"
depends_on = [{deps}]

[source]
type = "archive"
url = "https://downloads.example.invalid/{name}-{version}.tar.gz"

[supported]
gcc = ["x86", "x64"]
{extra}
"#,
            version = version,
            deps = deps.join(", "),
            name = name,
            extra = extra,
        );
        self.write_formula(name, &content);

        let top = format!("{}-{}", name, version);
        self.write_source_archive(&format!("{}.tar.gz", top), &top, &[("README", name)]);
    }

    /// Working copy directory of a formula
    pub fn working_dir(&self, name: &str, version: &str) -> PathBuf {
        self.build_dir.join(format!("{}-{}", name, version))
    }

    pub fn bundle(&self) -> Bundle {
        Bundle::load(&self.bundle_path).unwrap()
    }

    /// Builder for the test bundle using the host environment
    pub fn builder(&self) -> FormulaBuilder {
        let bundle = self.bundle();
        let registry = Registry::with_toml(vec![self.formula_dir.clone()], "gcc", "x64", os_name());
        let context = BuildContext::new(
            &bundle,
            &HostEnvironment::new(),
            self.build_dir.clone(),
            self.install_dir.clone(),
        )
        .unwrap();
        let layout = SourceLayout::new(&self.cache_dir, &self.build_dir);
        FormulaBuilder::new(bundle, registry, context, layout)
    }

    /// Names of the installed packages, in install order
    pub fn installed(&self) -> Vec<String> {
        self.bundle()
            .manifest()
            .installed()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect()
    }
}

/// Write a gzip tarball with every entry below `top`
pub fn write_tarball(path: &Path, top: &str, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut dir_header = tar::Header::new_gnu();
    dir_header.set_entry_type(tar::EntryType::Directory);
    dir_header.set_size(0);
    dir_header.set_mode(0o755);
    dir_header.set_cksum();
    builder
        .append_data(&mut dir_header, format!("{}/", top), std::io::empty())
        .unwrap();

    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/{}", top, name), contents.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
}
