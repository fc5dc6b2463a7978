// tests/manifest.rs

//! Bundle manifest tests: staging by category, reinstall and removal.

#![cfg(unix)]

mod common;

use cellar::{Bundle, Category, Error, FileSet};
use common::TestEnv;
use std::fs;
use std::path::Path;

/// Fake build output below `root`
fn populate_install_dir(root: &Path) {
    for (path, contents) in [
        ("lib/libfoo.so", "so"),
        ("lib/libfoo.a", "a"),
        ("lib/debug/libfoo.so", "dbg"),
        ("include/foo/foo.h", "h"),
        ("include/foo/detail/impl.h", "h"),
        ("include/foo/private/secret.h", "h"),
        ("share/doc/README", "doc"),
    ] {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

fn pattern(root: &Path, rel: &str) -> String {
    root.join(rel).display().to_string()
}

fn names(bundle: &Bundle, package: &str, category: Option<Category>) -> Vec<String> {
    bundle
        .manifest()
        .list_files(package, category)
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect()
}

fn foo_files(install: &Path) -> FileSet {
    let mut files = FileSet::new();
    files.add(Category::Run, [pattern(install, "lib/*.so")], "lib", [] as [&str; 0]);
    files.add(Category::RunDbg, [pattern(install, "lib/debug/*.so")], "lib/debug", [] as [&str; 0]);
    files.add(
        Category::Build,
        [pattern(install, "include/**")],
        "include",
        [pattern(install, "**/private/**")],
    );
    files.add(Category::Build, [pattern(install, "lib/*.a")], "/lib", [] as [&str; 0]);
    files
}

#[test]
fn test_install_stages_by_category() {
    let env = TestEnv::new();
    populate_install_dir(&env.install_dir);
    let bundle = env.bundle();

    let installed = bundle
        .manifest()
        .install("foo", "2.1", &["zlib"], &foo_files(&env.install_dir), false)
        .unwrap();
    assert!(installed);

    assert_eq!(names(&bundle, "foo", Some(Category::Run)), vec!["lib/libfoo.so"]);
    assert_eq!(names(&bundle, "foo", Some(Category::RunDbg)), vec!["lib/debug/libfoo.so"]);

    let mut build = names(&bundle, "foo", Some(Category::Build));
    build.sort();
    assert_eq!(build, vec!["include/foo", "lib/libfoo.a"]);

    let root = &env.bundle_path;
    assert!(root.join("lib/libfoo.so").is_file());
    assert!(root.join("lib/debug/libfoo.so").is_file());
    assert!(root.join("include/foo/foo.h").is_file());
    assert!(root.join("include/foo/detail/impl.h").is_file());
    assert!(!root.join("include/foo/private").exists());
    assert!(!root.join("share").exists());

    assert_eq!(bundle.manifest().deps("foo").unwrap(), vec!["zlib"]);
}

#[test]
fn test_reinstall_without_force_keeps_records() {
    let env = TestEnv::new();
    populate_install_dir(&env.install_dir);
    let bundle = env.bundle();
    let manifest = bundle.manifest();

    manifest
        .install("foo", "2.1", &["zlib"], &foo_files(&env.install_dir), false)
        .unwrap();
    let before = names(&bundle, "foo", None);

    let installed = manifest
        .install("foo", "2.1", &[] as &[&str], &FileSet::new(), false)
        .unwrap();
    assert!(!installed);
    assert_eq!(manifest.installed().unwrap().len(), 1);
    assert_eq!(names(&bundle, "foo", None), before);
    assert_eq!(manifest.deps("foo").unwrap(), vec!["zlib"]);
}

#[test]
fn test_force_replaces_records() {
    let env = TestEnv::new();
    populate_install_dir(&env.install_dir);
    let bundle = env.bundle();
    let manifest = bundle.manifest();

    manifest
        .install("foo", "2.1", &["zlib"], &foo_files(&env.install_dir), false)
        .unwrap();

    let mut docs = FileSet::new();
    docs.add(Category::Run, [pattern(&env.install_dir, "share/doc/*")], "doc", [] as [&str; 0]);
    assert!(manifest.install("foo", "2.2", &["libpng"], &docs, true).unwrap());

    let installed = manifest.installed().unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].version, "2.2");
    assert_eq!(names(&bundle, "foo", None), vec!["doc/README"]);
    assert_eq!(manifest.deps("foo").unwrap(), vec!["libpng"]);
}

#[test]
fn test_uninstall_removes_files_and_records() {
    let env = TestEnv::new();
    populate_install_dir(&env.install_dir);
    let bundle = env.bundle();
    let manifest = bundle.manifest();

    manifest
        .install("foo", "2.1", &["zlib"], &foo_files(&env.install_dir), false)
        .unwrap();
    // Already gone from disk; removal must not fail
    fs::remove_file(env.bundle_path.join("lib/libfoo.a")).unwrap();

    manifest.uninstall("foo").unwrap();
    assert!(!manifest.is_installed("foo").unwrap());
    assert!(!env.bundle_path.join("include/foo").exists());
    assert!(!env.bundle_path.join("lib/libfoo.so").exists());
    assert!(manifest.dependency_edges().unwrap().is_empty());

    assert!(matches!(manifest.uninstall("foo"), Err(Error::Bundle(_))));
}

#[test]
fn test_bundle_reload_keeps_identity_and_records() {
    let env = TestEnv::new();
    populate_install_dir(&env.install_dir);
    {
        let bundle = env.bundle();
        bundle
            .manifest()
            .install("foo", "2.1", &[] as &[&str], &foo_files(&env.install_dir), false)
            .unwrap();
    }

    let bundle = Bundle::load(&env.bundle_path).unwrap();
    assert_eq!(bundle.platform(), "linux");
    assert_eq!(bundle.toolchain(), "gcc");
    assert_eq!(bundle.arch(), "x64");
    assert!(bundle.manifest().is_installed("foo").unwrap());
    assert!(Bundle::create(&env.bundle_path, "linux", "gcc", "x64").is_err());
}
