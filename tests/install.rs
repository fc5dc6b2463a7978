// tests/install.rs

//! Install and uninstall workflow tests.
//!
//! Sources are served from tarballs placed in the source cache, so nothing
//! here touches the network. Build steps run through `sh`.

#![cfg(unix)]

mod common;

use cellar::builder::{HookPhase, InstallOptions, Pause};
use cellar::system::Runner;
use cellar::{Category, Error};
use common::TestEnv;
use filetime::FileTime;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::rc::Rc;

const ZLIB: &str = r#"
[formula]
version = "1.2.8"

[source]
type = "archive"
url = "https://zlib.net/zlib-%(version)s.tar.gz"

[supported]
gcc = ["x64"]

[build]
steps = [
    "mkdir -p %(install_dir)s/lib %(install_dir)s/include",
    "cp libz.so.%(version)s %(install_dir)s/lib/libz.so",
    "cp libz.so.%(version)s %(install_dir)s/lib/libz.so.1",
    "cp zlib.h %(install_dir)s/include/",
]

[[files.run]]
include = ["lib/*.so"]
dest = "lib"

[[files.build]]
include = ["include/*.h"]
dest = "include"
"#;

fn setup_zlib(env: &TestEnv) {
    env.write_formula("zlib", ZLIB);
    env.write_source_archive(
        "zlib-1.2.8.tar.gz",
        "zlib-1.2.8",
        &[("libz.so.1.2.8", "ELF"), ("zlib.h", "#define ZLIB_VERSION \"1.2.8\"")],
    );
}

/// Record the formulas reaching a phase, in order
fn record_phase(
    builder: &mut cellar::FormulaBuilder,
    phase: HookPhase,
) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    builder.hooks_mut().register(phase, move |name| {
        sink.borrow_mut().push(name.to_string());
        Ok(())
    });
    log
}

fn options(force: bool) -> InstallOptions {
    InstallOptions {
        force,
        clean_source: false,
    }
}

#[test]
fn test_install_zlib_end_to_end() {
    let env = TestEnv::new();
    setup_zlib(&env);

    let mut builder = env.builder();
    let built = builder.install("zlib", &options(false)).unwrap();
    assert_eq!(built, vec!["zlib"]);

    let bundle = env.bundle();
    let manifest = bundle.manifest();
    let installed = manifest.installed().unwrap();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].name, "zlib");
    assert_eq!(installed[0].version, "1.2.8");

    let run: Vec<String> = manifest
        .list_files("zlib", Some(Category::Run))
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(run, vec!["lib/libz.so"]);

    let build: Vec<String> = manifest
        .list_files("zlib", Some(Category::Build))
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(build, vec!["include/zlib.h"]);

    assert!(manifest.deps("zlib").unwrap().is_empty());
    assert!(env.bundle_path.join("lib/libz.so").is_file());
    assert!(!env.bundle_path.join("lib/libz.so.1").exists());
}

#[test]
fn test_install_is_idempotent() {
    let env = TestEnv::new();
    setup_zlib(&env);

    env.builder().install("zlib", &options(false)).unwrap();

    let mut builder = env.builder();
    let builds = record_phase(&mut builder, HookPhase::PreBuild);
    let built = builder.install("zlib", &options(false)).unwrap();
    assert!(built.is_empty());
    assert!(builds.borrow().is_empty());
    assert_eq!(env.installed(), vec!["zlib"]);
}

#[test]
fn test_dependencies_build_first() {
    let env = TestEnv::new();
    env.add_archive_formula("zlib", "1.2.8", &[], "");
    env.add_archive_formula("libpng", "1.6.37", &["zlib"], "");
    env.add_archive_formula("app", "1.0", &["libpng", "zlib"], "");

    let mut builder = env.builder();
    let pre = record_phase(&mut builder, HookPhase::PreBuild);
    let post = record_phase(&mut builder, HookPhase::PostInstall);

    let built = builder.install("app", &options(false)).unwrap();
    assert_eq!(built, vec!["zlib", "libpng", "app"]);
    assert_eq!(*pre.borrow(), vec!["zlib", "libpng", "app"]);
    assert_eq!(*post.borrow(), vec!["zlib", "libpng", "app"]);

    let bundle = env.bundle();
    let deps: BTreeSet<String> = bundle.manifest().deps("app").unwrap().into_iter().collect();
    assert_eq!(deps, BTreeSet::from(["libpng".to_string(), "zlib".to_string()]));
    assert_eq!(bundle.manifest().deps("libpng").unwrap(), vec!["zlib"]);
}

#[test]
fn test_force_rebuilds_only_requested_formula() {
    let env = TestEnv::new();
    env.add_archive_formula("zlib", "1.2.8", &[], "");
    env.add_archive_formula("libpng", "1.6.37", &["zlib"], "");

    env.builder().install("libpng", &options(false)).unwrap();

    let mut builder = env.builder();
    let built = builder.install("libpng", &options(true)).unwrap();
    assert_eq!(built, vec!["libpng"]);
    assert_eq!(env.installed(), vec!["zlib", "libpng"]);
}

#[test]
fn test_kit_installs_members_only() {
    let env = TestEnv::new();
    env.add_archive_formula("zlib", "1.2.8", &[], "");
    env.add_archive_formula("libpng", "1.6.37", &["zlib"], "");
    env.write_formula(
        "imaging",
        r#"
[formula]
kit = true
depends_on = ["libpng", "zlib"]
"#,
    );
    env.add_archive_formula("viewer", "0.3", &["imaging"], "");

    let built = env.builder().install("viewer", &options(false)).unwrap();
    assert_eq!(built, vec!["zlib", "libpng", "viewer"]);
    assert_eq!(env.installed(), vec!["zlib", "libpng", "viewer"]);

    // The kit is replaced by its members in the recorded dependencies
    let deps: BTreeSet<String> =
        env.bundle().manifest().deps("viewer").unwrap().into_iter().collect();
    assert_eq!(deps, BTreeSet::from(["libpng".to_string(), "zlib".to_string()]));
}

#[test]
fn test_invalid_dependency_fails_before_any_build() {
    let env = TestEnv::new();
    env.add_archive_formula("zlib", "1.2.8", &[], "");
    env.write_formula(
        "winonly",
        r#"
[formula]
version = "2.0"

[source]
type = "archive"
url = "https://downloads.example.invalid/winonly-2.0.zip"

[supported]
vc12 = ["x86"]
"#,
    );
    env.add_archive_formula("app", "1.0", &["zlib", "winonly"], "");

    let mut builder = env.builder();
    let pre = record_phase(&mut builder, HookPhase::PreBuild);
    let err = builder.install("app", &options(false)).unwrap_err();

    assert!(matches!(err, Error::Formula { ref name, .. } if name == "winonly"));
    assert!(pre.borrow().is_empty());
    assert!(env.installed().is_empty());
}

#[test]
fn test_missing_dependency_is_not_found() {
    let env = TestEnv::new();
    env.add_archive_formula("app", "1.0", &["nowhere"], "");

    let err = env.builder().install("app", &options(false)).unwrap_err();
    assert!(matches!(err, Error::FormulaNotFound { ref name, .. } if name == "nowhere"));
}

#[test]
fn test_cycle_rejected_before_any_build() {
    let env = TestEnv::new();
    env.add_archive_formula("a", "1.0", &["b"], "");
    env.add_archive_formula("b", "1.0", &["a"], "");

    let mut builder = env.builder();
    let pre = record_phase(&mut builder, HookPhase::PreBuild);
    let err = builder.install("a", &options(false)).unwrap_err();

    assert!(matches!(err, Error::Cycle(_)));
    assert!(pre.borrow().is_empty());
    assert!(env.installed().is_empty());
}

struct AbortAt(&'static str);

impl Pause for AbortAt {
    fn pause(&mut self, formula: &str, _source_dir: &Path, _runner: &Runner) -> cellar::Result<()> {
        if formula == self.0 {
            Err(Error::AbortOperation)
        } else {
            Ok(())
        }
    }
}

#[test]
fn test_abort_keeps_finished_dependencies() {
    let env = TestEnv::new();
    env.add_archive_formula("zlib", "1.2.8", &[], "");
    env.add_archive_formula("libpng", "1.6.37", &["zlib"], "");

    let mut builder = env.builder().with_pause(Box::new(AbortAt("libpng")));
    let built_hooks = record_phase(&mut builder, HookPhase::PreBuild);
    let err = builder.install("libpng", &options(false)).unwrap_err();

    assert!(err.is_abort());
    assert_eq!(*built_hooks.borrow(), vec!["zlib"]);
    assert_eq!(env.installed(), vec!["zlib"]);
}

#[test]
fn test_failing_build_step_records_nothing() {
    let env = TestEnv::new();
    env.add_archive_formula("broken", "0.1", &[], "[build]\nsteps = [\"exit 3\"]\n");

    let err = env.builder().install("broken", &options(false)).unwrap_err();
    assert!(matches!(err, Error::ProcessExecution { code: Some(3), .. }));
    assert!(env.installed().is_empty());
}

#[test]
fn test_missing_patch_fails_install() {
    let env = TestEnv::new();
    env.write_formula(
        "zlib",
        r#"
[formula]
version = "1.2.8"
patches = ["no-such-fix"]

[source]
type = "archive"
url = "https://downloads.example.invalid/zlib-1.2.8.tar.gz"

[supported]
gcc = ["x64"]
"#,
    );
    env.write_source_archive("zlib-1.2.8.tar.gz", "zlib-1.2.8", &[("README", "zlib")]);

    let err = env.builder().install("zlib", &options(false)).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(ref msg) if msg.contains("no-such-fix.diff")));
    assert!(env.installed().is_empty());
}

const PATCHED_FORMULA: &str = r#"
[formula]
version = "1.0"
patches = ["fix-readme"]

[source]
type = "archive"
url = "https://downloads.example.invalid/hello-1.0.tar.gz"

[supported]
gcc = ["x64"]

[build]
steps = ["mkdir -p %(install_dir)s/share", "cp README %(install_dir)s/share/README"]

[[files.run]]
include = ["share/README"]
dest = "share"
"#;

/// Formula `hello` whose `fix-readme.diff` is `diff`
fn setup_patched(env: &TestEnv, diff: &str) {
    env.write_formula("hello", PATCHED_FORMULA);
    env.write_source_archive("hello-1.0.tar.gz", "hello-1.0", &[("README", "hello\n")]);
    let patches = env.formula_dir.join("patches/hello");
    fs::create_dir_all(&patches).unwrap();
    fs::write(patches.join("fix-readme.diff"), diff).unwrap();
}

fn has_patch() -> bool {
    Runner::from_host().has_command("patch")
}

#[test]
fn test_patch_applied_once_to_fresh_working_copy() {
    if !has_patch() {
        return;
    }
    let env = TestEnv::new();
    setup_patched(
        &env,
        "--- a/README\n+++ b/README\n@@ -1 +1 @@\n-hello\n+hello, patched\n",
    );
    let working = env.working_dir("hello", "1.0");

    env.builder().install("hello", &options(false)).unwrap();
    assert_eq!(fs::read_to_string(working.join("README")).unwrap(), "hello, patched\n");
    assert_eq!(
        fs::read_to_string(env.bundle_path.join("share/README")).unwrap(),
        "hello, patched\n"
    );

    // The reused working copy is not patched a second time
    env.builder().install("hello", &options(true)).unwrap();
    assert_eq!(fs::read_to_string(working.join("README")).unwrap(), "hello, patched\n");
    assert!(!working.join("README.rej").exists());
    assert!(!working.join("README.orig").exists());
}

#[test]
fn test_patch_that_does_not_apply_is_not_fatal() {
    if !has_patch() {
        return;
    }
    let env = TestEnv::new();
    setup_patched(
        &env,
        "--- a/README\n+++ b/README\n@@ -1 +1 @@\n-goodbye\n+farewell\n",
    );

    let built = env.builder().install("hello", &options(false)).unwrap();
    assert_eq!(built, vec!["hello"]);
    assert_eq!(env.installed(), vec!["hello"]);
    assert_eq!(
        fs::read_to_string(env.bundle_path.join("share/README")).unwrap(),
        "hello\n"
    );
}

#[test]
fn test_working_copy_restaged_when_cache_is_newer() {
    let env = TestEnv::new();
    setup_zlib(&env);
    let archive = env.cache_dir.join("zlib-1.2.8.tar.gz");
    let working = env.working_dir("zlib", "1.2.8");
    let past = FileTime::from_unix_time(FileTime::now().unix_seconds() - 3600, 0);
    filetime::set_file_mtime(&archive, past).unwrap();

    env.builder().install("zlib", &options(false)).unwrap();
    fs::write(working.join("local-change"), "kept").unwrap();

    // Cache unchanged: the working copy is reused
    env.builder().install("zlib", &options(true)).unwrap();
    assert!(working.join("local-change").exists());

    // Cache newer than the working copy: staged again from the archive
    filetime::set_file_mtime(&working, past).unwrap();
    filetime::set_file_mtime(&archive, FileTime::now()).unwrap();
    env.builder().install("zlib", &options(true)).unwrap();
    assert!(!working.join("local-change").exists());
    assert!(working.join("zlib.h").is_file());
}

#[test]
fn test_clean_source_restages() {
    let env = TestEnv::new();
    setup_zlib(&env);
    let working = env.working_dir("zlib", "1.2.8");

    env.builder().install("zlib", &options(false)).unwrap();
    fs::write(working.join("local-change"), "gone").unwrap();

    let opts = InstallOptions {
        force: true,
        clean_source: true,
    };
    env.builder().install("zlib", &opts).unwrap();
    assert!(!working.join("local-change").exists());
}

#[test]
fn test_uninstall_cascades_and_removes_files() {
    let env = TestEnv::new();
    setup_zlib(&env);
    env.add_archive_formula(
        "libpng",
        "1.6.37",
        &["zlib"],
        r#"
[build]
steps = ["mkdir -p %(install_dir)s/lib", "cp README %(install_dir)s/lib/libpng.so"]

[[files.run]]
include = ["lib/libpng.so"]
dest = "lib"
"#,
    );

    let builder = {
        let mut builder = env.builder();
        builder.install("libpng", &options(false)).unwrap();
        builder
    };
    assert!(env.bundle_path.join("lib/libpng.so").is_file());

    let removed = builder.uninstall("zlib", false).unwrap();
    assert_eq!(removed, vec!["libpng", "zlib"]);
    assert!(env.installed().is_empty());
    assert!(!env.bundle_path.join("lib/libpng.so").exists());
    assert!(!env.bundle_path.join("lib/libz.so").exists());
    assert!(!env.bundle_path.join("include/zlib.h").exists());
}

#[test]
fn test_uninstall_keep_dependents() {
    let env = TestEnv::new();
    setup_zlib(&env);
    env.add_archive_formula("libpng", "1.6.37", &["zlib"], "");

    let mut builder = env.builder();
    builder.install("libpng", &options(false)).unwrap();

    let removed = builder.uninstall("zlib", true).unwrap();
    assert_eq!(removed, vec!["zlib"]);
    assert_eq!(env.installed(), vec!["libpng"]);
    assert!(!env.bundle_path.join("lib/libz.so").exists());
}
