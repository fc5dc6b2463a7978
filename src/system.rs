// src/system.rs

//! Process execution and host tool wrappers
//!
//! Every external tool Cellar drives (compilers via build steps, VCS
//! clients, `patch`, archivers) goes through a [`Runner`], which carries the
//! environment subprocesses see and turns non-zero exits into
//! [`Error::ProcessExecution`].

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tar::Archive;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Short name of the host operating system: `win`, `mac` or `linux`
pub fn os_name() -> &'static str {
    if cfg!(windows) {
        "win"
    } else if cfg!(target_os = "macos") {
        "mac"
    } else {
        "linux"
    }
}

/// Options for a single [`Runner::run`] call
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory of the child, the current directory when unset
    pub cwd: Option<PathBuf>,
    /// Log a non-zero exit instead of failing
    pub ignore_errors: bool,
    /// Discard the child's stdout and stderr
    pub silent: bool,
}

impl RunOptions {
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }
}

/// Runs external commands with a fixed environment
#[derive(Debug, Clone)]
pub struct Runner {
    env: HashMap<String, String>,
}

impl Runner {
    /// Runner whose children see exactly `env`
    pub fn new(env: HashMap<String, String>) -> Self {
        Self { env }
    }

    /// Runner inheriting the environment of this process
    pub fn from_host() -> Self {
        Self::new(std::env::vars().collect())
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Resolve a command name to an executable
    ///
    /// A name that is already a path to a file is used as-is. Otherwise the
    /// runner's `PATH` is searched, then the `PATH` of this process.
    pub fn find_command(&self, name: &str) -> Result<PathBuf> {
        let direct = Path::new(name);
        if direct.components().count() > 1 && direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let mut search: Vec<PathBuf> = Vec::new();
        if let Some(path) = self.env.get("PATH") {
            search.extend(std::env::split_paths(path));
        }
        if let Some(path) = std::env::var_os("PATH") {
            search.extend(std::env::split_paths(&path));
        }
        let search_path: OsString = std::env::join_paths(search).unwrap_or_default();

        let cwd = std::env::current_dir()?;
        which::which_in(name, Some(search_path), cwd).map_err(|_| {
            Error::CommandNotFound(format!("{} could not be found by searching PATH", name))
        })
    }

    /// True if `name` resolves to an executable
    pub fn has_command(&self, name: &str) -> bool {
        self.find_command(name).is_ok()
    }

    /// Run a command to completion
    pub fn run<S: AsRef<str>>(&self, name: &str, args: &[S], options: &RunOptions) -> Result<()> {
        let program = self.find_command(name)?;
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let command_line = std::iter::once(name)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        debug!("Running: {}", command_line);

        let mut cmd = Command::new(&program);
        cmd.args(&args).env_clear().envs(&self.env);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        if options.silent {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = cmd.status().map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("Failed to run {}: {}", name, e)))
        })?;

        if status.success() {
            return Ok(());
        }

        if options.ignore_errors {
            warn!("{} exited with {:?}, continuing", command_line, status.code());
            return Ok(());
        }

        Err(Error::ProcessExecution {
            command: command_line,
            code: status.code(),
        })
    }

    /// Run a command line through the platform shell
    pub fn run_shell(&self, command_line: &str, options: &RunOptions) -> Result<()> {
        if cfg!(windows) {
            self.run("cmd", &["/C", command_line], options)
        } else {
            self.run("sh", &["-c", command_line], options)
        }
    }

    /// Start an interactive shell and wait for it to exit
    ///
    /// Returns whether the shell exited successfully.
    pub fn shell(&self, cwd: &Path) -> Result<bool> {
        let shell = if cfg!(windows) {
            self.env
                .get("COMSPEC")
                .cloned()
                .unwrap_or_else(|| "cmd".to_string())
        } else {
            self.env
                .get("SHELL")
                .cloned()
                .unwrap_or_else(|| "sh".to_string())
        };
        let program = self.find_command(&shell)?;

        info!("Starting shell in {}, exit with a non-zero status to abort", cwd.display());
        let status = Command::new(program)
            .current_dir(cwd)
            .env_clear()
            .envs(&self.env)
            .status()?;
        Ok(status.success())
    }

    /// Extract an archive into `dest`
    ///
    /// Plain, gzip and xz tarballs are unpacked in-process. Other formats go
    /// through `tar`, `unzip` or `7z`, whichever is available.
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        debug!("Extracting {} to {}", archive.display(), dest.display());
        fs::create_dir_all(dest)?;

        let native: Option<Box<dyn Read>> = if file_name.ends_with(".tar") {
            Some(Box::new(File::open(archive)?))
        } else if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
            Some(Box::new(GzDecoder::new(File::open(archive)?)))
        } else if file_name.ends_with(".tar.xz") || file_name.ends_with(".txz") {
            Some(Box::new(XzDecoder::new(File::open(archive)?)))
        } else {
            None
        };

        if let Some(reader) = native {
            Archive::new(reader).unpack(dest).map_err(|e| {
                Error::SourceArchive(format!("Failed to extract {}: {}", archive.display(), e))
            })?;
            return Ok(());
        }

        let result = if is_compressed_tar(&file_name) {
            self.extract_tar(archive, dest)
        } else if file_name.ends_with(".zip") {
            self.extract_zip(archive, dest)
        } else {
            self.extract_7z(archive, dest)
        };

        result.map_err(|e| match e {
            Error::CommandNotFound(_) => Error::CommandNotFound(format!(
                "Could not find a program for extracting {} (tar, unzip, 7z)",
                archive.display()
            )),
            other => other,
        })
    }

    fn extract_tar(&self, archive: &Path, dest: &Path) -> Result<()> {
        let args = [
            "-xf".to_string(),
            unix_path(archive),
            "-C".to_string(),
            unix_path(dest),
        ];
        match self.run("tar", &args, &RunOptions::default()) {
            Err(Error::CommandNotFound(_)) => {
                // 7z unpacks the compression layer first, then the inner tarball
                self.extract_7z(archive, dest)?;
                let inner = archive
                    .file_stem()
                    .map(|stem| dest.join(stem))
                    .ok_or_else(|| Error::SourceArchive(archive.display().to_string()))?;
                self.extract_7z(&inner, dest)?;
                fs::remove_file(&inner)?;
                Ok(())
            }
            other => other,
        }
    }

    fn extract_zip(&self, archive: &Path, dest: &Path) -> Result<()> {
        let args = [
            "-qq".to_string(),
            archive.display().to_string(),
            "-d".to_string(),
            dest.display().to_string(),
        ];
        match self.run("unzip", &args, &RunOptions::default()) {
            Err(Error::CommandNotFound(_)) => self.extract_7z(archive, dest),
            other => other,
        }
    }

    fn extract_7z(&self, archive: &Path, dest: &Path) -> Result<()> {
        let args = [
            "x".to_string(),
            "-y".to_string(),
            format!("-o{}", dest.display()),
            archive.display().to_string(),
        ];
        let options = RunOptions {
            silent: true,
            ..RunOptions::default()
        };
        self.run("7z", &args, &options)
    }

    /// Apply patches with `patch -p1`
    ///
    /// A patch that fails to apply is logged and skipped.
    pub fn patch(&self, patches: &[PathBuf], dir: &Path) -> Result<()> {
        for patch in patches {
            info!("Applying patch: {}", patch.display());
            let args = [
                "-f".to_string(),
                "-p1".to_string(),
                "-d".to_string(),
                dir.display().to_string(),
                "-i".to_string(),
                patch.display().to_string(),
            ];
            match self.run("patch", &args, &RunOptions::default()) {
                Ok(()) => {}
                Err(Error::ProcessExecution { code, .. }) => {
                    let name = patch
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    warn!("Failed to apply patch {} (exit code {:?})", name, code);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn is_compressed_tar(file_name: &str) -> bool {
    Path::new(file_name)
        .file_stem()
        .is_some_and(|stem| stem.to_string_lossy().ends_with(".tar"))
        || file_name.ends_with(".tbz2")
}

/// Convert a Windows path to the `/c/dir` form MSYS tar expects
fn unix_path(path: &Path) -> String {
    let s = path.display().to_string();
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        format!("/{}{}", &s[..1], s[2..].replace('\\', "/"))
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn write_tgz(path: &Path, files: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_os_name() {
        assert!(["win", "mac", "linux"].contains(&os_name()));
    }

    #[test]
    fn test_unix_path() {
        assert_eq!(unix_path(Path::new("C:\\src\\zlib")), "/C/src/zlib");
        assert_eq!(unix_path(Path::new("/tmp/zlib")), "/tmp/zlib");
    }

    #[test]
    fn test_compressed_tar_detection() {
        assert!(is_compressed_tar("zlib-1.2.8.tar.bz2"));
        assert!(is_compressed_tar("zlib.tbz2"));
        assert!(!is_compressed_tar("zlib.zip"));
        assert!(!is_compressed_tar("zlib.7z"));
    }

    #[test]
    fn test_find_missing_command() {
        let runner = Runner::from_host();
        let err = runner.find_command("definitely-not-a-real-tool-xyz").unwrap_err();
        assert!(matches!(err, Error::CommandNotFound(_)));
    }

    #[test]
    fn test_extract_native_tgz() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("zlib-1.2.8.tar.gz");
        write_tgz(
            &archive,
            &[("zlib-1.2.8/README", "zlib"), ("zlib-1.2.8/src/zlib.h", "h")],
        );

        let dest = dir.path().join("out");
        Runner::from_host().extract(&archive, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("zlib-1.2.8/README")).unwrap(), "zlib");
        assert!(dest.join("zlib-1.2.8/src/zlib.h").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_exit_code() {
        let runner = Runner::from_host();
        let err = runner
            .run_shell("exit 3", &RunOptions::default())
            .unwrap_err();
        match err {
            Error::ProcessExecution { code, .. } => assert_eq!(code, Some(3)),
            other => panic!("unexpected error: {}", other),
        }

        let options = RunOptions {
            ignore_errors: true,
            ..RunOptions::default()
        };
        runner.run_shell("exit 3", &options).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_run_uses_environment_and_cwd() {
        let dir = TempDir::new().unwrap();
        let mut env: HashMap<String, String> = std::env::vars().collect();
        env.insert("CELLAR_TEST_VALUE".to_string(), "42".to_string());
        let runner = Runner::new(env);

        runner
            .run_shell("echo $CELLAR_TEST_VALUE > out.txt", &RunOptions::in_dir(dir.path()))
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap().trim(), "42");
    }
}
