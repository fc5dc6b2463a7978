// src/formula/buildtools.rs

//! Helpers for driving common build systems from a formula

use crate::builder::BuildContext;
use crate::error::Result;
use crate::system::{RunOptions, Runner};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default out-of-tree build directory for CMake projects
pub const CMAKE_BUILD_DIR: &str = "cmake_build";

/// Run `./configure --prefix=<install dir>` in `source_dir`
pub fn configure<S: AsRef<str>>(
    runner: &Runner,
    ctx: &BuildContext,
    source_dir: &Path,
    options: &[S],
) -> Result<()> {
    info!("Configuring {}", source_dir.display());

    let script = source_dir.join("configure");
    let mut args = vec![format!("--prefix={}", ctx.install_dir.display())];
    args.extend(options.iter().map(|o| o.as_ref().to_string()));

    runner.run(&script.display().to_string(), &args, &RunOptions::in_dir(source_dir))
}

/// CMake generator name for a toolchain
pub fn cmake_generator(toolchain: &str, arch: &str) -> String {
    match vc_version(toolchain) {
        Some(9) => with_arch("Visual Studio 9 2008".to_string(), arch),
        Some(version) => {
            let year = vc_version_year(toolchain);
            let name = if year.is_empty() {
                format!("Visual Studio {}", version)
            } else {
                format!("Visual Studio {} {}", version, year)
            };
            with_arch(name, arch)
        }
        None => "Unix Makefiles".to_string(),
    }
}

fn with_arch(generator: String, arch: &str) -> String {
    if arch == "x64" {
        format!("{} Win64", generator)
    } else {
        generator
    }
}

/// Configure a CMake project in an out-of-tree build directory
///
/// `CMAKE_INSTALL_PREFIX` is set to the install dir. Returns the build
/// directory (`<source_dir>/cmake_build` unless given).
pub fn cmake(
    runner: &Runner,
    ctx: &BuildContext,
    source_dir: &Path,
    options: &BTreeMap<String, String>,
    build_dir: Option<&Path>,
) -> Result<PathBuf> {
    let build_dir = match build_dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => source_dir.join(dir),
        None => source_dir.join(CMAKE_BUILD_DIR),
    };
    fs::create_dir_all(&build_dir)?;

    info!("Configuring {} with CMake", source_dir.display());

    let mut args = vec![
        "-D".to_string(),
        format!("CMAKE_INSTALL_PREFIX={}", ctx.install_dir.display()),
    ];
    for (key, value) in options {
        args.push("-D".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push("-G".to_string());
    args.push(cmake_generator(&ctx.toolchain, &ctx.arch));
    args.push(source_dir.display().to_string());

    runner.run("cmake", &args, &RunOptions::in_dir(&build_dir))?;
    Ok(build_dir)
}

/// Visual C++ version from a toolchain name like `vc12`
pub fn vc_version(toolchain: &str) -> Option<u32> {
    toolchain.strip_prefix("vc")?.parse().ok()
}

/// Visual Studio release year for a Visual C++ toolchain
pub fn vc_version_year(toolchain: &str) -> &'static str {
    match toolchain {
        "vc9" => "2008",
        "vc10" => "2010",
        "vc11" => "2012",
        "vc12" => "2013",
        "vc14" => "2015",
        _ => "",
    }
}

/// Project file extension used by a Visual C++ toolchain
pub fn vcproj_ext(toolchain: &str) -> &'static str {
    match vc_version(toolchain) {
        Some(v) if v > 9 => ".vcxproj",
        _ => ".vcproj",
    }
}
