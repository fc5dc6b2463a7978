// src/source/archive.rs

//! Source archives downloaded over HTTP

use super::{SourceFetcher, needs_restage, touch, url_basename};
use crate::error::{Error, Result};
use crate::filesystem;
use crate::system::Runner;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Timeout for a whole archive download
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Fetches a tarball or zip file into the cache and extracts it
#[derive(Debug)]
pub struct ArchiveFetcher {
    url: String,
    archive: PathBuf,
    working: PathBuf,
    runner: Runner,
}

impl ArchiveFetcher {
    /// The archive is cached as `<cache_dir>/<url basename>`
    pub fn new(url: &str, cache_dir: &Path, working: PathBuf, runner: Runner) -> Result<Self> {
        let archive = cache_dir.join(url_basename(url)?);
        Ok(Self {
            url: url.to_string(),
            archive,
            working,
            runner,
        })
    }

    fn download(&self) -> Result<()> {
        info!("Downloading {}", self.url);

        if let Some(parent) = self.archive.parent() {
            fs::create_dir_all(parent)?;
        }

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {e}")))?;

        let response = client
            .get(&self.url)
            .send()
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.url)))?;
        if !response.status().is_success() {
            return Err(Error::InvalidUrl(format!("HTTP {} from {}", response.status(), self.url)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("application") {
            return Err(Error::InvalidUrl(format!(
                "{} does not point to an archive (content type '{}')",
                self.url, content_type
            )));
        }

        let total_size = response.content_length().unwrap_or(0);
        let display_name = self
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let progress = create_progress_bar(total_size, &display_name);

        // Write to a temporary file first so an interrupted download never
        // looks like a cached archive
        let temp_path = self.archive.with_extension("part");
        let mut file = File::create(&temp_path)?;
        let downloaded = match stream_response_to_file(response, &mut file, &progress) {
            Ok(n) => n,
            Err(e) => {
                progress.abandon();
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };
        progress.finish_with_message(format!("{} [done]", display_name));
        debug!("Downloaded {} bytes", downloaded);

        fs::rename(&temp_path, &self.archive)?;
        info!("Saved {}", self.archive.display());
        Ok(())
    }
}

impl SourceFetcher for ArchiveFetcher {
    /// Download the archive unless it is already cached
    fn fetch(&self) -> Result<()> {
        if self.archive.is_file() {
            debug!("Using cached archive {}", self.archive.display());
            return Ok(());
        }
        self.download()
    }

    /// Extract into a scratch dir and move the single top-level dir into place
    fn stage(&self) -> Result<PathBuf> {
        if !needs_restage(&self.working, &self.archive)? {
            debug!("Working copy {} is up to date", self.working.display());
            return Ok(self.working.clone());
        }

        let build_dir = self
            .working
            .parent()
            .ok_or_else(|| {
                Error::SourceArchive(format!("No parent for {}", self.working.display()))
            })?;
        fs::create_dir_all(build_dir)?;
        filesystem::remove(&self.working)?;

        info!("Extracting {}", self.archive.display());
        let scratch = tempfile::Builder::new().prefix(".extract-").tempdir_in(build_dir)?;
        self.runner.extract(&self.archive, scratch.path())?;

        let entries: Vec<PathBuf> = fs::read_dir(scratch.path())?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        let top = match entries.as_slice() {
            [single] if single.is_dir() => single.clone(),
            _ => {
                return Err(Error::SourceArchive(format!(
                    "{} must contain exactly one top-level directory, found {} entries",
                    self.archive.display(),
                    entries.len()
                )));
            }
        };

        fs::rename(&top, &self.working)?;
        touch(&self.working)?;
        Ok(self.working.clone())
    }

    fn working_dir(&self) -> &Path {
        &self.working
    }

    fn cache_path(&self) -> &Path {
        &self.archive
    }
}

/// Styled progress bar for archive downloads
fn create_progress_bar(size: u64, name: &str) -> ProgressBar {
    let pb = ProgressBar::new(size);
    let style = ProgressStyle::default_bar()
        .template(concat!(
            "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] ",
            "{bytes}/{total_bytes} ({bytes_per_sec}) {msg}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    if size > 0 {
        pb.set_message(name.to_string());
    } else {
        pb.set_message(format!("{} (unknown size)", name));
    }
    pb
}

fn stream_response_to_file(
    mut response: reqwest::blocking::Response,
    file: &mut File,
    progress: &ProgressBar,
) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::Download(format!("Failed to read response: {e}")))?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
        progress.set_position(downloaded);
    }

    file.flush()?;
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use filetime::FileTime;
    use tempfile::TempDir;

    fn write_tarball(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn fetcher(dir: &TempDir) -> ArchiveFetcher {
        let cache = dir.path().join("src_cache");
        fs::create_dir_all(&cache).unwrap();
        ArchiveFetcher::new(
            "https://zlib.net/zlib-1.2.8.tar.gz",
            &cache,
            dir.path().join("build/zlib-1.2.8"),
            Runner::from_host(),
        )
        .unwrap()
    }

    #[test]
    fn test_fetch_uses_cached_archive() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        write_tarball(fetcher.cache_path(), &[("zlib-1.2.8/zlib.h", "header")]);

        // No network access happens for an archive that is already cached
        fetcher.fetch().unwrap();
    }

    #[test]
    fn test_stage_moves_single_directory() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        write_tarball(
            fetcher.cache_path(),
            &[("zlib-1.2.8-src/zlib.h", "header"), ("zlib-1.2.8-src/configure", "#!/bin/sh")],
        );

        let working = fetcher.stage().unwrap();
        assert_eq!(working, dir.path().join("build/zlib-1.2.8"));
        assert_eq!(fs::read_to_string(working.join("zlib.h")).unwrap(), "header");

        // Only the working copy is left in the build dir
        let left: Vec<_> = fs::read_dir(dir.path().join("build")).unwrap().collect();
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn test_stage_rejects_multiple_top_level_entries() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        write_tarball(fetcher.cache_path(), &[("a/x", "1"), ("b/y", "2")]);

        let err = fetcher.stage().unwrap_err();
        assert!(matches!(err, Error::SourceArchive(_)));
    }

    #[test]
    fn test_stage_restages_only_when_stale() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        write_tarball(fetcher.cache_path(), &[("zlib/zlib.h", "header")]);
        let old = FileTime::from_unix_time(FileTime::now().unix_seconds() - 3600, 0);
        filetime::set_file_mtime(fetcher.cache_path(), old).unwrap();

        let working = fetcher.stage().unwrap();
        fs::write(working.join("local-edit"), "x").unwrap();
        filetime::set_file_mtime(&working, FileTime::now()).unwrap();

        fetcher.stage().unwrap();
        assert!(working.join("local-edit").exists());

        filetime::set_file_mtime(fetcher.cache_path(), FileTime::now()).unwrap();
        filetime::set_file_mtime(&working, old).unwrap();
        fetcher.stage().unwrap();
        assert!(!working.join("local-edit").exists());
        assert!(working.join("zlib.h").exists());
    }
}
