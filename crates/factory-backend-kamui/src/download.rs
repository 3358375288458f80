//! Artifact download.
//!
//! The body is streamed into a temporary file next to the destination and
//! renamed into place only after the transfer completes and its size matches
//! the declared content length. A failed transfer never leaves a file at the
//! destination.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{KamuiError, KamuiResult};

/// Result of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The artifact is on disk.
    Saved {
        /// Absolute path of the saved file.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// Nothing was written.
    Failed { url: String, reason: String },
}

impl DownloadOutcome {
    fn failed(url: &str, reason: impl ToString) -> Self {
        DownloadOutcome::Failed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if the artifact was saved.
    pub fn is_saved(&self) -> bool {
        matches!(self, DownloadOutcome::Saved { .. })
    }
}

/// Fetches artifact URLs to local paths.
pub trait ArtifactFetcher {
    /// Downloads `url` to `destination`.
    ///
    /// Transfer failures are reported as [`DownloadOutcome::Failed`]; an
    /// `Err` is reserved for local problems such as an uncreatable directory.
    fn fetch(&self, url: &str, destination: &Path) -> KamuiResult<DownloadOutcome>;
}

impl<F: ArtifactFetcher + ?Sized> ArtifactFetcher for &F {
    fn fetch(&self, url: &str, destination: &Path) -> KamuiResult<DownloadOutcome> {
        (**self).fetch(url, destination)
    }
}

/// Blocking HTTP downloader.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Creates a downloader with no request timeout.
    pub fn new() -> KamuiResult<Self> {
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(KamuiError::HttpClient)?;
        Ok(Self { client })
    }

    /// Creates a downloader using an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl ArtifactFetcher for HttpDownloader {
    fn fetch(&self, url: &str, destination: &Path) -> KamuiResult<DownloadOutcome> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        tracing::info!(url, destination = %destination.display(), "downloading artifact");

        let mut response = match self.client.get(url).send() {
            Ok(r) => r,
            Err(e) => return Ok(DownloadOutcome::failed(url, e)),
        };
        let status = response.status();
        if !status.is_success() {
            return Ok(DownloadOutcome::failed(url, format!("HTTP status {}", status)));
        }
        let expected = response.content_length();

        // Dropped (and removed) on every early return below.
        let mut staging = tempfile::Builder::new()
            .prefix(".download_")
            .tempfile_in(&parent)?;

        let written = match response.copy_to(staging.as_file_mut()) {
            Ok(n) => n,
            Err(e) => return Ok(DownloadOutcome::failed(url, e)),
        };
        staging.as_file_mut().flush()?;

        if let Some(expected) = expected {
            if expected != written {
                return Ok(DownloadOutcome::failed(
                    url,
                    format!("received {} bytes, expected {}", written, expected),
                ));
            }
        }

        let file = staging
            .persist(destination)
            .map_err(|e| KamuiError::Io(e.error))?;
        drop(file);

        let path = std::fs::canonicalize(destination)?;
        tracing::info!(path = %path.display(), bytes = written, "artifact saved");
        Ok(DownloadOutcome::Saved {
            path,
            bytes: written,
        })
    }
}
