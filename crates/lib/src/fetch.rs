//! Archive downloads with checksum gating.
//!
//! A download lands in a temporary file next to its final location and is only
//! renamed to its canonical name once the checksum (if any) matches. A file
//! under a canonical name is therefore always either unverified-by-request or
//! verified, never tampered.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::util::hash::{Checksum, hash_bytes};

/// A remote archive and where it is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
  pub url: String,
  pub local_path: PathBuf,
  pub checksum: Option<Checksum>,
}

impl Archive {
  /// Describe `url`, cached under `cache_dir` by its sanitized file name.
  pub fn new(url: impl Into<String>, cache_dir: &Path, checksum: Option<Checksum>) -> Self {
    let url = url.into();
    let local_path = cache_dir.join(url_to_filename(&url));
    Self {
      url,
      local_path,
      checksum,
    }
  }
}

/// Result of the fetch step, before verification.
#[derive(Debug)]
pub enum Fetched {
  /// The canonical file already existed and matched its checksum (or none was requested).
  Cached(Archive),
  /// Fresh bytes waiting in a temporary file beside the canonical path.
  Downloaded { archive: Archive, temp: NamedTempFile },
}

impl Fetched {
  pub fn archive(&self) -> &Archive {
    match self {
      Self::Cached(archive) | Self::Downloaded { archive, .. } => archive,
    }
  }
}

/// An archive whose bytes are in place under their canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedArchive {
  pub archive: Archive,
  /// Whether a checksum was actually compared.
  pub checksum_verified: bool,
}

impl VerifiedArchive {
  pub fn path(&self) -> &Path {
    &self.archive.local_path
  }
}

/// Downloads archives over HTTP(S) or copies them from `file://` URLs.
#[derive(Debug, Clone, Default)]
pub struct ArchiveFetcher {
  client: reqwest::Client,
}

impl ArchiveFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fetch then verify in one call.
  pub async fn fetch_verified(&self, archive: &Archive) -> Result<VerifiedArchive> {
    let fetched = self.fetch(archive).await?;
    self.verify(fetched).await
  }

  /// Make the archive's bytes available locally.
  ///
  /// An existing canonical file is reused when it matches the checksum; a
  /// mismatching one is discarded and downloaded again.
  pub async fn fetch(&self, archive: &Archive) -> Result<Fetched> {
    let dest = &archive.local_path;
    let parent = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).await.map_err(|source| Error::DownloadIo {
      url: archive.url.clone(),
      path: parent.to_path_buf(),
      source,
    })?;

    if dest.exists() {
      debug!(path = ?dest, "checking cached archive");
      match &archive.checksum {
        None => {
          info!(path = ?dest, "using cached archive");
          return Ok(Fetched::Cached(archive.clone()));
        }
        Some(checksum) => {
          let (ok, actual) = verify_blocking(checksum.clone(), dest.clone()).await?;
          if ok {
            info!(path = ?dest, "using cached archive");
            return Ok(Fetched::Cached(archive.clone()));
          }
          warn!(path = ?dest, expected = %checksum.digest, actual = %actual, "cached archive checksum mismatch, re-downloading");
          fs::remove_file(dest).await?;
        }
      }
    }

    info!(url = %archive.url, "fetching archive");
    let bytes = self.download_bytes(&archive.url).await?;

    let temp = NamedTempFile::new_in(parent).map_err(|source| Error::DownloadIo {
      url: archive.url.clone(),
      path: parent.to_path_buf(),
      source,
    })?;
    let mut file = fs::File::from_std(temp.reopen()?);
    file.write_all(&bytes).await?;
    file.flush().await?;
    file.sync_all().await?;

    info!(url = %archive.url, size = bytes.len(), "download complete");

    Ok(Fetched::Downloaded {
      archive: archive.clone(),
      temp,
    })
  }

  /// Check the checksum and promote a fresh download to its canonical name.
  ///
  /// On mismatch the temporary file is dropped, so nothing is left under the
  /// canonical name.
  pub async fn verify(&self, fetched: Fetched) -> Result<VerifiedArchive> {
    match fetched {
      Fetched::Cached(archive) => {
        let checksum_verified = archive.checksum.is_some();
        Ok(VerifiedArchive {
          archive,
          checksum_verified,
        })
      }
      Fetched::Downloaded { archive, temp } => {
        if let Some(checksum) = &archive.checksum {
          let (ok, actual) = verify_blocking(checksum.clone(), temp.path().to_path_buf()).await?;
          if !ok {
            return Err(Error::ChecksumMismatch {
              url: archive.url.clone(),
              expected: checksum.to_string(),
              actual: format!("{}:{}", checksum.algorithm, actual),
            });
          }
          debug!(url = %archive.url, algorithm = %checksum.algorithm, "checksum verified");
        }

        temp.persist(&archive.local_path).map_err(|e| Error::DownloadIo {
          url: archive.url.clone(),
          path: archive.local_path.clone(),
          source: e.error,
        })?;

        let checksum_verified = archive.checksum.is_some();
        Ok(VerifiedArchive {
          archive,
          checksum_verified,
        })
      }
    }
  }

  async fn download_bytes(&self, url: &str) -> Result<Vec<u8>> {
    if let Some(path) = url.strip_prefix("file://") {
      return fs::read(path).await.map_err(|e| Error::FetchFailed {
        url: url.to_string(),
        message: e.to_string(),
      });
    }

    let response = self.client.get(url).send().await.map_err(|e| Error::FetchFailed {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    if !response.status().is_success() {
      return Err(Error::FetchFailed {
        url: url.to_string(),
        message: format!("HTTP {}", response.status()),
      });
    }

    let bytes = response.bytes().await.map_err(|e| Error::FetchFailed {
      url: url.to_string(),
      message: e.to_string(),
    })?;
    Ok(bytes.to_vec())
  }
}

async fn verify_blocking(checksum: Checksum, path: PathBuf) -> Result<(bool, String)> {
  tokio::task::spawn_blocking(move || checksum.verify_file(&path))
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e)))?
    .map_err(Error::Io)
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to a hash of
/// the URL if no suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    let filename = filename.split('?').next().unwrap_or(filename);

    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  format!("download_{}", &hash_bytes(url.as_bytes())[..16])
}
