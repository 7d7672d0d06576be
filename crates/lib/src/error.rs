//! Error types shared by every build stage.
//!
//! Each component returns the most specific [`Error`] variant it can
//! determine. Callers that only care about the failure class (for exit codes
//! or retry decisions) use [`Error::kind`].

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse failure class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// Network or transport failure. Re-running the pipeline may succeed.
  Download,
  /// Checksum mismatch or failed smoke test.
  Validation,
  /// Unsafe or corrupt archive.
  Extraction,
  /// A driven external process exited non-zero.
  Command,
  /// Dependency cycle, unknown configuration, or a failed build step.
  Build,
}

impl ErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Download => "download",
      Self::Validation => "validation",
      Self::Extraction => "extraction",
      Self::Command => "command",
      Self::Build => "build",
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} error", self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// HTTP request or local copy failed while downloading.
  #[error("fetch failed for {url}: {message}")]
  FetchFailed { url: String, message: String },

  /// The downloaded bytes could not be written to the cache.
  #[error("failed to store download of {url} at {}: {source}", path.display())]
  DownloadIo {
    url: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Recomputed digest differs from the requested one.
  #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
  ChecksumMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// Checksum parameter could not be parsed.
  #[error("invalid checksum '{0}': expected <sha256|sha512|md5>:<hex digest>")]
  InvalidChecksum(String),

  /// An archive member would land outside the destination root.
  #[error("archive member '{member}' escapes destination {}", dest.display())]
  UnsafeArchiveMember { member: String, dest: PathBuf },

  /// The archive is unreadable or truncated.
  #[error("failed to extract {}: {message}", archive.display())]
  CorruptArchive { archive: PathBuf, message: String },

  /// Archive format not recognised from its name or leading bytes.
  #[error("unsupported archive format: {}", .0.display())]
  UnsupportedArchive(PathBuf),

  /// Command exited with a non-zero status.
  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  /// Command could not be started at all.
  #[error("failed to spawn {program}: {source}")]
  CmdSpawn {
    program: String,
    #[source]
    source: io::Error,
  },

  /// One or more interpreter smoke tests failed.
  #[error("smoke tests failed: {}", failures.join("; "))]
  SmokeTestFailed { failures: Vec<String> },

  /// The dependency graph contains a cycle.
  #[error("dependency cycle detected involving '{0}'")]
  CycleDetected(String),

  /// A dependency names a prerequisite that has no spec.
  #[error("unknown dependency '{name}' required by '{required_by}'")]
  UnknownDependency { name: String, required_by: String },

  /// A native prerequisite failed to build.
  #[error("dependency {name} failed: {source}")]
  DependencyFailed {
    name: String,
    #[source]
    source: Box<Error>,
  },

  /// No configuration with this name exists for the version.
  #[error("unknown configuration '{name}' for Python {version}")]
  UnknownConfig { version: String, name: String },

  #[error("unsupported Python version '{0}' (supported: 3.11 to 3.14)")]
  UnsupportedVersion(String),

  /// The build target is not buildable on this host.
  #[error("invalid build target: {0}")]
  InvalidTarget(String),

  /// A build step finished without producing an expected file.
  #[error("build step did not produce {}", .0.display())]
  MissingProduct(PathBuf),

  /// A reduction manifest is malformed or names unsafe paths.
  #[error("invalid reduction manifest: {0}")]
  InvalidManifest(String),

  /// A file-name glob could not be compiled.
  #[error("invalid glob pattern '{pattern}': {message}")]
  InvalidPattern { pattern: String, message: String },

  /// The pipeline tried to move between two states that are not adjacent.
  #[error("illegal pipeline transition from {from} to {to}")]
  IllegalTransition { from: String, to: String },

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// The failure class of this error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::FetchFailed { .. } | Self::DownloadIo { .. } => ErrorKind::Download,
      Self::ChecksumMismatch { .. } | Self::InvalidChecksum(_) | Self::SmokeTestFailed { .. } => {
        ErrorKind::Validation
      }
      Self::UnsafeArchiveMember { .. } | Self::CorruptArchive { .. } | Self::UnsupportedArchive(_) => {
        ErrorKind::Extraction
      }
      Self::CmdFailed { .. } | Self::CmdSpawn { .. } => ErrorKind::Command,
      Self::CycleDetected(_)
      | Self::UnknownDependency { .. }
      | Self::DependencyFailed { .. }
      | Self::UnknownConfig { .. }
      | Self::UnsupportedVersion(_)
      | Self::InvalidTarget(_)
      | Self::MissingProduct(_)
      | Self::InvalidManifest(_)
      | Self::InvalidPattern { .. }
      | Self::IllegalTransition { .. }
      | Self::Io(_)
      | Self::Json(_) => ErrorKind::Build,
    }
  }

  /// Messages of individual failing checks, empty for non-validation errors.
  pub fn failures(&self) -> &[String] {
    match self {
      Self::SmokeTestFailed { failures } => failures,
      _ => &[],
    }
  }

  pub(crate) fn corrupt(archive: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
    Self::CorruptArchive {
      archive: archive.into(),
      message: err.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_follow_failure_class() {
    let err = Error::ChecksumMismatch {
      url: "u".into(),
      expected: "a".into(),
      actual: "b".into(),
    };
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = Error::CmdFailed {
      cmd: "make".into(),
      code: Some(2),
      stderr: String::new(),
    };
    assert_eq!(err.kind(), ErrorKind::Command);

    let err = Error::UnsafeArchiveMember {
      member: "../x".into(),
      dest: PathBuf::from("/tmp"),
    };
    assert_eq!(err.kind(), ErrorKind::Extraction);
  }

  #[test]
  fn dependency_failure_is_a_build_error_that_keeps_its_source() {
    let inner = Error::CmdFailed {
      cmd: "make install_sw".into(),
      code: Some(1),
      stderr: String::new(),
    };
    let err = Error::DependencyFailed {
      name: "openssl".into(),
      source: Box::new(inner),
    };
    assert_eq!(err.kind(), ErrorKind::Build);
    assert!(err.to_string().contains("openssl"));
    assert!(err.to_string().contains("make install_sw"));
  }

  #[test]
  fn smoke_test_failures_are_listed() {
    let err = Error::SmokeTestFailed {
      failures: vec!["import _ssl failed".into(), "version mismatch".into()],
    };
    assert_eq!(err.failures().len(), 2);
    assert!(err.to_string().contains("import _ssl failed; version mismatch"));
  }
}
