//! Hashing utilities for archive verification and cache fingerprints.
//!
//! This module provides:
//! - `Checksum`: an algorithm plus expected hex digest, parsed from `"sha256:<hex>"`
//! - `hash_file()`: streaming file digest for any supported algorithm
//! - `Hashable`: truncated SHA-256 fingerprint of a serializable value

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::consts::{FINGERPRINT_LEN, HASH_BUFFER_SIZE};
use crate::error::Error;

pub type HashError = serde_json::Error;

/// A truncated hash identifying a cacheable value.
///
/// The hash is a 20-character truncated SHA-256 of the JSON-serialized struct,
/// lowercase hexadecimal, e.g. `"a1b2c3d4e5f6789012ab"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let full = format!("{:x}", hasher.finalize());
    Ok(ObjectHash(full[..FINGERPRINT_LEN].to_string()))
  }
}

/// Digest algorithms accepted for archive verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
  Sha256,
  Sha512,
  Md5,
}

impl ChecksumAlgorithm {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Sha256 => "sha256",
      Self::Sha512 => "sha512",
      Self::Md5 => "md5",
    }
  }

  /// Length of the hex-encoded digest.
  pub fn hex_len(&self) -> usize {
    match self {
      Self::Sha256 => 64,
      Self::Sha512 => 128,
      Self::Md5 => 32,
    }
  }
}

impl FromStr for ChecksumAlgorithm {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "sha256" => Ok(Self::Sha256),
      "sha512" => Ok(Self::Sha512),
      "md5" => Ok(Self::Md5),
      _ => Err(Error::InvalidChecksum(s.to_string())),
    }
  }
}

impl fmt::Display for ChecksumAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An expected digest, written as `<algorithm>:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum {
  pub algorithm: ChecksumAlgorithm,
  /// Hex digest as supplied; comparison ignores case.
  pub digest: String,
}

impl Checksum {
  pub fn new(algorithm: ChecksumAlgorithm, digest: impl Into<String>) -> Result<Self, Error> {
    let digest = digest.into();
    if digest.len() != algorithm.hex_len() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
      return Err(Error::InvalidChecksum(format!("{algorithm}:{digest}")));
    }
    Ok(Self { algorithm, digest })
  }

  /// Case-insensitive comparison against a recomputed hex digest.
  pub fn matches(&self, actual_hex: &str) -> bool {
    self.digest.eq_ignore_ascii_case(actual_hex)
  }

  /// Recompute the digest of `path` and compare.
  ///
  /// Returns the recomputed digest alongside the verdict so callers can report it.
  pub fn verify_file(&self, path: &Path) -> std::io::Result<(bool, String)> {
    let actual = hash_file(path, self.algorithm)?;
    Ok((self.matches(&actual), actual))
  }
}

impl FromStr for Checksum {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (algorithm, digest) = s.split_once(':').ok_or_else(|| Error::InvalidChecksum(s.to_string()))?;
    Checksum::new(algorithm.trim().parse()?, digest.trim())
  }
}

impl TryFrom<String> for Checksum {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Checksum> for String {
  fn from(value: Checksum) -> Self {
    value.to_string()
  }
}

impl fmt::Display for Checksum {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.algorithm, self.digest)
  }
}

/// Hash a file's contents with the given algorithm.
///
/// Returns the lowercase hex digest.
pub fn hash_file(path: &Path, algorithm: ChecksumAlgorithm) -> std::io::Result<String> {
  let file = fs::File::open(path)?;
  match algorithm {
    ChecksumAlgorithm::Sha256 => digest_reader::<Sha256>(file),
    ChecksumAlgorithm::Sha512 => digest_reader::<Sha512>(file),
    ChecksumAlgorithm::Md5 => digest_reader::<Md5>(file),
  }
}

fn digest_reader<D: Digest>(mut reader: impl Read) -> std::io::Result<String> {
  let mut hasher = D::new();
  let mut buffer = [0u8; HASH_BUFFER_SIZE];

  loop {
    let bytes_read = reader.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary bytes with SHA-256.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}
