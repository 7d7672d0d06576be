//! Build cache.
//!
//! One JSON entry per fingerprint under `build/cache/`, plus one entry per
//! installed native dependency under `build/cache/deps/`.
//!
//! ```text
//! cache/
//! ├── <fingerprint>.json     # CacheEntry
//! └── deps/<name>.json       # DependencyEntry
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Linkage;
use crate::consts::CACHE_ENTRY_VERSION;
use crate::deps::DependencySpec;
use crate::error::Result;
use crate::pipeline::BuildArtifact;
use crate::util::hash::{Hashable, ObjectHash};

const DEPS_DIR: &str = "deps";

/// Every input that determines whether a previous build can be reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
  pub version: String,
  pub config: String,
  pub linkage: Linkage,
  pub install_dir: PathBuf,
  /// Resolved dependency name to version.
  pub dependencies: BTreeMap<String, String>,
}

impl Hashable for Fingerprint {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub format: u32,
  pub fingerprint: Fingerprint,
  pub artifact: BuildArtifact,
}

/// Record of an installed native dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
  pub format: u32,
  pub name: String,
  pub version: String,
  pub prefix: PathBuf,
  pub products: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CacheManager {
  dir: PathBuf,
}

impl CacheManager {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn entry_path(&self, fingerprint: &Fingerprint) -> Result<PathBuf> {
    let ObjectHash(hash) = fingerprint.compute_hash()?;
    Ok(self.dir.join(format!("{hash}.json")))
  }

  fn dependency_path(&self, name: &str) -> PathBuf {
    self.dir.join(DEPS_DIR).join(format!("{name}.json"))
  }

  /// The recorded entry for `fingerprint`, if one exists and parses.
  pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
    let path = self.entry_path(fingerprint).ok()?;
    let entry: CacheEntry = read_json(&path)?;
    (entry.format == CACHE_ENTRY_VERSION).then_some(entry)
  }

  /// Whether a build for `fingerprint` can be skipped.
  ///
  /// True only if an entry with exactly this fingerprint was recorded, the
  /// artifact it names was validated, and its install path and executable
  /// are still on disk. Reads only.
  pub fn should_skip(&self, fingerprint: &Fingerprint) -> bool {
    self.reusable(fingerprint).is_some()
  }

  /// The entry behind a positive [`CacheManager::should_skip`].
  pub fn reusable(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
    let Some(entry) = self.lookup(fingerprint) else {
      debug!(config = %fingerprint.config, "no cache entry");
      return None;
    };
    let artifact = &entry.artifact;
    let reusable = entry.fingerprint == *fingerprint
      && artifact.validated
      && artifact.install_path.is_dir()
      && artifact.executable.is_file();
    debug!(
      config = %fingerprint.config,
      validated = artifact.validated,
      reusable,
      "checked cache entry"
    );
    reusable.then_some(entry)
  }

  /// Record a validated artifact under `fingerprint`.
  pub fn record(&self, fingerprint: &Fingerprint, artifact: &BuildArtifact) -> Result<PathBuf> {
    let entry = CacheEntry {
      format: CACHE_ENTRY_VERSION,
      fingerprint: fingerprint.clone(),
      artifact: artifact.clone(),
    };
    let path = self.entry_path(fingerprint)?;
    write_json(&path, &entry)?;
    Ok(path)
  }

  /// Whether `spec` is installed at `prefix` with all of `products` present.
  pub fn dependency_is_current(&self, spec: &DependencySpec, prefix: &Path, products: &[PathBuf]) -> bool {
    let Some(entry) = read_json::<DependencyEntry>(&self.dependency_path(&spec.name)) else {
      return false;
    };
    entry.format == CACHE_ENTRY_VERSION
      && entry.version == spec.version
      && entry.prefix == prefix
      && products.iter().all(|p| p.is_file())
  }

  pub fn record_dependency(&self, spec: &DependencySpec, prefix: &Path, products: &[PathBuf]) -> Result<()> {
    let entry = DependencyEntry {
      format: CACHE_ENTRY_VERSION,
      name: spec.name.clone(),
      version: spec.version.clone(),
      prefix: prefix.to_path_buf(),
      products: products.to_vec(),
    };
    write_json(&self.dependency_path(&spec.name), &entry)
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
    Err(e) => {
      warn!(path = ?path, error = %e, "unreadable cache entry");
      return None;
    }
  };
  match serde_json::from_str(&content) {
    Ok(value) => Some(value),
    Err(e) => {
      warn!(path = ?path, error = %e, "corrupt cache entry ignored");
      None
    }
  }
}

/// Write to a sibling temp file, then rename over the target.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let temp = path.with_extension("json.tmp");
  fs::write(&temp, serde_json::to_string_pretty(value)?)?;
  fs::rename(&temp, path)?;
  Ok(())
}
