//! Persisted reduction manifest.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "python_version": "3.13.11",
//!   "config": "shared_max",
//!   "removable_extensions": ["_ctypes", "_ssl"],
//!   "removable_stdlib_dirs": ["asyncio", "tkinter"],
//!   ...
//! }
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::plan::{PROTECTED_EXTENSIONS, protected_stdlib_dirs};
use crate::consts::MANIFEST_VERSION;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionManifest {
  #[serde(default = "default_version")]
  pub version: String,
  #[serde(default)]
  pub python_version: String,
  #[serde(default)]
  pub config: String,
  #[serde(default)]
  pub packages_analyzed: Vec<String>,
  #[serde(default)]
  pub required_extensions: BTreeSet<String>,
  pub removable_extensions: BTreeSet<String>,
  pub removable_stdlib_dirs: BTreeSet<String>,
  #[serde(default)]
  pub protected_modules: BTreeSet<String>,
  #[serde(default)]
  pub warnings: Vec<String>,
}

fn default_version() -> String {
  MANIFEST_VERSION.to_string()
}

impl ReductionManifest {
  pub fn load(path: &Path) -> Result<Self> {
    let text = fs::read_to_string(path)?;
    let manifest: Self =
      serde_json::from_str(&text).map_err(|e| Error::InvalidManifest(format!("{}: {e}", path.display())))?;
    manifest.validate()?;
    debug!(path = ?path, config = %manifest.config, "loaded reduction manifest");
    Ok(manifest)
  }

  /// Write as pretty JSON, replacing any existing file atomically.
  pub fn save(&self, path: &Path) -> Result<()> {
    let parent = path
      .parent()
      .filter(|p| !p.as_os_str().is_empty())
      .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
  }

  /// Reject entries that could name anything outside the tree being reduced.
  ///
  /// Extensions must be bare module names. Stdlib dirs must be relative paths
  /// without `..`. Neither may name a protected module, whether or not the
  /// manifest lists it under `protected_modules`.
  pub fn validate(&self) -> Result<()> {
    if self.version != MANIFEST_VERSION {
      return Err(Error::InvalidManifest(format!(
        "unsupported manifest version {} (expected {MANIFEST_VERSION})",
        self.version
      )));
    }
    for name in &self.removable_extensions {
      let bare = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
      if !bare {
        return Err(Error::InvalidManifest(format!("extension '{name}' is not a module name")));
      }
    }
    for dir in &self.removable_stdlib_dirs {
      let path = Path::new(dir);
      let safe = !dir.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
      if !safe {
        return Err(Error::InvalidManifest(format!("stdlib dir '{dir}' must be a relative path")));
      }
    }
    let always = PROTECTED_EXTENSIONS
      .iter()
      .map(|m| m.to_string())
      .chain(protected_stdlib_dirs());
    if let Some(clash) = self
      .protected_modules
      .iter()
      .cloned()
      .chain(always)
      .find(|m| self.removable_extensions.contains(m) || self.removable_stdlib_dirs.contains(m))
    {
      return Err(Error::InvalidManifest(format!("protected module '{clash}' is listed for removal")));
    }
    Ok(())
  }
}
