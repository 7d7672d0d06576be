use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::manifest::ReductionManifest;
use crate::error::Result;
use crate::layout::InstallLayout;
use crate::util::fs::{dir_size, name_matcher, remove_path};

/// What one [`ReductionApplier::apply`] call deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionReport {
  pub removed: Vec<PathBuf>,
  pub bytes_reclaimed: u64,
  /// Manifest entries with nothing left to delete.
  pub already_absent: Vec<String>,
}

/// Deletes what a manifest lists from an installed interpreter.
///
/// Applying the same manifest twice is a no-op the second time. Reducing a
/// copy instead of the original is up to the caller: copy the tree first and
/// point the applier at the copy.
pub struct ReductionApplier {
  install: InstallLayout,
}

impl ReductionApplier {
  pub fn new(install: InstallLayout) -> Self {
    Self { install }
  }

  pub fn apply(&self, manifest: &ReductionManifest) -> Result<ReductionReport> {
    manifest.validate()?;
    let mut report = ReductionReport::default();

    self.remove_extensions(manifest, &mut report)?;
    self.remove_stdlib_dirs(manifest, &mut report)?;

    info!(
      removed = report.removed.len(),
      bytes = report.bytes_reclaimed,
      prefix = ?self.install.prefix(),
      "reductions applied"
    );
    Ok(report)
  }

  fn remove_extensions(&self, manifest: &ReductionManifest, report: &mut ReductionReport) -> Result<()> {
    let dynload = self.install.dynload_dir();
    let files: Vec<PathBuf> = match fs::read_dir(&dynload) {
      Ok(entries) => {
        let mut files: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        files.sort();
        files
      }
      Err(_) => {
        debug!(dir = ?dynload, "no extension directory");
        Vec::new()
      }
    };

    for module in &manifest.removable_extensions {
      let matcher = name_matcher(&self.install.os.extension_patterns(module))?;
      let matched: Vec<&PathBuf> = files
        .iter()
        .filter(|p| p.is_file() && p.file_name().is_some_and(|n| matcher.is_match(n)))
        .collect();
      if matched.is_empty() {
        report.already_absent.push(module.clone());
        continue;
      }
      for path in matched {
        report.bytes_reclaimed += dir_size(path);
        remove_path(path)?;
        debug!(path = ?path, module = %module, "removed extension");
        report.removed.push(path.clone());
      }
    }
    Ok(())
  }

  fn remove_stdlib_dirs(&self, manifest: &ReductionManifest, report: &mut ReductionReport) -> Result<()> {
    if manifest.removable_stdlib_dirs.is_empty() {
      return Ok(());
    }
    let stdlib = self.install.stdlib_dir();
    if !stdlib.is_dir() {
      if self.install.stdlib_zip().is_file() {
        warn!(zip = ?self.install.stdlib_zip(), "stdlib is zipped; directory reductions skipped");
      }
      report
        .already_absent
        .extend(manifest.removable_stdlib_dirs.iter().cloned());
      return Ok(());
    }

    for dir in &manifest.removable_stdlib_dirs {
      let path = stdlib.join(dir);
      if !path.exists() {
        report.already_absent.push(dir.clone());
        continue;
      }
      report.bytes_reclaimed += dir_size(&path);
      remove_path(&path)?;
      debug!(path = ?path, "removed stdlib package");
      report.removed.push(path);
    }
    Ok(())
  }
}
