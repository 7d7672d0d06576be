//! `Python.framework` bundle links.
//!
//! ```text
//! Python.framework/
//!   Versions/3.13/     # the prefix
//!   Versions/Current   -> 3.13
//!   Python             -> Versions/Current/Python
//!   Resources          -> Versions/Current/Resources
//!   Headers            -> Versions/Current/Headers
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::layout::InstallLayout;

/// Create whichever of the bundle's top-level links are missing. Returns the links created.
pub fn ensure_layout(install: &InstallLayout) -> Result<Vec<PathBuf>> {
  let root = install.framework_root();
  let prefix = install.prefix();
  if !prefix.is_dir() {
    return Err(Error::MissingProduct(prefix));
  }

  let short = install.version.short();
  let mut links = vec![(root.join("Versions").join("Current"), PathBuf::from(&short))];
  for name in ["Python", "Resources", "Headers"] {
    links.push((root.join(name), Path::new("Versions").join("Current").join(name)));
  }

  let mut created = Vec::new();
  for (link, target) in links {
    if link.symlink_metadata().is_ok() {
      continue;
    }
    symlink(&target, &link)?;
    debug!(link = ?link, target = ?target, "created framework link");
    created.push(link);
  }
  Ok(created)
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
  std::os::unix::fs::symlink(target, link)?;
  Ok(())
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> Result<()> {
  Err(Error::InvalidTarget(format!(
    "cannot link {} to {}: framework bundles need a unix host",
    link.display(),
    target.display()
  )))
}
