//! Size breakdown of an installed interpreter.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::layout::InstallLayout;
use crate::platform::Os;
use crate::util::fs::dir_size;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSize {
  pub name: String,
  pub bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeReport {
  pub components: Vec<ComponentSize>,
  pub total: u64,
}

impl SizeReport {
  /// Measure each part of the tree at `install`'s prefix.
  ///
  /// Components do not overlap; `other` is whatever the named ones miss.
  pub fn collect(install: &InstallLayout) -> Self {
    let prefix = install.prefix();
    let total = dir_size(&prefix);

    let windows = install.os == Os::Windows;
    // Windows keeps extensions and executables side by side in the prefix.
    let dynload = if windows {
      top_level_files(&prefix, |name| name.ends_with(".pyd"))
    } else {
      dir_size(&install.dynload_dir())
    };
    let executables = top_level_files(&install.bin_dir(), |name| {
      if windows {
        name.ends_with(".exe")
      } else {
        name.starts_with("python")
      }
    });
    let site = dir_size(&install.site_packages());
    let zip = file_size(&install.stdlib_zip());
    let headers = dir_size(&install.include_dir());
    let stdlib = dir_size(&install.stdlib_dir()).saturating_sub(site);
    let stdlib = if install.dynload_dir().starts_with(install.stdlib_dir()) {
      stdlib.saturating_sub(dynload)
    } else {
      stdlib
    };
    let libraries = file_size(&install.libpython());

    let mut components = vec![
      ComponentSize::new("executables", executables),
      ComponentSize::new("libpython", libraries),
      ComponentSize::new("stdlib", stdlib),
      ComponentSize::new("extensions", dynload),
      ComponentSize::new("site-packages", site),
      ComponentSize::new("stdlib zip", zip),
      ComponentSize::new("headers", headers),
    ];
    let named: u64 = components.iter().map(|c| c.bytes).sum();
    components.push(ComponentSize::new("other", total.saturating_sub(named)));
    Self { components, total }
  }

  pub fn get(&self, name: &str) -> Option<u64> {
    self.components.iter().find(|c| c.name == name).map(|c| c.bytes)
  }
}

impl ComponentSize {
  fn new(name: &str, bytes: u64) -> Self {
    Self {
      name: name.to_string(),
      bytes,
    }
  }
}

fn file_size(path: &Path) -> u64 {
  fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn top_level_files(dir: &Path, keep: impl Fn(&str) -> bool) -> u64 {
  let Ok(entries) = fs::read_dir(dir) else {
    return 0;
  };
  entries
    .filter_map(|e| e.ok())
    .filter(|e| e.file_name().to_str().is_some_and(&keep))
    .filter_map(|e| fs::symlink_metadata(e.path()).ok())
    .filter(|m| m.is_file())
    .map(|m| m.len())
    .sum()
}

/// `1536` -> `1.5 KiB`
pub fn human_bytes(bytes: u64) -> String {
  const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit + 1 < UNITS.len() {
    value /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{bytes} B")
  } else {
    format!("{value:.1} {}", UNITS[unit])
  }
}

impl fmt::Display for SizeReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for c in &self.components {
      writeln!(f, "{:<14} {:>10}", c.name, human_bytes(c.bytes))?;
    }
    write!(f, "{:<14} {:>10}", "total", human_bytes(self.total))
  }
}
