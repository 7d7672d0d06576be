//! Prune the installed tree of tests, tooling and GUI modules.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::Result;
use crate::layout::InstallLayout;
use crate::platform::Os;
use crate::util::fs::{name_matcher, remove_matching, remove_path};

/// File names removed from `lib/python3.X` on unix installs.
pub const UNIX_REMOVE_PATTERNS: &[&str] = &[
  "*.exe",
  "*config-3*",
  "*tcl*",
  "*tdbc*",
  "*tk*",
  "__phello__",
  "__pycache__",
  "_codecs_*.so",
  "_test*",
  "_tk*",
  "_xx*.so",
  "distutils",
  "idlelib",
  "lib2to3",
  "libpython*",
  "LICENSE.txt",
  "pkgconfig",
  "pydoc_data",
  "site-packages",
  "test",
  "Tk*",
  "turtle*",
  "venv",
  "xx*.so",
];

/// File names removed from the whole prefix on Windows installs.
pub const WINDOWS_REMOVE_PATTERNS: &[&str] = &[
  "*.pdb",
  "*.exp",
  "_test*",
  "xx*",
  "py.exe",
  "pyw.exe",
  "pythonw.exe",
  "venvlauncher.exe",
  "venvwlauncher.exe",
  "_ctypes_test*",
  "LICENSE.txt",
  "*tcl*",
  "*tdbc*",
  "*tk*",
  "__phello__",
  "__pycache__",
  "_tk*",
  "ensurepip",
  "idlelib",
  "pydoc*",
  "test",
  "Tk*",
  "turtle*",
  "venv",
];

/// Glob patterns for `os`, with `ensurepip` added when nothing will be pip-installed.
pub fn remove_patterns(os: Os, keep_ensurepip: bool) -> Vec<&'static str> {
  match os {
    Os::Windows => WINDOWS_REMOVE_PATTERNS.to_vec(),
    _ => {
      let mut patterns = UNIX_REMOVE_PATTERNS.to_vec();
      if !keep_ensurepip {
        patterns.push("ensurepip");
      }
      patterns
    }
  }
}

/// Launcher scripts that duplicate stdlib entry points.
fn helper_executables(install: &InstallLayout) -> Vec<String> {
  let short = install.version.short();
  vec![
    "2to3".to_string(),
    "idle3".to_string(),
    format!("idle{short}"),
    "pydoc3".to_string(),
    format!("pydoc{short}"),
    format!("2to3-{short}"),
  ]
}

/// Remove pruned entries and return them.
pub fn prune(install: &InstallLayout, keep_ensurepip: bool) -> Result<Vec<PathBuf>> {
  let matcher = name_matcher(&remove_patterns(install.os, keep_ensurepip))?;
  let mut removed;

  if install.os == Os::Windows {
    let prefix = install.prefix();
    remove_path(&prefix.join("pybuilddir.txt"))?;
    removed = remove_matching(&prefix, &matcher, &[".git"])?;
  } else {
    removed = remove_matching(&install.stdlib_dir(), &matcher, &[".git"])?;
    for name in helper_executables(install) {
      let path = install.bin_dir().join(name);
      if path.symlink_metadata().is_ok() {
        remove_path(&path)?;
        removed.push(path);
      }
    }
  }

  for path in &removed {
    debug!(path = ?path, "pruned");
  }
  info!(count = removed.len(), "pruned install tree");
  Ok(removed)
}
