//! On-disk layout of a build project.
//!
//! ```text
//! <root>/
//!   build/
//!     downloads/          # fetched archives, keyed by file name
//!     src/<name>-<ver>/   # extracted source trees
//!     install/<name>/     # dependency prefixes, default interpreter prefix
//!     cache/              # cache entries, one JSON file per fingerprint
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{Linkage, PythonVersion};
use crate::platform::Os;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
  root: PathBuf,
}

impl ProjectLayout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn build(&self) -> PathBuf {
    self.root.join("build")
  }

  pub fn downloads(&self) -> PathBuf {
    self.build().join("downloads")
  }

  pub fn src(&self) -> PathBuf {
    self.build().join("src")
  }

  pub fn install(&self) -> PathBuf {
    self.build().join("install")
  }

  pub fn cache(&self) -> PathBuf {
    self.build().join("cache")
  }

  /// Extracted source tree of `name` at `version`, e.g. `build/src/Python-3.13.11`.
  pub fn source_dir(&self, name: &str, version: &str) -> PathBuf {
    self.src().join(format!("{name}-{version}"))
  }

  /// Install prefix of a native dependency.
  ///
  /// The generated `Setup.local` refers to these as `$(srcdir)/../../install/<name>`.
  pub fn dependency_prefix(&self, name: &str) -> PathBuf {
    self.install().join(name)
  }

  /// Install directory used when a target does not name one.
  pub fn default_install_dir(&self, linkage: Linkage) -> PathBuf {
    self.install().join(format!("python-{linkage}"))
  }

  /// Create every directory of the layout.
  pub fn setup(&self) -> io::Result<()> {
    for dir in [self.downloads(), self.src(), self.install(), self.cache()] {
      fs::create_dir_all(dir)?;
    }
    Ok(())
  }
}

/// Paths inside an installed interpreter.
///
/// ```text
/// unix:      <prefix>/bin/python3  <prefix>/lib/python3.13/  <prefix>/lib/python313.zip
/// framework: <install_dir>/Python.framework/Versions/3.13/ as <prefix>
/// windows:   <prefix>/python.exe   <prefix>/Lib/             <prefix>/python313.zip
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
  pub os: Os,
  pub linkage: Linkage,
  pub version: PythonVersion,
  pub install_dir: PathBuf,
}

impl InstallLayout {
  pub fn new(os: Os, linkage: Linkage, version: PythonVersion, install_dir: impl Into<PathBuf>) -> Self {
    Self {
      os,
      linkage,
      version,
      install_dir: install_dir.into(),
    }
  }

  pub fn is_framework(&self) -> bool {
    self.linkage == Linkage::Framework
  }

  /// `--prefix` handed to configure.
  pub fn prefix(&self) -> PathBuf {
    if self.is_framework() {
      self.framework_root().join("Versions").join(self.version.short())
    } else {
      self.install_dir.clone()
    }
  }

  /// `<install_dir>/Python.framework`
  pub fn framework_root(&self) -> PathBuf {
    self.install_dir.join("Python.framework")
  }

  pub fn bin_dir(&self) -> PathBuf {
    match self.os {
      Os::Windows => self.prefix(),
      _ => self.prefix().join("bin"),
    }
  }

  pub fn executable(&self) -> PathBuf {
    match self.os {
      Os::Windows => self.prefix().join("python.exe"),
      _ => self.bin_dir().join("python3"),
    }
  }

  /// `bin/python3.13`, the real binary `python3` links to.
  pub fn versioned_executable(&self) -> PathBuf {
    match self.os {
      Os::Windows => self.executable(),
      _ => self.bin_dir().join(format!("python{}", self.version.short())),
    }
  }

  pub fn lib_dir(&self) -> PathBuf {
    self.prefix().join("lib")
  }

  pub fn include_dir(&self) -> PathBuf {
    self.prefix().join("include")
  }

  /// Pure-Python standard library.
  pub fn stdlib_dir(&self) -> PathBuf {
    match self.os {
      Os::Windows => self.prefix().join("Lib"),
      _ => self.lib_dir().join(format!("python{}", self.version.short())),
    }
  }

  /// Directory holding compiled extension modules.
  pub fn dynload_dir(&self) -> PathBuf {
    match self.os {
      Os::Windows => self.prefix(),
      _ => self.stdlib_dir().join("lib-dynload"),
    }
  }

  pub fn site_packages(&self) -> PathBuf {
    match self.os {
      Os::Windows => self.prefix().join("site-packages"),
      _ => self.stdlib_dir().join("site-packages"),
    }
  }

  /// Zipped standard library, found by the interpreter's default `sys.path`.
  pub fn stdlib_zip(&self) -> PathBuf {
    let name = format!("python{}.zip", self.version.nodot());
    match self.os {
      Os::Windows => self.prefix().join(name),
      _ => self.lib_dir().join(name),
    }
  }

  /// Interpreter library: `libpython3.13.a` for static builds, the shared library otherwise.
  pub fn libpython(&self) -> PathBuf {
    let short = self.version.short();
    match (self.os, self.linkage) {
      (Os::Windows, _) => self.prefix().join(format!("python{}.dll", self.version.nodot())),
      (_, Linkage::Framework) => self.prefix().join("Python"),
      (_, Linkage::Static) => self.lib_dir().join(format!("libpython{short}.a")),
      (os, Linkage::Shared) => self.lib_dir().join(format!("libpython{short}{}", os.dylib_suffix())),
    }
  }
}
