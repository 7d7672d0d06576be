//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated project directory with helpers for laying out fixtures.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.root().join(relative_path)
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// `buildpy --project-dir <root>`.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("buildpy");
    cmd.arg("--project-dir").arg(self.root());
    cmd
  }

  /// A `site/` tree with one package importing `json`, `hashlib`, `sqlite3` and `requests`.
  pub fn write_site(&self) -> PathBuf {
    self.write_file(
      "site/fetcher/__init__.py",
      "import json\nfrom hashlib import sha256\nfrom .store import save\n",
    );
    self.write_file("site/fetcher/store.py", "import sqlite3\nimport requests\n");
    self.write_file("site/fetcher-1.0.dist-info/METADATA", "Name: fetcher\n");
    self.path("site")
  }

  /// Fake shared 3.13 install at the project's default location.
  pub fn write_shared_install(&self) -> PathBuf {
    let prefix = "build/install/python-shared";
    self.write_file(&format!("{prefix}/bin/python3.13"), "#!/bin/sh\n");
    self.write_file(&format!("{prefix}/lib/libpython3.13.so.1.0"), "elf");
    let dynload = format!("{prefix}/lib/python3.13/lib-dynload");
    for ext in ["_decimal", "_sqlite3", "math", "_curses"] {
      self.write_file(&format!("{dynload}/{ext}.cpython-313-x86_64-linux-gnu.so"), "so");
    }
    self.write_file(&format!("{prefix}/lib/python3.13/os.py"), "");
    self.write_file(&format!("{prefix}/lib/python3.13/tkinter/__init__.py"), "");
    self.write_file(&format!("{prefix}/lib/python3.13/json/__init__.py"), "");
    self.path(prefix)
  }
}
