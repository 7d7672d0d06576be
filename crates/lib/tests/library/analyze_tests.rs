//! Import analysis over package trees on disk.

use buildpy_lib::analyze::{DependencyAnalyzer, scan_imports};
use tempfile::TempDir;

use super::common::touch;

#[test]
fn conditional_and_lazy_imports_count() {
  let temp = TempDir::new().unwrap();
  touch(
    temp.path(),
    "fastjson/__init__.py",
    "\"\"\"Fast JSON.\n\nimport ctypes\n\"\"\"\ntry:\n    import _json\nexcept ImportError:\n    _json = None\n\ndef dumps(obj):\n    import json; return json.dumps(obj)\n",
  );

  let result = DependencyAnalyzer::new().analyze(&[temp.path().to_path_buf()]).unwrap();
  assert_eq!(result.stdlib_imports.iter().collect::<Vec<_>>(), ["_json", "json"]);
  assert!(result.required_extensions.contains("_json"));
  assert!(!result.required_extensions.contains("_ctypes"));
  assert_eq!(result.files_analyzed, 1);
}

#[test]
fn non_utf8_sources_are_still_scanned() {
  let temp = TempDir::new().unwrap();
  let dir = temp.path().join("legacy");
  std::fs::create_dir_all(&dir).unwrap();
  std::fs::write(dir.join("__init__.py"), b"# coding: latin-1\nname = '\xe9'\nimport decimal\n").unwrap();

  let result = DependencyAnalyzer::new().analyze(&[dir]).unwrap();
  assert!(result.required_extensions.contains("_decimal"));
}

#[test]
fn scanner_handles_mixed_statements() {
  let stmts = scan_imports("import os, sys as system\nfrom .. import parent\nif True: from typing import (\n  Any,\n  List,\n)\n");
  let modules: Vec<_> = stmts.iter().map(|s| (s.module.as_str(), s.level)).collect();
  assert_eq!(modules, [("os", 0), ("sys", 0), ("", 2), ("typing", 0)]);
  assert_eq!(stmts[3].names, ["Any", "List"]);
}
