//! `buildpy apply-reductions` and `size-report` on a fake install tree.

#![cfg(unix)]

use predicates::prelude::*;

use crate::common::TestEnv;

const MANIFEST: &str = r#"{
  "version": "1.0",
  "config": "shared_mid",
  "removable_extensions": ["_decimal", "_curses"],
  "removable_stdlib_dirs": ["tkinter"]
}"#;

#[test]
fn apply_removes_listed_modules_and_is_idempotent() {
  let env = TestEnv::new();
  let prefix = env.write_shared_install();
  let manifest = env.write_file("manifest.json", MANIFEST);
  let dynload = prefix.join("lib/python3.13/lib-dynload");

  env
    .cmd()
    .arg("apply-reductions")
    .arg(&manifest)
    .args(["-c", "shared_mid"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed 3 path(s)"));

  assert!(!dynload.join("_decimal.cpython-313-x86_64-linux-gnu.so").exists());
  assert!(!dynload.join("_curses.cpython-313-x86_64-linux-gnu.so").exists());
  assert!(dynload.join("math.cpython-313-x86_64-linux-gnu.so").exists());
  assert!(!prefix.join("lib/python3.13/tkinter").exists());
  assert!(prefix.join("lib/python3.13/json/__init__.py").exists());

  env
    .cmd()
    .arg("apply-reductions")
    .arg(&manifest)
    .args(["-c", "shared_mid"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed 0 path(s)"));
}

#[test]
fn apply_to_copy_leaves_original_intact() {
  let env = TestEnv::new();
  let prefix = env.write_shared_install();
  let manifest = env.write_file("manifest.json", MANIFEST);
  let copy = env.path("reduced");

  env
    .cmd()
    .arg("apply-reductions")
    .arg(&manifest)
    .args(["-c", "shared_mid", "--copy-to"])
    .arg(&copy)
    .assert()
    .success();

  assert!(prefix.join("lib/python3.13/tkinter/__init__.py").exists());
  assert!(copy.join("lib/python3.13/os.py").exists());
  assert!(!copy.join("lib/python3.13/tkinter").exists());
}

#[test]
fn protected_module_in_manifest_is_rejected_before_deleting() {
  let env = TestEnv::new();
  let prefix = env.write_shared_install();
  let manifest = env.write_file(
    "manifest.json",
    r#"{"removable_extensions": ["_decimal", "math"], "removable_stdlib_dirs": []}"#,
  );

  env
    .cmd()
    .arg("apply-reductions")
    .arg(&manifest)
    .args(["-c", "shared_mid"])
    .assert()
    .code(6);
  assert!(prefix.join("lib/python3.13/lib-dynload/_decimal.cpython-313-x86_64-linux-gnu.so").exists());
}

#[test]
fn traversal_in_manifest_is_rejected() {
  let env = TestEnv::new();
  env.write_shared_install();
  let manifest = env.write_file(
    "manifest.json",
    r#"{"removable_extensions": [], "removable_stdlib_dirs": ["../../../../etc"]}"#,
  );

  env
    .cmd()
    .arg("apply-reductions")
    .arg(&manifest)
    .args(["-c", "shared_mid"])
    .assert()
    .code(6);
}

#[test]
fn size_report_breaks_down_install() {
  let env = TestEnv::new();
  env.write_shared_install();

  let output = env
    .cmd()
    .args(["size-report", "-c", "shared_mid", "--format", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert!(report["total"].as_u64().unwrap() > 0);
  let names: Vec<&str> = report["components"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(|c| c["name"].as_str())
    .collect();
  assert!(names.contains(&"extensions"));
  assert!(names.contains(&"libpython"));
}
