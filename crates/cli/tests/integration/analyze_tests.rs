//! `buildpy analyze` against package trees on disk.

use predicates::prelude::*;

use crate::common::TestEnv;

#[test]
fn analyze_reports_stdlib_extensions_and_third_party() {
  let env = TestEnv::new();
  let site = env.write_site();

  let output = env
    .cmd()
    .arg("analyze")
    .arg(&site)
    .args(["--format", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let analysis = &json["analysis"];
  assert_eq!(analysis["files_analyzed"], 2);
  assert!(analysis["graph"]["packages"]["fetcher"].is_array());

  let list = |key: &str| -> Vec<String> {
    analysis[key]
      .as_array()
      .unwrap()
      .iter()
      .map(|v| v.as_str().unwrap().to_string())
      .collect()
  };
  assert!(list("stdlib_imports").contains(&"hashlib".to_string()));
  assert!(list("required_extensions").contains(&"_sqlite3".to_string()));
  assert_eq!(list("third_party"), ["requests"]);
  assert!(json.get("comparison").is_none());
}

#[test]
fn analyze_flags_modules_the_config_disables() {
  let env = TestEnv::new();
  let site = env.write_site();

  env
    .cmd()
    .arg("analyze")
    .arg(&site)
    .args(["-c", "static_mid"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Against static_mid"))
    .stderr(predicate::str::contains("_hashlib is required but disabled"));
}

#[test]
fn analyze_missing_path_is_a_build_error() {
  let env = TestEnv::new();
  env
    .cmd()
    .arg("analyze")
    .arg(env.path("not-there"))
    .assert()
    .code(6);
}
