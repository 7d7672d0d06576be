//! `buildpy reduce`: analysis to manifest.

use crate::common::TestEnv;

#[test]
fn reduce_writes_manifest_to_default_path() {
  let env = TestEnv::new();
  let site = env.write_site();

  env
    .cmd()
    .arg("reduce")
    .arg(&site)
    .args(["-c", "shared_max"])
    .assert()
    .success();

  let path = env.path("build/reduction-manifest.json");
  let manifest: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
  assert_eq!(manifest["version"], "1.0");
  assert_eq!(manifest["config"], "shared_max");
  assert_eq!(manifest["packages_analyzed"], serde_json::json!(["fetcher"]));

  let removable: Vec<&str> = manifest["removable_extensions"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(|v| v.as_str())
    .collect();
  assert!(!removable.contains(&"_sqlite3"));
  assert!(!removable.contains(&"_hashlib"));
  assert!(!removable.contains(&"math"));
}

#[test]
fn reduce_honours_output_path() {
  let env = TestEnv::new();
  let site = env.write_site();
  let out = env.path("out/m.json");

  env
    .cmd()
    .arg("reduce")
    .arg(&site)
    .arg("--output")
    .arg(&out)
    .assert()
    .success();
  assert!(out.is_file());
  assert!(!env.path("build/reduction-manifest.json").exists());
}
