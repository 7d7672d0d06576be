//! Planning and applying reductions for analyzed packages.

use buildpy_lib::analyze::DependencyAnalyzer;
use buildpy_lib::config::{ConfigMatrix, Linkage, PythonVersion};
use buildpy_lib::layout::InstallLayout;
use buildpy_lib::platform::Os;
use buildpy_lib::reduce::{PROTECTED_EXTENSIONS, ReductionApplier, ReductionManifest, ReductionPlanner};
use tempfile::TempDir;

use super::common::touch;

#[test]
fn json_and_re_package_reduces_shared_max() {
  let temp = TempDir::new().unwrap();
  touch(temp.path(), "site/tinyjson/__init__.py", "import json\nimport re\n");

  let analysis = DependencyAnalyzer::new().analyze(&[temp.path().join("site")]).unwrap();
  let config = ConfigMatrix::new(Os::Linux).lookup("3.13", "shared_max").unwrap();
  let manifest = ReductionPlanner.plan(&analysis, &config);

  assert!(manifest.removable_extensions.contains("_ssl"));
  assert!(manifest.removable_extensions.contains("_ctypes"));
  assert!(!manifest.removable_extensions.contains("_json"));
  for module in &manifest.protected_modules {
    assert!(!manifest.removable_extensions.contains(module), "{module}");
    assert!(!manifest.removable_stdlib_dirs.contains(module), "{module}");
  }
  for module in PROTECTED_EXTENSIONS {
    assert!(manifest.protected_modules.contains(*module));
  }
  assert_eq!(manifest.packages_analyzed, ["tinyjson"]);
  assert_eq!(manifest.python_version, "3.13.11");
}

#[test]
fn saved_manifest_applies_to_a_copy_only() {
  let temp = TempDir::new().unwrap();
  let original = temp.path().join("python");
  touch(&original, "lib/python3.13/lib-dynload/_ssl.cpython-313-x86_64-linux-gnu.so", "ssl");
  touch(&original, "lib/python3.13/lib-dynload/_json.cpython-313-x86_64-linux-gnu.so", "json");
  touch(&original, "lib/python3.13/asyncio/__init__.py", "");

  touch(temp.path(), "site/tinyjson/__init__.py", "import json\n");
  let analysis = DependencyAnalyzer::new().analyze(&[temp.path().join("site")]).unwrap();
  let config = ConfigMatrix::new(Os::Linux).lookup("3.13", "shared_max").unwrap();
  let path = temp.path().join("manifest.json");
  ReductionPlanner.plan(&analysis, &config).save(&path).unwrap();

  let copy = temp.path().join("python-reduced");
  buildpy_lib::util::fs::copy_tree(&original, &copy).unwrap();
  let version: PythonVersion = "3.13.11".parse().unwrap();
  let applier = ReductionApplier::new(InstallLayout::new(Os::Linux, Linkage::Shared, version, &copy));
  let manifest = ReductionManifest::load(&path).unwrap();
  let report = applier.apply(&manifest).unwrap();

  assert!(report.removed.iter().any(|p| p.ends_with("_ssl.cpython-313-x86_64-linux-gnu.so")));
  assert!(!copy.join("lib/python3.13/asyncio").exists());
  assert!(copy.join("lib/python3.13/lib-dynload/_json.cpython-313-x86_64-linux-gnu.so").exists());
  assert!(original.join("lib/python3.13/lib-dynload/_ssl.cpython-313-x86_64-linux-gnu.so").exists());

  let again = applier.apply(&manifest).unwrap();
  assert!(again.removed.is_empty());
}
