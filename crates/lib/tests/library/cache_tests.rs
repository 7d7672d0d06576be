//! Build fingerprints as seen through `BuildPipeline::plan`, and cache reuse rules.

use std::collections::BTreeMap;

use buildpy_lib::cache::{CacheManager, Fingerprint};
use buildpy_lib::config::{ConfigMatrix, Linkage, PythonVersion};
use buildpy_lib::deps::DependencySpec;
use buildpy_lib::layout::ProjectLayout;
use buildpy_lib::pipeline::{BuildArtifact, BuildPipeline, BuildTarget, PipelineOptions};
use buildpy_lib::platform::Os;
use tempfile::TempDir;

use super::common::{FakeRunner, touch};

fn fingerprint_of(layout: &ProjectLayout, options: PipelineOptions, target: &BuildTarget) -> String {
  let pipeline = BuildPipeline::new(layout.clone(), ConfigMatrix::new(Os::Linux), FakeRunner::new(), options);
  pipeline.plan(target).unwrap().fingerprint
}

#[test]
fn identical_targets_share_a_fingerprint() {
  let temp = TempDir::new().unwrap();
  let layout = ProjectLayout::new(temp.path());
  let target = BuildTarget::new("3.13", "shared_mid").unwrap();

  let a = fingerprint_of(&layout, PipelineOptions::default(), &target);
  let b = fingerprint_of(&layout, PipelineOptions::default(), &target.clone().jobs(1));
  assert_eq!(a, b, "job count must not affect the fingerprint");
}

#[test]
fn fingerprint_tracks_config_install_dir_and_dependencies() {
  let temp = TempDir::new().unwrap();
  let layout = ProjectLayout::new(temp.path());
  let base = BuildTarget::new("3.13", "shared_mid").unwrap();
  let reference = fingerprint_of(&layout, PipelineOptions::default(), &base);

  let other_config = BuildTarget::new("3.13", "shared_max").unwrap();
  assert_ne!(reference, fingerprint_of(&layout, PipelineOptions::default(), &other_config));

  let other_dir = base.clone().install_dir(temp.path().join("elsewhere"));
  assert_ne!(reference, fingerprint_of(&layout, PipelineOptions::default(), &other_dir));

  let bumped: Vec<DependencySpec> = DependencySpec::defaults()
    .into_iter()
    .map(|mut spec| {
      spec.version.push_str(".1");
      spec
    })
    .collect();
  let options = PipelineOptions {
    dependencies: bumped,
    ..Default::default()
  };
  assert_ne!(reference, fingerprint_of(&layout, options, &base));
}

fn sample_fingerprint(install_dir: &std::path::Path) -> Fingerprint {
  Fingerprint {
    version: "3.13.11".into(),
    config: "static_mid".into(),
    linkage: Linkage::Static,
    install_dir: install_dir.to_path_buf(),
    dependencies: BTreeMap::from([("bzip2".to_string(), "1.0.8".to_string())]),
  }
}

fn artifact(install_dir: &std::path::Path, validated: bool) -> BuildArtifact {
  BuildArtifact {
    install_path: install_dir.to_path_buf(),
    executable: install_dir.join("bin/python3"),
    version: "3.13.11".parse::<PythonVersion>().unwrap(),
    config: "static_mid".into(),
    linkage: Linkage::Static,
    validated,
    validation_messages: Vec::new(),
  }
}

#[test]
fn only_validated_artifacts_still_on_disk_are_reused() {
  let temp = TempDir::new().unwrap();
  let cache = CacheManager::new(temp.path().join("cache"));
  let install = temp.path().join("install");
  let fingerprint = sample_fingerprint(&install);

  cache.record(&fingerprint, &artifact(&install, true)).unwrap();
  assert!(!cache.should_skip(&fingerprint), "executable is missing");

  touch(&install, "bin/python3", "");
  assert!(cache.should_skip(&fingerprint));

  cache.record(&fingerprint, &artifact(&install, false)).unwrap();
  assert!(!cache.should_skip(&fingerprint));
}

#[test]
fn changed_fingerprint_misses_the_cache() {
  let temp = TempDir::new().unwrap();
  let cache = CacheManager::new(temp.path().join("cache"));
  let install = temp.path().join("install");
  touch(&install, "bin/python3", "");
  let fingerprint = sample_fingerprint(&install);
  cache.record(&fingerprint, &artifact(&install, true)).unwrap();

  let mut changed = fingerprint.clone();
  changed.dependencies.insert("bzip2".into(), "1.0.9".into());
  assert!(!cache.should_skip(&changed));
  assert!(cache.lookup(&fingerprint).is_some());
}
