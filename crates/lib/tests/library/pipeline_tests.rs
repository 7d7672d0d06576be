//! End-to-end pipeline runs against local tarballs and a fake process runner.

use std::path::PathBuf;

use buildpy_lib::ErrorKind;
use buildpy_lib::config::{ConfigMatrix, Linkage};
use buildpy_lib::deps::DependencySpec;
use buildpy_lib::layout::ProjectLayout;
use buildpy_lib::pipeline::{BuildPipeline, BuildTarget, PipelineOptions, PipelineState, Stage};
use buildpy_lib::platform::Os;
use buildpy_lib::util::hash::{Checksum, ChecksumAlgorithm};
use tempfile::TempDir;

use super::common::{FakeRunner, cwd_name, file_url, installing_runner, sha256_hex, write_tar_gz};

struct Project {
  _temp: TempDir,
  layout: ProjectLayout,
  options: PipelineOptions,
  python_tarball: PathBuf,
}

fn project() -> Project {
  let temp = TempDir::new().unwrap();
  let layout = ProjectLayout::new(temp.path().join("proj"));

  let python_tarball = temp.path().join("Python-3.13.11.tar.gz");
  write_tar_gz(&python_tarball, &[("Python-3.13.11/configure", "#!/bin/sh\n")]);
  let bzip2 = temp.path().join("bzip2-1.0.8.tar.gz");
  write_tar_gz(&bzip2, &[("bzip2-1.0.8/Makefile", "all:\n")]);
  let xz = temp.path().join("xz-5.8.2.tar.gz");
  write_tar_gz(
    &xz,
    &[
      ("xz-5.8.2/configure", "#!/bin/sh\n"),
      ("xz-5.8.2/build-aux/install-sh", "#!/bin/sh\n"),
    ],
  );

  let options = PipelineOptions {
    source_url: Some(file_url(&python_tarball)),
    source_checksum: Some(Checksum::new(ChecksumAlgorithm::Sha256, sha256_hex(&python_tarball)).unwrap()),
    dependencies: vec![
      DependencySpec::new("bzip2", "1.0.8", &file_url(&bzip2)),
      DependencySpec::new("xz", "5.8.2", &file_url(&xz)),
    ],
    ..Default::default()
  };
  Project {
    _temp: temp,
    layout,
    options,
    python_tarball,
  }
}

fn runner_for(layout: &ProjectLayout) -> FakeRunner {
  installing_runner(
    layout.install(),
    layout.default_install_dir(Linkage::Static),
    "3.13.11",
  )
}

#[tokio::test]
async fn static_mid_builds_and_validates_version() {
  let p = project();
  let target = BuildTarget::new("3.13.11", "static_mid").unwrap().jobs(2);
  let matrix = ConfigMatrix::new(Os::Linux);

  let config = matrix.resolve(target.version, &target.config).unwrap();
  assert!(!config.is_enabled("_ssl"));
  assert!(!config.is_enabled("_hashlib"));

  let runner = runner_for(&p.layout);
  let mut pipeline = BuildPipeline::new(p.layout.clone(), matrix, runner, p.options.clone());
  let outcome = pipeline.run(&target).await.unwrap();

  let artifact = outcome.artifact();
  assert!(artifact.validated);
  assert_eq!(artifact.validation_messages, ["Python 3.13.11"]);
  assert_eq!(artifact.version.to_string(), "3.13.11");
  assert_eq!(pipeline.history().last(), Some(&PipelineState::Cached));

  let calls = pipeline.runner().calls();
  let first_python = calls.iter().position(|c| c.program == "./configure").unwrap();
  let last_dep = calls
    .iter()
    .rposition(|c| cwd_name(c).starts_with("bzip2-") || cwd_name(c).starts_with("xz-"))
    .unwrap();
  assert!(last_dep < first_python, "dependencies install before python is configured");
  assert!(!calls.iter().any(|c| cwd_name(c).starts_with("openssl-")));

  let install = p.layout.default_install_dir(Linkage::Static);
  assert!(install.join("lib/python313.zip").is_file());
  assert!(install.join("bin/python3").is_file());
}

#[tokio::test]
async fn wrong_checksum_fails_verification_without_extracting() {
  let mut p = project();
  p.options.source_checksum = Some(Checksum::new(ChecksumAlgorithm::Sha256, "0".repeat(64)).unwrap());
  let target = BuildTarget::new("3.13.11", "static_mid").unwrap();
  let mut pipeline = BuildPipeline::new(p.layout.clone(), ConfigMatrix::new(Os::Linux), FakeRunner::new(), p.options);

  let failure = pipeline.run(&target).await.unwrap_err();
  assert_eq!(failure.stage, Stage::Verifying);
  assert_eq!(failure.kind(), ErrorKind::Validation);
  assert_eq!(
    pipeline.history().last(),
    Some(&PipelineState::Failed {
      stage: Stage::Verifying,
      kind: ErrorKind::Validation
    })
  );
  assert!(!p.layout.source_dir("Python", "3.13.11").exists());
  assert!(pipeline.runner().calls().is_empty());
  assert!(p.python_tarball.exists());
}

#[tokio::test]
async fn rerun_of_validated_target_is_cached() {
  let p = project();
  let target = BuildTarget::new("3.13.11", "static_mid").unwrap();

  let mut first = BuildPipeline::new(
    p.layout.clone(),
    ConfigMatrix::new(Os::Linux),
    runner_for(&p.layout),
    p.options.clone(),
  );
  assert!(!first.run(&target).await.unwrap().was_cached());

  let mut second = BuildPipeline::new(
    p.layout.clone(),
    ConfigMatrix::new(Os::Linux),
    FakeRunner::new(),
    p.options.clone(),
  );
  let outcome = second.run(&target).await.unwrap();
  assert!(outcome.was_cached());
  assert!(outcome.artifact().validated);
  assert_eq!(
    second.history(),
    [PipelineState::At { stage: Stage::Pending }, PipelineState::Cached]
  );
  assert!(second.runner().calls().is_empty());
}

#[tokio::test]
async fn reset_ignores_cache() {
  let p = project();
  let target = BuildTarget::new("3.13.11", "static_mid").unwrap();
  let mut first = BuildPipeline::new(
    p.layout.clone(),
    ConfigMatrix::new(Os::Linux),
    runner_for(&p.layout),
    p.options.clone(),
  );
  first.run(&target).await.unwrap();

  let options = PipelineOptions {
    reset: true,
    ..p.options.clone()
  };
  let mut again = BuildPipeline::new(p.layout.clone(), ConfigMatrix::new(Os::Linux), runner_for(&p.layout), options);
  let outcome = again.run(&target).await.unwrap();
  assert!(!outcome.was_cached());
  assert!(again.runner().call_lines().iter().any(|l| l.starts_with("./configure")));
}

#[tokio::test]
async fn failed_smoke_test_reports_each_failure() {
  let p = project();
  let target = BuildTarget::new("3.13.11", "static_mid").unwrap();
  let runner = installing_runner(
    p.layout.install(),
    p.layout.default_install_dir(Linkage::Static),
    "3.12.0",
  );
  let mut pipeline = BuildPipeline::new(p.layout.clone(), ConfigMatrix::new(Os::Linux), runner, p.options);

  let failure = pipeline.run(&target).await.unwrap_err();
  assert_eq!(failure.stage, Stage::Validating);
  assert_eq!(failure.kind(), ErrorKind::Validation);
  assert!(failure.messages().iter().any(|m| m.contains("3.12.0")));
}
