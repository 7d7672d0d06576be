//! Finishing work between install and validation.
//!
//! Runs in a fixed order: prune, precompile, zip the stdlib, install
//! requested packages, make the install relocatable, then complete the
//! framework bundle.

pub mod bytecode;
pub mod clean;
pub mod framework;
pub mod relocate;
pub mod ziplib;

use std::path::PathBuf;

use tracing::info;

pub use relocate::RelocationSettings;
pub use ziplib::Relocation;

use crate::deps::builder::run_steps;
use crate::error::Result;
use crate::layout::InstallLayout;
use crate::pipeline::PipelineOptions;
use crate::platform::Os;
use crate::process::{Invocation, ProcessRunner};

pub struct PostProcessor<'a, R: ProcessRunner> {
  install: &'a InstallLayout,
  options: &'a PipelineOptions,
  runner: &'a R,
  work_dir: PathBuf,
  install_name_template: Option<String>,
}

impl<'a, R: ProcessRunner> PostProcessor<'a, R> {
  /// `work_dir` holds paths parked while the stdlib is zipped.
  pub fn new(install: &'a InstallLayout, options: &'a PipelineOptions, runner: &'a R, work_dir: impl Into<PathBuf>) -> Self {
    Self {
      install,
      options,
      runner,
      work_dir: work_dir.into(),
      install_name_template: None,
    }
  }

  pub fn install_name_template(mut self, template: Option<String>) -> Self {
    self.install_name_template = template;
    self
  }

  fn relocation_settings(&self) -> RelocationSettings {
    RelocationSettings {
      loader_dir: self.options.loader_dir.clone(),
      install_name: self.options.install_name.clone(),
      template: self.install_name_template.clone(),
    }
  }

  pub async fn run(&self) -> Result<()> {
    let install = self.install;
    let options = self.options;

    clean::prune(install, !options.packages.is_empty())?;

    if options.precompile {
      bytecode::precompile(
        self.runner,
        &install.executable(),
        &install.stdlib_dir(),
        options.optimization_level,
      )
      .await?;
    }

    if options.skip_ziplib {
      info!("leaving stdlib unzipped");
    } else {
      ziplib::ziplib(install, &self.work_dir)?;
    }

    if !options.packages.is_empty() {
      self.install_packages().await?;
    }

    let steps = relocate::relocation_steps(install, &self.relocation_settings());
    relocate::log_plan(install, &steps);
    run_steps(self.runner, &steps).await?;

    if install.is_framework() {
      framework::ensure_layout(install)?;
    }
    Ok(())
  }

  /// Bootstrap pip and install the requested packages into site-packages.
  async fn install_packages(&self) -> Result<()> {
    if self.install.os == Os::Windows {
      info!("package installation is not supported on windows builds, skipping");
      return Ok(());
    }
    let python = self.install.executable().display().to_string();
    info!(packages = ?self.options.packages, "installing packages");
    self
      .runner
      .run(&Invocation::new(&python).args(["-m", "ensurepip"]))
      .await?;
    self
      .runner
      .run(
        &Invocation::new(&python)
          .args(["-m", "pip", "install"])
          .args(self.options.packages.iter().cloned()),
      )
      .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Linkage;
  use crate::util::testutil::{FakeRunner, touch};
  use tempfile::TempDir;

  fn populated(os: Os, linkage: Linkage, dir: &std::path::Path) -> InstallLayout {
    let install = InstallLayout::new(os, linkage, "3.13.11".parse().unwrap(), dir);
    touch(&install.stdlib_dir(), "os.py", "");
    touch(&install.stdlib_dir(), "json/__init__.py", "");
    touch(&install.stdlib_dir(), "test/test_json.py", "");
    touch(&install.dynload_dir(), "_ssl.cpython-313-x86_64-linux-gnu.so", "");
    install
  }

  #[tokio::test]
  async fn linux_shared_full_sequence() {
    let temp = TempDir::new().unwrap();
    let install = populated(Os::Linux, Linkage::Shared, &temp.path().join("py"));
    let options = PipelineOptions {
      precompile: true,
      packages: vec!["requests".into()],
      ..Default::default()
    };
    let runner = FakeRunner::new();
    PostProcessor::new(&install, &options, &runner, temp.path().join("build"))
      .run()
      .await
      .unwrap();

    let lines = runner.call_lines();
    let exe = install.executable().display().to_string();
    assert!(lines[0].contains("-m compileall -f -b -o -1 python3.13"));
    assert_eq!(lines[1], format!("{exe} -m ensurepip"));
    assert_eq!(lines[2], format!("{exe} -m pip install requests"));
    assert!(lines[3].starts_with("patchelf --set-rpath $ORIGIN/../lib"));
    assert!(install.stdlib_zip().is_file());
    assert!(install.dynload_dir().join("_ssl.cpython-313-x86_64-linux-gnu.so").is_file());
    assert!(!install.stdlib_dir().join("test").exists());
  }

  #[tokio::test]
  async fn skip_ziplib_leaves_tree_in_place() {
    let temp = TempDir::new().unwrap();
    let install = populated(Os::Linux, Linkage::Static, temp.path());
    let options = PipelineOptions {
      skip_ziplib: true,
      ..Default::default()
    };
    let runner = FakeRunner::new();
    PostProcessor::new(&install, &options, &runner, temp.path().join("build"))
      .run()
      .await
      .unwrap();
    assert!(runner.calls().is_empty());
    assert!(install.stdlib_dir().join("json/__init__.py").is_file());
    assert!(!install.stdlib_zip().exists());
  }

  #[tokio::test]
  async fn relocation_failure_is_reported() {
    let temp = TempDir::new().unwrap();
    let install = populated(Os::Linux, Linkage::Shared, temp.path());
    let options = PipelineOptions::default();
    let runner = FakeRunner::new().fail_when("patchelf", 127);
    let err = PostProcessor::new(&install, &options, &runner, temp.path().join("build"))
      .run()
      .await
      .unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::Command);
  }
}
