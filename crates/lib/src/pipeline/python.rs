//! Configure, compile and install commands for the interpreter itself.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use super::types::{BuildTarget, PipelineOptions};
use crate::config::{Config, Linkage};
use crate::deps::recipes::Step;
use crate::error::{Error, Result};
use crate::layout::{InstallLayout, ProjectLayout};
use crate::platform::Os;
use crate::process::Invocation;
use crate::util::fs::{copy_tree, move_path, remove_path};

/// Release tarball on python.org for `version`.
pub fn default_source_url(version: &str) -> String {
  format!("https://www.python.org/ftp/python/{version}/Python-{version}.tar.xz")
}

pub struct PythonRecipe<'a> {
  pub target: &'a BuildTarget,
  pub config: &'a Config,
  pub options: &'a PipelineOptions,
  pub install: InstallLayout,
  pub src: PathBuf,
}

impl<'a> PythonRecipe<'a> {
  pub fn new(target: &'a BuildTarget, config: &'a Config, options: &'a PipelineOptions, project: &ProjectLayout) -> Self {
    let install_dir = target
      .install_dir
      .clone()
      .unwrap_or_else(|| project.default_install_dir(target.linkage));
    Self {
      target,
      config,
      options,
      install: InstallLayout::new(config.os, target.linkage, target.version, install_dir),
      src: project.source_dir("Python", &target.version.to_string()),
    }
  }

  pub fn source_url(&self) -> String {
    self
      .options
      .source_url
      .clone()
      .unwrap_or_else(|| default_source_url(&self.target.version.to_string()))
  }

  fn is_windows(&self) -> bool {
    self.config.os == Os::Windows
  }

  /// Configure flags: the configuration's own, then target-derived, then extras.
  pub fn configure_flags(&self) -> Vec<String> {
    let mut flags = self.config.configure_flags.clone();
    if self.target.linkage == Linkage::Framework {
      flags.push(format!("--enable-framework={}", self.install.install_dir.display()));
    }
    if self.target.optimize {
      flags.push("--enable-optimizations".to_string());
    }
    if self.target.debug {
      flags.push("--with-pydebug".to_string());
    }
    if self.options.packages.is_empty() {
      flags.push("--without-ensurepip".to_string());
    }
    for opt in &self.target.extra_config_opts {
      let opt = normalize_config_opt(opt);
      if !flags.contains(&opt) {
        flags.push(opt);
      }
    }
    flags
  }

  /// Write `Modules/Setup.local` into the source tree.
  pub fn write_setup_local(&self) -> Result<PathBuf> {
    let path = self.src.join("Modules").join("Setup.local");
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(&path, self.config.render_setup_local())?;
    debug!(path = ?path, config = %self.config.name, "wrote Setup.local");
    Ok(path)
  }

  pub fn configure(&self) -> Vec<Step> {
    if self.is_windows() {
      return Vec::new();
    }
    vec![Step::Run(
      Invocation::new("./configure")
        .arg(format!("--prefix={}", self.install.prefix().display()))
        .args(self.configure_flags())
        .cwd(&self.src),
    )]
  }

  pub fn compile(&self) -> Vec<Step> {
    if self.is_windows() {
      let configuration = if self.target.debug { "Debug" } else { "Release" };
      return vec![Step::Run(
        Invocation::new("PCbuild\\build.bat")
          .args(["-e", "--no-tkinter", "-c", configuration, "-p", "x64"])
          .cwd(&self.src),
      )];
    }
    vec![Step::Run(
      Invocation::new("make")
        .arg(format!("-j{}", self.target.jobs.max(1)))
        .cwd(&self.src),
    )]
  }

  /// Install commands. The stale prefix is removed first so a reinstall starts clean.
  pub fn install(&self) -> Result<Vec<Step>> {
    let prefix = self.install.prefix();
    remove_path(&prefix)?;
    if self.is_windows() {
      self.install_windows()?;
      return Ok(Vec::new());
    }
    Ok(vec![Step::Run(Invocation::new("make").arg("install").cwd(&self.src))])
  }

  /// Lay out the PCbuild output the way the unix install does.
  fn install_windows(&self) -> Result<()> {
    let binaries = self.src.join("PCbuild").join("amd64");
    if !binaries.is_dir() {
      return Err(Error::MissingProduct(binaries));
    }
    let prefix = self.install.prefix();
    info!(prefix = ?prefix, "installing PCbuild output");

    copy_tree(&binaries, &prefix)?;
    copy_tree(&self.src.join("Include"), &self.install.include_dir())?;
    let pyconfig = prefix.join("pyconfig.h");
    if pyconfig.exists() {
      move_path(&pyconfig, &self.install.include_dir().join("pyconfig.h"))?;
    }
    copy_tree(&self.src.join("Lib"), &self.install.stdlib_dir())?;
    let site = self.install.stdlib_dir().join("site-packages");
    if site.exists() {
      move_path(&site, &self.install.site_packages())?;
    }

    let libs = prefix.join("libs");
    fs::create_dir_all(&libs)?;
    for entry in fs::read_dir(&prefix)? {
      let path = entry?.path();
      if path.extension().is_some_and(|e| e == "lib") {
        if let Some(name) = path.file_name() {
          move_path(&path, &libs.join(name))?;
        }
      }
    }

    let nodot = self.target.version.nodot();
    let pth = format!("Lib\npython{nodot}.zip\nsite-packages\n.\n");
    fs::write(prefix.join(format!("python{nodot}._pth")), pth)?;
    Ok(())
  }
}

/// `with_lto` and `--with-lto` both become `--with-lto`.
pub fn normalize_config_opt(opt: &str) -> String {
  format!("--{}", opt.trim_start_matches('-').replace('_', "-"))
}
