//! Inputs and results of a pipeline run.

use std::fmt;
use std::path::PathBuf;
use std::thread;

use serde::{Deserialize, Serialize};

use super::state::Stage;
use crate::config::{ConfigName, Linkage, PythonVersion};
use crate::deps::DependencySpec;
use crate::error::{Error, ErrorKind, Result};
use crate::process::Verbosity;
use crate::util::hash::Checksum;

/// What to build. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
  pub version: PythonVersion,
  pub config: String,
  pub linkage: Linkage,
  /// Explicit install directory; `None` uses the project default for the linkage.
  pub install_dir: Option<PathBuf>,
  pub jobs: usize,
  pub optimize: bool,
  pub debug: bool,
  pub extra_config_opts: Vec<String>,
}

impl BuildTarget {
  /// Target for `config` at `version`; the linkage comes from the config name.
  pub fn new(version: &str, config: &str) -> Result<Self> {
    let version: PythonVersion = version.parse()?;
    let name = ConfigName::parse(config, &version.to_string())?;
    Ok(Self {
      version,
      config: name.to_string(),
      linkage: name.linkage,
      install_dir: None,
      jobs: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
      optimize: false,
      debug: false,
      extra_config_opts: Vec::new(),
    })
  }

  pub fn install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.install_dir = Some(dir.into());
    self
  }

  pub fn jobs(mut self, jobs: usize) -> Self {
    self.jobs = jobs.max(1);
    self
  }

  pub fn optimize(mut self, optimize: bool) -> Self {
    self.optimize = optimize;
    self
  }

  pub fn debug(mut self, debug: bool) -> Self {
    self.debug = debug;
    self
  }

  pub fn extra_config_opt(mut self, opt: impl Into<String>) -> Self {
    self.extra_config_opts.push(opt.into());
    self
  }
}

impl fmt::Display for BuildTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Python {} ({})", self.version, self.config)
  }
}

/// How to run the pipeline, as opposed to what it builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
  pub verbosity: Verbosity,
  /// Remove extracted sources and the install prefix before running.
  pub reset: bool,
  /// Compile the stdlib to bytecode and drop the `.py` sources.
  pub precompile: bool,
  /// `compileall -o` level, -1 for the interpreter default.
  pub optimization_level: i8,
  pub skip_ziplib: bool,
  /// Packages installed with pip after the stdlib is zipped.
  pub packages: Vec<String>,
  /// Directory of the embedding binary, used to compute loader-relative install names.
  pub loader_dir: Option<PathBuf>,
  /// Install name used verbatim instead of a computed one.
  pub install_name: Option<String>,
  pub source_checksum: Option<Checksum>,
  pub source_url: Option<String>,
  pub dependencies: Vec<DependencySpec>,
}

impl Default for PipelineOptions {
  fn default() -> Self {
    Self {
      verbosity: Verbosity::Normal,
      reset: false,
      precompile: false,
      optimization_level: -1,
      skip_ziplib: false,
      packages: Vec::new(),
      loader_dir: None,
      install_name: None,
      source_checksum: None,
      source_url: None,
      dependencies: DependencySpec::defaults(),
    }
  }
}

/// An installed interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
  pub install_path: PathBuf,
  pub executable: PathBuf,
  pub version: PythonVersion,
  pub config: String,
  pub linkage: Linkage,
  /// Set only once every smoke test passed.
  pub validated: bool,
  #[serde(default)]
  pub validation_messages: Vec<String>,
}

/// Typed failure of a pipeline run: the stage it failed in and the error.
#[derive(Debug)]
pub struct PipelineFailure {
  pub stage: Stage,
  pub error: Error,
}

impl PipelineFailure {
  pub fn kind(&self) -> ErrorKind {
    self.error.kind()
  }

  /// Individual failing checks, for validation failures.
  pub fn messages(&self) -> &[String] {
    self.error.failures()
  }
}

impl fmt::Display for PipelineFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} failed during {}: {}", self.kind(), self.stage, self.error)
  }
}

impl std::error::Error for PipelineFailure {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    Some(&self.error)
  }
}

/// Successful end of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
  /// A validated artifact already existed; nothing ran.
  Cached(BuildArtifact),
  Built(BuildArtifact),
}

impl BuildOutcome {
  pub fn artifact(&self) -> &BuildArtifact {
    match self {
      Self::Cached(a) | Self::Built(a) => a,
    }
  }

  pub fn was_cached(&self) -> bool {
    matches!(self, Self::Cached(_))
  }
}
