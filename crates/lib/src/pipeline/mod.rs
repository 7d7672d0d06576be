//! The build pipeline state machine.
//!
//! One [`BuildPipeline::run`] drives one [`BuildTarget`] through
//!
//! ```text
//! pending -> fetching -> verifying -> extracting -> configuring_deps -> building_deps
//!   -> configuring -> compiling -> installing -> post_processing -> validating -> cached
//! ```
//!
//! `pending` jumps straight to `cached` when the cache holds a validated
//! artifact for the same fingerprint. Any error ends the run in
//! `failed(stage, kind)` for the stage that was active; nothing is retried.

mod python;
mod state;
mod types;

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

pub use python::{PythonRecipe, default_source_url, normalize_config_opt};
pub use state::{PipelineState, Stage};
pub use types::{BuildArtifact, BuildOutcome, BuildTarget, PipelineFailure, PipelineOptions};

use crate::cache::{CacheManager, Fingerprint};
use crate::config::{Config, ConfigMatrix, Linkage};
use crate::deps::builder::run_steps;
use crate::deps::{DependencyBuilder, DependencyGraph, DependencySpec};
use crate::error::{Error, Result};
use crate::extract::{ExtractOptions, SafeExtractor};
use crate::fetch::{Archive, ArchiveFetcher};
use crate::layout::ProjectLayout;
use crate::platform::Os;
use crate::postprocess::PostProcessor;
use crate::process::ProcessRunner;
use crate::util::fs::remove_path;
use crate::util::hash::{Hashable, ObjectHash};
use crate::validate::BuildValidator;

/// What a run would do, computed without network access or commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
  pub target: BuildTarget,
  pub os: Os,
  pub source_url: String,
  pub source_dir: PathBuf,
  pub prefix: PathBuf,
  pub executable: PathBuf,
  pub configure_flags: Vec<String>,
  /// Dependencies in build order, as `name-version`.
  pub dependency_order: Vec<String>,
  pub dependency_waves: Vec<Vec<String>>,
  /// Dependencies already installed and recorded.
  pub dependencies_current: Vec<String>,
  pub enabled_modules: BTreeSet<String>,
  pub disabled_modules: BTreeSet<String>,
  pub fingerprint: String,
  /// Whether the run would stop at `pending -> cached`.
  pub cached: bool,
}

/// Records every state a run visits and rejects illegal moves.
#[derive(Debug)]
struct Tracker {
  history: Vec<PipelineState>,
}

impl Tracker {
  fn new() -> Self {
    Self {
      history: vec![PipelineState::START],
    }
  }

  fn current(&self) -> PipelineState {
    self.history.last().copied().unwrap_or(PipelineState::START)
  }

  fn stage(&self) -> Stage {
    match self.current() {
      PipelineState::At { stage } | PipelineState::Failed { stage, .. } => stage,
      PipelineState::Cached => Stage::Validating,
    }
  }

  fn move_to(&mut self, to: PipelineState) -> Result<()> {
    let next = self.current().advance(to)?;
    info!(stage = %next, "pipeline transition");
    self.history.push(next);
    Ok(())
  }

  fn enter(&mut self, stage: Stage) -> Result<()> {
    self.move_to(PipelineState::At { stage })
  }

  fn fail(&mut self, error: Error) -> PipelineFailure {
    let stage = self.stage();
    let failed = PipelineState::Failed {
      stage,
      kind: error.kind(),
    };
    error!(stage = %stage, kind = %error.kind().as_str(), error = %error, "pipeline failed");
    if self.current().advance(failed).is_ok() {
      self.history.push(failed);
    }
    PipelineFailure { stage, error }
  }
}

/// Everything `pending` works out before the first side effect.
struct Resolved {
  config: Config,
  order: Vec<DependencySpec>,
  graph: DependencyGraph,
  fingerprint: Fingerprint,
}

pub struct BuildPipeline<R: ProcessRunner> {
  layout: ProjectLayout,
  matrix: ConfigMatrix,
  fetcher: ArchiveFetcher,
  runner: R,
  cache: CacheManager,
  options: PipelineOptions,
  history: Vec<PipelineState>,
}

impl<R: ProcessRunner> BuildPipeline<R> {
  pub fn new(layout: ProjectLayout, matrix: ConfigMatrix, runner: R, options: PipelineOptions) -> Self {
    let cache = CacheManager::new(layout.cache());
    Self {
      layout,
      matrix,
      fetcher: ArchiveFetcher::new(),
      runner,
      cache,
      options,
      history: Vec::new(),
    }
  }

  pub fn with_fetcher(mut self, fetcher: ArchiveFetcher) -> Self {
    self.fetcher = fetcher;
    self
  }

  pub fn layout(&self) -> &ProjectLayout {
    &self.layout
  }

  pub fn options(&self) -> &PipelineOptions {
    &self.options
  }

  pub fn runner(&self) -> &R {
    &self.runner
  }

  pub fn cache(&self) -> &CacheManager {
    &self.cache
  }

  /// States visited by the last run, starting at `pending`.
  pub fn history(&self) -> &[PipelineState] {
    &self.history
  }

  /// Drive `target` to `cached` or to the first failure.
  pub async fn run(&mut self, target: &BuildTarget) -> Result<BuildOutcome, PipelineFailure> {
    info!(target = %target, "pipeline started");
    let mut tracker = Tracker::new();
    let result = self.drive(target, &mut tracker).await;
    let result = result.map_err(|error| tracker.fail(error));
    self.history = tracker.history;
    result
  }

  /// Dry run: resolve everything `run` would, without fetching or running commands.
  pub fn plan(&self, target: &BuildTarget) -> Result<BuildPlan> {
    let resolved = self.resolve(target)?;
    let recipe = PythonRecipe::new(target, &resolved.config, &self.options, &self.layout);
    let ObjectHash(fingerprint) = resolved.fingerprint.compute_hash()?;

    let dependencies_current = resolved
      .order
      .iter()
      .filter(|spec| self.dependency_builder(spec, target).is_current())
      .map(|spec| spec.name.clone())
      .collect();

    Ok(BuildPlan {
      target: target.clone(),
      os: self.matrix.os(),
      source_url: recipe.source_url(),
      source_dir: recipe.src.clone(),
      prefix: recipe.install.prefix(),
      executable: recipe.install.executable(),
      configure_flags: recipe.configure_flags(),
      dependency_order: resolved.order.iter().map(DependencySpec::label).collect(),
      dependency_waves: resolved.graph.waves(&resolved.order),
      dependencies_current,
      enabled_modules: resolved.config.enabled_modules(),
      disabled_modules: resolved.config.disabled_modules().clone(),
      fingerprint,
      cached: !self.options.reset && self.cache.should_skip(&resolved.fingerprint),
    })
  }

  /// Config lookup, target checks and dependency resolution.
  ///
  /// A dependency cycle or unknown dependency fails here, before any builder runs.
  fn resolve(&self, target: &BuildTarget) -> Result<Resolved> {
    let config = self.matrix.resolve(target.version, &target.config)?;
    if target.linkage == Linkage::Framework && self.matrix.os() != Os::MacOs {
      return Err(Error::InvalidTarget(format!(
        "{} builds require macOS, host is {}",
        config.name,
        self.matrix.os()
      )));
    }

    let graph = DependencyGraph::new(self.options.dependencies.iter().cloned())?;
    let order = graph.resolve_order(&config.required_dependencies())?;

    let recipe = PythonRecipe::new(target, &config, &self.options, &self.layout);
    let fingerprint = Fingerprint {
      version: target.version.to_string(),
      config: config.name.clone(),
      linkage: target.linkage,
      install_dir: recipe.install.install_dir.clone(),
      dependencies: order.iter().map(|s| (s.name.clone(), s.version.clone())).collect(),
    };

    Ok(Resolved {
      config,
      order,
      graph,
      fingerprint,
    })
  }

  fn dependency_builder<'a>(&'a self, spec: &'a DependencySpec, target: &BuildTarget) -> DependencyBuilder<'a, R> {
    DependencyBuilder::new(spec, &self.layout, &self.fetcher, &self.runner, &self.cache)
      .jobs(target.jobs)
      .reset(self.options.reset)
  }

  async fn drive(&self, target: &BuildTarget, tracker: &mut Tracker) -> Result<BuildOutcome> {
    let options = &self.options;
    let Resolved {
      config,
      order,
      graph,
      fingerprint,
    } = self.resolve(target)?;
    let recipe = PythonRecipe::new(target, &config, options, &self.layout);

    if !options.reset
      && let Some(entry) = self.cache.reusable(&fingerprint)
    {
      tracker.move_to(PipelineState::Cached)?;
      info!(install = ?entry.artifact.install_path, "validated build found, nothing to do");
      return Ok(BuildOutcome::Cached(entry.artifact));
    }

    if options.reset {
      info!(src = ?recipe.src, prefix = ?recipe.install.prefix(), "resetting build");
      remove_path(&recipe.src)?;
      remove_path(&recipe.install.prefix())?;
    }
    self.layout.setup()?;

    tracker.enter(Stage::Fetching)?;
    let archive = Archive::new(recipe.source_url(), &self.layout.downloads(), options.source_checksum.clone());
    let fetched = self.fetcher.fetch(&archive).await?;

    tracker.enter(Stage::Verifying)?;
    let verified = self.fetcher.verify(fetched).await?;
    if !verified.checksum_verified {
      warn!(url = %archive.url, "no checksum given, source archive is unverified");
    }

    tracker.enter(Stage::Extracting)?;
    SafeExtractor.extract(
      verified.path(),
      &recipe.src,
      ExtractOptions {
        reset: options.reset,
        strip_single_root: true,
      },
    )?;

    tracker.enter(Stage::ConfiguringDeps)?;
    let builders: Vec<_> = order.iter().map(|spec| self.dependency_builder(spec, target)).collect();
    let pending: Vec<_> = builders.iter().filter(|b| !b.is_current()).collect();
    info!(
      order = ?order.iter().map(DependencySpec::label).collect::<Vec<_>>(),
      waves = ?graph.waves(&order),
      to_build = pending.len(),
      "dependency plan"
    );

    tracker.enter(Stage::BuildingDeps)?;
    for builder in pending {
      builder.build().await?;
    }

    tracker.enter(Stage::Configuring)?;
    recipe.write_setup_local()?;
    run_steps(&self.runner, &recipe.configure()).await?;

    tracker.enter(Stage::Compiling)?;
    run_steps(&self.runner, &recipe.compile()).await?;

    tracker.enter(Stage::Installing)?;
    let install_steps = recipe.install()?;
    run_steps(&self.runner, &install_steps).await?;

    tracker.enter(Stage::PostProcessing)?;
    PostProcessor::new(&recipe.install, options, &self.runner, self.layout.build())
      .install_name_template(config.install_name())
      .run()
      .await?;

    tracker.enter(Stage::Validating)?;
    let artifact = BuildArtifact {
      install_path: recipe.install.install_dir.clone(),
      executable: recipe.install.executable(),
      version: target.version,
      config: config.name.clone(),
      linkage: target.linkage,
      validated: false,
      validation_messages: Vec::new(),
    };
    let artifact = BuildValidator::new(&self.runner, config.enabled_modules())
      .validate(artifact)
      .await?;

    if let Err(e) = self.cache.record(&fingerprint, &artifact) {
      warn!(error = %e, "failed to record cache entry, the next run will rebuild");
    }
    tracker.move_to(PipelineState::Cached)?;
    info!(install = ?artifact.install_path, executable = ?artifact.executable, "build complete");
    Ok(BuildOutcome::Built(artifact))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{FakeRunner, touch, write_tar_gz};
  use tempfile::TempDir;

  fn at(stage: Stage) -> PipelineState {
    PipelineState::At { stage }
  }

  #[test]
  fn tracker_fails_at_current_stage() {
    let mut tracker = Tracker::new();
    tracker.enter(Stage::Fetching).unwrap();
    tracker.enter(Stage::Verifying).unwrap();
    let failure = tracker.fail(Error::ChecksumMismatch {
      url: "u".into(),
      expected: "a".into(),
      actual: "b".into(),
    });
    assert_eq!(failure.stage, Stage::Verifying);
    assert_eq!(
      tracker.history.last(),
      Some(&PipelineState::Failed {
        stage: Stage::Verifying,
        kind: crate::ErrorKind::Validation
      })
    );
  }

  #[test]
  fn tracker_rejects_skipped_stage() {
    let mut tracker = Tracker::new();
    assert!(tracker.enter(Stage::Compiling).is_err());
    assert_eq!(tracker.history, vec![PipelineState::START]);
  }

  /// Project with a fake CPython tarball served from disk; no native deps.
  fn project(temp: &TempDir) -> (ProjectLayout, PipelineOptions) {
    let layout = ProjectLayout::new(temp.path().join("proj"));
    let tarball = temp.path().join("Python-3.13.11.tar.gz");
    write_tar_gz(&tarball, &[("Python-3.13.11/configure", "#!/bin/sh\n")]);
    let options = PipelineOptions {
      source_url: Some(format!("file://{}", tarball.display())),
      dependencies: Vec::new(),
      skip_ziplib: true,
      ..Default::default()
    };
    (layout, options)
  }

  fn installing_runner(prefix: PathBuf) -> FakeRunner {
    FakeRunner::new()
      .respond("--version", "Python 3.13.11")
      .on_run(move |inv| {
        if inv.program == "make" && inv.args.first().map(String::as_str) == Some("install") {
          touch(&prefix, "bin/python3", "");
          touch(&prefix, "lib/python3.13/os.py", "");
        }
      })
  }

  #[tokio::test]
  async fn static_min_without_deps_runs_every_stage() {
    let temp = TempDir::new().unwrap();
    let (layout, options) = project(&temp);
    let target = BuildTarget::new("3.13", "static_min").unwrap().jobs(2);
    let prefix = layout.default_install_dir(Linkage::Static);
    let mut pipeline = BuildPipeline::new(layout, ConfigMatrix::new(Os::Linux), installing_runner(prefix), options);

    let outcome = pipeline.run(&target).await.unwrap();
    assert!(!outcome.was_cached());
    assert!(outcome.artifact().validated);

    let mut expected: Vec<_> = Stage::ALL.iter().map(|s| at(*s)).collect();
    expected.push(PipelineState::Cached);
    assert_eq!(pipeline.history(), expected.as_slice());

    let lines = pipeline.runner().call_lines();
    assert!(lines[0].starts_with("./configure --prefix="));
    assert_eq!(lines[1], "make -j2");
    assert_eq!(lines[2], "make install");
  }

  #[tokio::test]
  async fn failed_compile_is_tagged_with_stage() {
    let temp = TempDir::new().unwrap();
    let (layout, options) = project(&temp);
    let target = BuildTarget::new("3.13", "static_min").unwrap().jobs(4);
    let runner = FakeRunner::new().fail_when("make -j4", 2);
    let mut pipeline = BuildPipeline::new(layout, ConfigMatrix::new(Os::Linux), runner, options);

    let failure = pipeline.run(&target).await.unwrap_err();
    assert_eq!(failure.stage, Stage::Compiling);
    assert_eq!(failure.kind(), crate::ErrorKind::Command);
    assert_eq!(
      pipeline.history().last(),
      Some(&PipelineState::Failed {
        stage: Stage::Compiling,
        kind: crate::ErrorKind::Command
      })
    );
  }

  #[tokio::test]
  async fn framework_on_linux_fails_in_pending() {
    let temp = TempDir::new().unwrap();
    let (layout, options) = project(&temp);
    let target = BuildTarget::new("3.13", "framework_max").unwrap();
    let mut pipeline = BuildPipeline::new(layout, ConfigMatrix::new(Os::Linux), FakeRunner::new(), options);
    let failure = pipeline.run(&target).await.unwrap_err();
    assert_eq!(failure.stage, Stage::Pending);
    assert!(matches!(failure.error, Error::InvalidTarget(_)));
    assert!(pipeline.runner().calls().is_empty());
  }

  #[test]
  fn plan_lists_dependencies_and_flags() {
    let temp = TempDir::new().unwrap();
    let layout = ProjectLayout::new(temp.path());
    let pipeline = BuildPipeline::new(
      layout,
      ConfigMatrix::new(Os::Linux),
      FakeRunner::new(),
      PipelineOptions::default(),
    );
    let target = BuildTarget::new("3.13.11", "shared_max").unwrap();
    let plan = pipeline.plan(&target).unwrap();

    assert_eq!(plan.dependency_order.len(), 3);
    assert!(plan.dependency_order.iter().any(|d| d.starts_with("openssl-")));
    assert!(plan.configure_flags.contains(&"--enable-shared".to_string()));
    assert!(plan.enabled_modules.contains("_ssl"));
    assert!(!plan.cached);
    assert!(plan.dependencies_current.is_empty());
    assert!(pipeline.runner().calls().is_empty());
    assert!(serde_json::to_string(&plan).is_ok());
  }
}
