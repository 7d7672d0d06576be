//! Fetch, extract and install one native dependency.

use std::path::PathBuf;

use tracing::{info, warn};

use super::DependencySpec;
use super::recipes::{Recipe, RecipeContext, Step, recipe_for};
use crate::cache::CacheManager;
use crate::error::{Error, Result};
use crate::extract::{ExtractOptions, SafeExtractor};
use crate::fetch::{Archive, ArchiveFetcher};
use crate::layout::ProjectLayout;
use crate::process::ProcessRunner;

/// What [`DependencyBuilder::build`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
  /// Installed and recorded by an earlier run.
  Current,
  Built,
}

pub struct DependencyBuilder<'a, R: ProcessRunner> {
  spec: &'a DependencySpec,
  recipe: Box<dyn Recipe>,
  layout: &'a ProjectLayout,
  fetcher: &'a ArchiveFetcher,
  runner: &'a R,
  cache: &'a CacheManager,
  jobs: usize,
  reset: bool,
}

impl<'a, R: ProcessRunner> DependencyBuilder<'a, R> {
  pub fn new(
    spec: &'a DependencySpec,
    layout: &'a ProjectLayout,
    fetcher: &'a ArchiveFetcher,
    runner: &'a R,
    cache: &'a CacheManager,
  ) -> Self {
    Self {
      spec,
      recipe: recipe_for(&spec.name),
      layout,
      fetcher,
      runner,
      cache,
      jobs: 1,
      reset: false,
    }
  }

  pub fn jobs(mut self, jobs: usize) -> Self {
    self.jobs = jobs;
    self
  }

  pub fn reset(mut self, reset: bool) -> Self {
    self.reset = reset;
    self
  }

  pub fn prefix(&self) -> PathBuf {
    self.layout.dependency_prefix(&self.spec.name)
  }

  pub fn products(&self) -> Vec<PathBuf> {
    self.recipe.products(&self.prefix())
  }

  /// Installed, recorded and all library products present.
  pub fn is_current(&self) -> bool {
    !self.reset && self.cache.dependency_is_current(self.spec, &self.prefix(), &self.products())
  }

  /// Build and install unless already current.
  ///
  /// Any failure is reported as [`Error::DependencyFailed`] naming this dependency.
  pub async fn build(&self) -> Result<DependencyStatus> {
    if self.is_current() {
      info!(dependency = %self.spec.name, version = %self.spec.version, "dependency up to date");
      return Ok(DependencyStatus::Current);
    }
    self.build_inner().await.map_err(|source| Error::DependencyFailed {
      name: self.spec.name.clone(),
      source: Box::new(source),
    })?;
    Ok(DependencyStatus::Built)
  }

  async fn build_inner(&self) -> Result<()> {
    let spec = self.spec;
    info!(dependency = %spec.name, version = %spec.version, "building dependency");

    let archive = Archive::new(&spec.source_url, &self.layout.downloads(), spec.checksum.clone());
    let verified = self.fetcher.fetch_verified(&archive).await?;

    let src = self.layout.source_dir(&spec.name, &spec.version);
    SafeExtractor.extract(
      verified.path(),
      &src,
      ExtractOptions {
        reset: self.reset,
        strip_single_root: true,
      },
    )?;

    let ctx = RecipeContext {
      src,
      prefix: self.prefix(),
      jobs: self.jobs,
    };
    run_steps(self.runner, &self.recipe.configure(&ctx)).await?;
    run_steps(self.runner, &self.recipe.compile(&ctx)).await?;
    run_steps(self.runner, &self.recipe.install(&ctx)).await?;

    let products = self.products();
    if let Some(missing) = products.iter().find(|p| !p.is_file()) {
      return Err(Error::MissingProduct(missing.clone()));
    }
    if let Err(e) = self.cache.record_dependency(spec, &ctx.prefix, &products) {
      warn!(dependency = %spec.name, error = %e, "failed to record dependency");
    }
    info!(dependency = %spec.name, prefix = ?ctx.prefix, "dependency installed");
    Ok(())
  }
}

/// Run recipe steps in order, stopping at the first failure.
pub(crate) async fn run_steps<R: ProcessRunner>(runner: &R, steps: &[Step]) -> Result<()> {
  for step in steps {
    match step {
      Step::Run(invocation) => {
        runner.run(invocation).await?;
      }
      Step::MakeExecutable(path) => make_executable(path)?,
    }
  }
  Ok(())
}

#[cfg(unix)]
fn make_executable(path: &std::path::Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
  Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &std::path::Path) -> Result<()> {
  Ok(())
}
