//! Configure, compile and install commands for each native dependency.

use std::path::{Path, PathBuf};

use crate::process::Invocation;

/// Where a recipe runs and installs.
#[derive(Debug, Clone)]
pub struct RecipeContext {
  pub src: PathBuf,
  pub prefix: PathBuf,
  pub jobs: usize,
}

impl RecipeContext {
  fn make(&self) -> Invocation {
    Invocation::new("make").cwd(&self.src)
  }

  fn parallel_make(&self) -> Invocation {
    self.make().arg(format!("-j{}", self.jobs.max(1)))
  }

  fn prefix_str(&self) -> String {
    self.prefix.display().to_string()
  }
}

/// One step of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
  Run(Invocation),
  /// Set the executable bit on a file shipped without it.
  MakeExecutable(PathBuf),
}

pub trait Recipe: Send + Sync {
  fn configure(&self, _ctx: &RecipeContext) -> Vec<Step> {
    Vec::new()
  }

  fn compile(&self, ctx: &RecipeContext) -> Vec<Step>;

  fn install(&self, ctx: &RecipeContext) -> Vec<Step>;

  /// Static libraries that must exist under the prefix after install.
  fn products(&self, _prefix: &Path) -> Vec<PathBuf> {
    Vec::new()
  }
}

pub struct OpenSsl;

impl Recipe for OpenSsl {
  fn configure(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(
      Invocation::new("./config")
        .args(["no-shared", "no-tests"])
        .arg(format!("--prefix={}", ctx.prefix_str()))
        .cwd(&ctx.src),
    )]
  }

  fn compile(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(ctx.parallel_make())]
  }

  fn install(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(ctx.make().arg("install_sw"))]
  }

  fn products(&self, prefix: &Path) -> Vec<PathBuf> {
    vec![prefix.join("lib/libssl.a"), prefix.join("lib/libcrypto.a")]
  }
}

pub struct Bzip2;

impl Recipe for Bzip2 {
  fn compile(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(ctx.parallel_make().arg("CFLAGS=-fPIC"))]
  }

  fn install(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(
      ctx
        .make()
        .arg("install")
        .arg(format!("PREFIX={}", ctx.prefix_str()))
        .arg("CFLAGS=-fPIC"),
    )]
  }

  fn products(&self, prefix: &Path) -> Vec<PathBuf> {
    vec![prefix.join("lib/libbz2.a")]
  }
}

pub struct Xz;

impl Recipe for Xz {
  fn configure(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![
      Step::MakeExecutable(ctx.src.join("configure")),
      Step::MakeExecutable(ctx.src.join("build-aux/install-sh")),
      Step::Run(
        Invocation::new("/bin/sh")
          .args([
            "configure",
            "--disable-dependency-tracking",
            "--disable-xzdec",
            "--disable-lzmadec",
            "--disable-nls",
            "--enable-small",
            "--disable-shared",
          ])
          .arg(format!("--prefix={}", ctx.prefix_str()))
          .cwd(&ctx.src),
      ),
    ]
  }

  fn compile(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(ctx.parallel_make())]
  }

  fn install(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(ctx.make().arg("install"))]
  }

  fn products(&self, prefix: &Path) -> Vec<PathBuf> {
    vec![prefix.join("lib/liblzma.a")]
  }
}

/// Plain `./configure && make && make install` for specs without a dedicated recipe.
pub struct Autotools;

impl Recipe for Autotools {
  fn configure(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(
      Invocation::new("./configure")
        .arg(format!("--prefix={}", ctx.prefix_str()))
        .cwd(&ctx.src),
    )]
  }

  fn compile(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(ctx.parallel_make())]
  }

  fn install(&self, ctx: &RecipeContext) -> Vec<Step> {
    vec![Step::Run(ctx.make().arg("install"))]
  }
}

/// Recipe for the dependency called `name`.
pub fn recipe_for(name: &str) -> Box<dyn Recipe> {
  match name {
    "openssl" => Box::new(OpenSsl),
    "bzip2" => Box::new(Bzip2),
    "xz" => Box::new(Xz),
    _ => Box::new(Autotools),
  }
}
