mod analyze;
mod apply_reductions;
mod build;
mod plan;
mod reduce;
mod size_report;

use std::path::Path;

use anyhow::{Context, Result};

use buildpy_lib::config::ConfigMatrix;
use buildpy_lib::layout::{InstallLayout, ProjectLayout};
use buildpy_lib::pipeline::BuildTarget;

use crate::TargetArgs;

pub use analyze::{AnalyzeArgs, cmd_analyze};
pub use apply_reductions::cmd_apply_reductions;
pub use build::cmd_build;
pub use plan::cmd_plan;
pub use reduce::cmd_reduce;
pub use size_report::cmd_size_report;

fn build_target(args: &TargetArgs) -> Result<BuildTarget> {
  let mut target = BuildTarget::new(&args.python, &args.config)
    .with_context(|| format!("Invalid target {} {}", args.python, args.config))?
    .optimize(args.optimize)
    .debug(args.debug);
  if let Some(jobs) = args.jobs {
    target = target.jobs(jobs);
  }
  if let Some(dir) = &args.install_dir {
    target = target.install_dir(dir);
  }
  for opt in &args.cfg_opts {
    target = target.extra_config_opt(opt);
  }
  Ok(target)
}

/// Where `target` is (or would be) installed on this host.
fn install_layout(project: &Path, target: &BuildTarget) -> Result<InstallLayout> {
  let matrix = ConfigMatrix::host()?;
  let install_dir = target
    .install_dir
    .clone()
    .unwrap_or_else(|| ProjectLayout::new(project).default_install_dir(target.linkage));
  Ok(InstallLayout::new(matrix.os(), target.linkage, target.version, install_dir))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}
