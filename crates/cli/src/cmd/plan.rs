//! Implementation of the `buildpy plan` command.
//!
//! Resolves the target, dependency order and cache state the way `build`
//! would, without downloading or running anything.

use std::path::Path;

use anyhow::{Context, Result};

use buildpy_lib::config::ConfigMatrix;
use buildpy_lib::layout::ProjectLayout;
use buildpy_lib::pipeline::{BuildPipeline, PipelineOptions};
use buildpy_lib::process::SystemRunner;

use super::build_target;
use crate::TargetArgs;
use crate::output::{OutputFormat, print_info, print_json, print_list, print_stat, truncate_hash};

pub fn cmd_plan(project: &Path, args: &TargetArgs, format: OutputFormat) -> Result<()> {
  let target = build_target(args)?;
  let pipeline = BuildPipeline::new(
    ProjectLayout::new(project),
    ConfigMatrix::host()?,
    SystemRunner::default(),
    PipelineOptions::default(),
  );
  let plan = pipeline
    .plan(&target)
    .with_context(|| format!("Failed to plan {target}"))?;

  if format.is_json() {
    return print_json(&plan);
  }

  print_info(&format!("Plan for {target} on {}", plan.os));
  print_stat("Fingerprint", truncate_hash(&plan.fingerprint));
  print_stat("Cached", if plan.cached { "yes" } else { "no" });
  print_stat("Source", &plan.source_url);
  print_stat("Prefix", &plan.prefix.display().to_string());
  print_stat("Configure", &plan.configure_flags.join(" "));
  if plan.dependency_order.is_empty() {
    print_stat("Dependencies", "none");
  } else {
    print_stat("Dependencies", &plan.dependency_order.join(" -> "));
    print_list("Already installed", &plan.dependencies_current);
  }
  print_stat("Enabled modules", &plan.enabled_modules.len().to_string());
  print_list("Disabled modules", &plan.disabled_modules);
  Ok(())
}
