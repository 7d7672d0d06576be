//! Implementation of the `buildpy reduce` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use buildpy_lib::analyze::ScanScope;
use buildpy_lib::config::ConfigMatrix;
use buildpy_lib::layout::ProjectLayout;
use buildpy_lib::reduce::ReductionPlanner;

use super::analyze::analyze_sources;
use crate::output::{print_list, print_stat, print_success, print_warning};

pub fn cmd_reduce(project: &Path, sources: &[PathBuf], config: &str, python: &str, output: Option<PathBuf>) -> Result<()> {
  let config = ConfigMatrix::host()?
    .lookup(python, config)
    .with_context(|| format!("Unknown configuration {config}"))?;
  let analysis = analyze_sources(project, sources, &[], Path::new("python3"), ScanScope::AllModules)?;
  let manifest = ReductionPlanner.plan(&analysis, &config);

  let path = output.unwrap_or_else(|| ProjectLayout::new(project).build().join("reduction-manifest.json"));
  manifest
    .save(&path)
    .with_context(|| format!("Failed to write {}", path.display()))?;

  for warning in &manifest.warnings {
    print_warning(warning);
  }
  print_success(&format!("Wrote {}", path.display()));
  print_stat("Packages", &manifest.packages_analyzed.join(", "));
  print_list("Removable extensions", &manifest.removable_extensions);
  print_list("Removable stdlib directories", &manifest.removable_stdlib_dirs);
  Ok(())
}
