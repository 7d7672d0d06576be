//! Implementation of the `buildpy apply-reductions` command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use buildpy_lib::layout::InstallLayout;
use buildpy_lib::reduce::{ReductionApplier, ReductionManifest};
use buildpy_lib::report::human_bytes;
use buildpy_lib::util::fs::copy_tree;

use super::{build_target, install_layout};
use crate::TargetArgs;
use crate::output::{print_info, print_list, print_stat, print_success};

pub fn cmd_apply_reductions(project: &Path, manifest: &Path, target: &TargetArgs, copy_to: Option<&Path>) -> Result<()> {
  let manifest = ReductionManifest::load(manifest).with_context(|| format!("Failed to load {}", manifest.display()))?;
  let target = build_target(target)?;
  let mut install = install_layout(project, &target)?;
  if !install.prefix().is_dir() {
    bail!("No installed interpreter at {}", install.prefix().display());
  }

  if let Some(dest) = copy_to {
    if dest.exists() && fs::read_dir(dest)?.next().is_some() {
      bail!("{} already exists and is not empty", dest.display());
    }
    copy_tree(&install.install_dir, dest)
      .with_context(|| format!("Failed to copy {} to {}", install.install_dir.display(), dest.display()))?;
    print_info(&format!("Reducing copy at {}", dest.display()));
    install = InstallLayout::new(install.os, install.linkage, install.version, dest);
  }

  let report = ReductionApplier::new(install)
    .apply(&manifest)
    .context("Failed to apply reductions")?;

  print_success(&format!(
    "Removed {} path(s), reclaimed {}",
    report.removed.len(),
    human_bytes(report.bytes_reclaimed)
  ));
  for path in &report.removed {
    print_stat("removed", &path.display().to_string());
  }
  print_list("Already absent", &report.already_absent);
  Ok(())
}
