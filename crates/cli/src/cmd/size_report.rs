//! Implementation of the `buildpy size-report` command.

use std::path::Path;

use anyhow::{Result, bail};

use buildpy_lib::report::SizeReport;

use super::{build_target, install_layout};
use crate::TargetArgs;
use crate::output::{OutputFormat, print_json};

pub fn cmd_size_report(project: &Path, args: &TargetArgs, format: OutputFormat) -> Result<()> {
  let target = build_target(args)?;
  let install = install_layout(project, &target)?;
  if !install.prefix().is_dir() {
    bail!("No installed interpreter at {}", install.prefix().display());
  }

  let report = SizeReport::collect(&install);
  if format.is_json() {
    print_json(&report)
  } else {
    println!("{report}");
    Ok(())
  }
}
