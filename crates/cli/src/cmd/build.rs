//! Implementation of the `buildpy build` command.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use buildpy_lib::config::ConfigMatrix;
use buildpy_lib::layout::{InstallLayout, ProjectLayout};
use buildpy_lib::pipeline::{BuildPipeline, PipelineOptions};
use buildpy_lib::process::{SystemRunner, Verbosity};
use buildpy_lib::report::SizeReport;
use buildpy_lib::util::hash::Checksum;

use super::{build_target, runtime};
use crate::BuildArgs;
use crate::output::{format_duration, print_error, print_stat, print_success, symbols};

pub fn cmd_build(project: &Path, args: &BuildArgs, verbose: bool) -> Result<()> {
  let target = build_target(&args.target)?;
  let source_checksum = args
    .checksum
    .as_deref()
    .map(str::parse::<Checksum>)
    .transpose()
    .context("Invalid --checksum")?;

  let verbosity = if verbose { Verbosity::Verbose } else { Verbosity::Normal };
  let options = PipelineOptions {
    verbosity,
    reset: args.reset,
    precompile: args.precompile,
    optimization_level: args.optimize_bytecode,
    skip_ziplib: args.skip_ziplib,
    packages: args.packages.clone(),
    loader_dir: args.loader_dir.clone(),
    install_name: args.install_name.clone(),
    source_checksum,
    source_url: args.source_url.clone(),
    ..Default::default()
  };

  let matrix = ConfigMatrix::host()?;
  let os = matrix.os();
  let mut pipeline = BuildPipeline::new(ProjectLayout::new(project), matrix, SystemRunner::new(verbosity), options);

  let started = Instant::now();
  let result = runtime()?.block_on(pipeline.run(&target));
  let outcome = match result {
    Ok(outcome) => outcome,
    Err(failure) => {
      for message in failure.messages() {
        print_error(message);
      }
      return Err(failure).with_context(|| format!("Build of {target} failed"));
    }
  };

  let artifact = outcome.artifact();
  if outcome.was_cached() {
    print_success(&format!("{target} is up to date"));
  } else {
    print_success(&format!("Built {target} in {}", format_duration(started.elapsed())));
  }
  print_stat("Install", &artifact.install_path.display().to_string());
  print_stat(
    "Executable",
    &format!("{} {} {}", artifact.executable.display(), symbols::ARROW, artifact.version),
  );

  if args.size_report {
    let install = InstallLayout::new(os, target.linkage, target.version, &artifact.install_path);
    println!();
    println!("{}", SizeReport::collect(&install));
  }
  Ok(())
}
