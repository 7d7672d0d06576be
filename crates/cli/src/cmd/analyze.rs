//! Implementation of the `buildpy analyze` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;

use buildpy_lib::analyze::{AnalysisResult, ConfigComparison, DependencyAnalyzer, ScanScope};
use buildpy_lib::config::ConfigMatrix;
use buildpy_lib::layout::ProjectLayout;
use buildpy_lib::process::SystemRunner;

use super::runtime;
use crate::output::{OutputFormat, print_info, print_json, print_list, print_stat, print_success, print_warning};

/// Arguments of `buildpy analyze`.
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
  pub sources: Vec<PathBuf>,
  pub download: Vec<String>,
  pub python_exe: PathBuf,
  pub reachable: bool,
  pub config: Option<String>,
  pub python: String,
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
  analysis: &'a AnalysisResult,
  #[serde(skip_serializing_if = "Option::is_none")]
  comparison: Option<ConfigComparison>,
}

/// Analyze `sources` plus any packages fetched with `pip download`.
pub(super) fn analyze_sources(
  project: &Path,
  sources: &[PathBuf],
  download: &[String],
  python_exe: &Path,
  scope: ScanScope,
) -> Result<AnalysisResult> {
  let analyzer = DependencyAnalyzer::new().scope(scope);
  let mut sources = sources.to_vec();
  if !download.is_empty() {
    let dest = ProjectLayout::new(project).downloads().join("packages");
    let archives = runtime()?
      .block_on(analyzer.download(&SystemRunner::default(), python_exe, download, &dest))
      .context("Failed to download packages")?;
    sources.extend(archives);
  }
  if sources.is_empty() {
    bail!("Nothing to analyze: pass package paths or --download");
  }
  analyzer.analyze(&sources).context("Dependency analysis failed")
}

pub fn cmd_analyze(project: &Path, args: &AnalyzeArgs, format: OutputFormat) -> Result<()> {
  let scope = if args.reachable {
    ScanScope::Reachable
  } else {
    ScanScope::AllModules
  };
  let analysis = analyze_sources(project, &args.sources, &args.download, &args.python_exe, scope)?;

  let comparison = match &args.config {
    Some(name) => {
      let config = ConfigMatrix::host()?
        .lookup(&args.python, name)
        .with_context(|| format!("Unknown configuration {name}"))?;
      Some(analysis.compare(&config))
    }
    None => None,
  };

  if format.is_json() {
    return print_json(&AnalyzeOutput {
      analysis: &analysis,
      comparison,
    });
  }

  print_success(&format!(
    "Analyzed {} package(s), {} file(s)",
    analysis.graph.packages.len(),
    analysis.files_analyzed
  ));
  for (package, imports) in &analysis.graph.packages {
    print_stat(package, &format!("{} import(s)", imports.len()));
  }
  print_list("Stdlib modules", &analysis.stdlib_imports);
  print_list("Required extensions", &analysis.required_extensions);
  print_list("Third-party imports", &analysis.third_party);

  if let (Some(name), Some(comparison)) = (&args.config, comparison) {
    println!();
    print_info(&format!("Against {name}"));
    for module in &comparison.needed_but_disabled {
      print_warning(&format!("{module} is required but disabled"));
    }
    print_list("Potentially unused", &comparison.potentially_unused);
  }
  Ok(())
}
