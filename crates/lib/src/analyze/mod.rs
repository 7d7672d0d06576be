//! Static dependency analysis of third-party packages.
//!
//! Packages are read from disk (a `site-packages`-style directory, a single
//! package directory, a wheel or an sdist) and scanned without importing
//! anything. The result says which standard-library modules the packages use
//! and which native extensions back them, which is what the reduction planner
//! needs to decide what a build can drop.

mod imports;
pub mod stdlib;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use imports::{ImportStmt, scan_imports};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::{ExtractOptions, SafeExtractor};
use crate::process::{Invocation, ProcessRunner};

/// Directory and file names never treated as importable packages.
const SKIP_ENTRIES: &[&str] = &[
  "__pycache__", "build", "conftest", "doc", "docs", "examples", "setup", "test", "tests",
];

/// Which modules of a package are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanScope {
  /// Every module in the package tree.
  #[default]
  AllModules,
  /// Only modules reachable from the package's `__init__` through intra-package imports.
  Reachable,
}

/// Top-level modules each analyzed package imports, its own name excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportGraph {
  pub packages: BTreeMap<String, BTreeSet<String>>,
}

impl ImportGraph {
  pub fn all_imports(&self) -> BTreeSet<&str> {
    self.packages.values().flatten().map(String::as_str).collect()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
  pub graph: ImportGraph,
  pub stdlib_imports: BTreeSet<String>,
  /// Imports that are neither stdlib nor one of the analyzed packages' own modules.
  pub third_party: BTreeSet<String>,
  pub required_extensions: BTreeSet<String>,
  pub files_analyzed: usize,
}

/// How an analysis lines up with a build configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigComparison {
  /// Required by the packages but disabled in the configuration.
  pub needed_but_disabled: BTreeSet<String>,
  /// Enabled, not core, and not required by any analyzed package.
  pub potentially_unused: BTreeSet<String>,
}

impl AnalysisResult {
  pub fn package_names(&self) -> Vec<String> {
    self.graph.packages.keys().cloned().collect()
  }

  pub fn compare(&self, config: &Config) -> ConfigComparison {
    let needed_but_disabled = self
      .required_extensions
      .intersection(config.disabled_modules())
      .cloned()
      .collect();
    let potentially_unused = config
      .enabled_modules()
      .into_iter()
      .filter(|m| !self.required_extensions.contains(m) && !config.modules.core.contains(m))
      .collect();
    ConfigComparison {
      needed_but_disabled,
      potentially_unused,
    }
  }
}

/// Modules of one package keyed by dotted name.
struct PackageModules {
  name: String,
  modules: BTreeMap<String, ParsedModule>,
}

struct ParsedModule {
  is_package: bool,
  imports: Vec<ImportStmt>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyAnalyzer {
  scope: ScanScope,
}

impl DependencyAnalyzer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn scope(mut self, scope: ScanScope) -> Self {
    self.scope = scope;
    self
  }

  /// Analyze every package found in `sources`.
  ///
  /// A source is a directory or a wheel/sdist archive. A directory holding
  /// `__init__.py` is one package; any other directory is scanned like
  /// `site-packages`.
  pub fn analyze(&self, sources: &[PathBuf]) -> Result<AnalysisResult> {
    let mut packages = Vec::new();
    for source in sources {
      self.collect_source(source, &mut packages)?;
    }
    Ok(self.summarize(packages))
  }

  fn collect_source(&self, source: &Path, out: &mut Vec<PackageModules>) -> Result<()> {
    if source.is_dir() {
      if source.join("__init__.py").is_file() {
        let name = file_stem(source);
        out.push(load_package(&name, source)?);
      } else {
        collect_tree(source, out)?;
      }
      return Ok(());
    }
    if !source.is_file() {
      return Err(Error::MissingProduct(source.to_path_buf()));
    }

    let temp = TempDir::new()?;
    let dest = temp.path().join("pkg");
    let is_wheel = source.extension().is_some_and(|e| e == "whl");
    info!(archive = ?source, "unpacking package for analysis");
    SafeExtractor.extract(
      source,
      &dest,
      ExtractOptions {
        reset: true,
        strip_single_root: !is_wheel,
      },
    )?;
    let src_layout = dest.join("src");
    let root = if !is_wheel && src_layout.is_dir() { src_layout } else { dest };
    collect_tree(&root, out)
  }

  fn summarize(&self, packages: Vec<PackageModules>) -> AnalysisResult {
    let own: BTreeSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
    let mut result = AnalysisResult::default();

    for package in &packages {
      let selected = match self.scope {
        ScanScope::AllModules => package.modules.keys().cloned().collect(),
        ScanScope::Reachable => reachable(package),
      };
      let mut imports = BTreeSet::new();
      for name in &selected {
        let Some(module) = package.modules.get(name) else {
          continue;
        };
        result.files_analyzed += 1;
        for stmt in &module.imports {
          if let Some(top) = stmt.top_level()
            && top != package.name
          {
            imports.insert(top.to_string());
          }
        }
      }
      debug!(package = %package.name, modules = selected.len(), imports = imports.len(), "package scanned");
      result.graph.packages.insert(package.name.clone(), imports);
    }

    for name in result.graph.all_imports() {
      if stdlib::is_stdlib(name) {
        result.stdlib_imports.insert(name.to_string());
        result
          .required_extensions
          .extend(stdlib::extensions_for(name).into_iter().map(str::to_string));
      } else if !own.contains(name) {
        result.third_party.insert(name.to_string());
      }
    }
    info!(
      packages = result.graph.packages.len(),
      files = result.files_analyzed,
      stdlib = result.stdlib_imports.len(),
      extensions = result.required_extensions.len(),
      "analysis complete"
    );
    result
  }

  /// `python -m pip download --no-deps -d <dest> <packages>`, then the archives that landed in `dest`.
  pub async fn download<R: ProcessRunner>(
    &self,
    runner: &R,
    python: &Path,
    packages: &[String],
    dest: &Path,
  ) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dest)?;
    let invocation = Invocation::new(python.display().to_string())
      .args(["-m", "pip", "download", "--no-deps", "-d"])
      .arg(dest.display().to_string())
      .args(packages.iter().cloned());
    runner.run(&invocation).await?;

    let mut archives: Vec<PathBuf> = fs::read_dir(dest)?
      .filter_map(|e| e.ok().map(|e| e.path()))
      .filter(|p| p.is_file() && is_package_archive(p))
      .collect();
    archives.sort();
    if archives.is_empty() {
      warn!(dest = ?dest, "pip download produced no archives");
    }
    Ok(archives)
  }
}

fn is_package_archive(path: &Path) -> bool {
  let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
  [".whl", ".zip", ".tar.gz", ".tgz", ".tar.xz", ".tar"]
    .iter()
    .any(|ext| name.ends_with(ext))
}

fn file_stem(path: &Path) -> String {
  path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default()
}

/// Treat every top-level entry of `root` as a package or single-file module.
fn collect_tree(root: &Path, out: &mut Vec<PackageModules>) -> Result<()> {
  let mut entries: Vec<PathBuf> = fs::read_dir(root)?.filter_map(|e| e.ok().map(|e| e.path())).collect();
  entries.sort();
  for path in entries {
    let name = file_stem(&path);
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    if SKIP_ENTRIES.contains(&name.as_str()) || file_name.ends_with(".dist-info") || file_name.ends_with(".egg-info") {
      continue;
    }
    if path.is_dir() {
      if has_python(&path) {
        out.push(load_package(&name, &path)?);
      }
    } else if path.extension().is_some_and(|e| e == "py") {
      let mut modules = BTreeMap::new();
      modules.insert(name.clone(), parse_file(&path, false)?);
      out.push(PackageModules { name, modules });
    }
  }
  Ok(())
}

fn has_python(dir: &Path) -> bool {
  WalkDir::new(dir)
    .into_iter()
    .filter_map(|e| e.ok())
    .any(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == "py"))
}

fn load_package(name: &str, dir: &Path) -> Result<PackageModules> {
  let mut modules = BTreeMap::new();
  let walker = WalkDir::new(dir)
    .sort_by_file_name()
    .into_iter()
    .filter_entry(|e| e.file_name() != "__pycache__");
  for entry in walker {
    let entry = entry.map_err(|e| Error::Io(e.into()))?;
    let path = entry.path();
    if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != "py") {
      continue;
    }
    let Ok(rel) = path.strip_prefix(dir) else {
      continue;
    };
    let mut parts = vec![name.to_string()];
    parts.extend(rel.iter().map(|c| c.to_string_lossy().into_owned()));
    let is_package = parts.last().is_some_and(|p| p == "__init__.py");
    if is_package {
      parts.pop();
    } else if let Some(last) = parts.last_mut() {
      *last = last.trim_end_matches(".py").to_string();
    }
    modules.insert(parts.join("."), parse_file(path, is_package)?);
  }
  Ok(PackageModules {
    name: name.to_string(),
    modules,
  })
}

fn parse_file(path: &Path, is_package: bool) -> Result<ParsedModule> {
  let bytes = fs::read(path)?;
  Ok(ParsedModule {
    is_package,
    imports: scan_imports(&String::from_utf8_lossy(&bytes)),
  })
}

/// Modules reached from the package root by following intra-package imports.
fn reachable(package: &PackageModules) -> BTreeSet<String> {
  let mut seen = BTreeSet::new();
  let mut queue = vec![package.name.clone()];
  while let Some(name) = queue.pop() {
    let Some(module) = package.modules.get(&name) else {
      continue;
    };
    if !seen.insert(name.clone()) {
      continue;
    }
    for stmt in &module.imports {
      for target in internal_targets(&package.name, &name, module.is_package, stmt) {
        // Importing `a.b.c` runs `a/__init__` and `a/b/__init__` first.
        let mut prefix = String::new();
        for part in target.split('.') {
          if !prefix.is_empty() {
            prefix.push('.');
          }
          prefix.push_str(part);
          if package.modules.contains_key(&prefix) && !seen.contains(&prefix) {
            queue.push(prefix.clone());
          }
        }
      }
    }
  }
  seen
}

/// Dotted names inside `root` that `stmt` may load when executed in `current`.
fn internal_targets(root: &str, current: &str, is_package: bool, stmt: &ImportStmt) -> Vec<String> {
  let base = if stmt.is_relative() {
    let mut parts: Vec<&str> = current.split('.').collect();
    if !is_package {
      parts.pop();
    }
    for _ in 1..stmt.level {
      parts.pop();
    }
    if parts.is_empty() {
      return Vec::new();
    }
    let mut base = parts.join(".");
    if !stmt.module.is_empty() {
      base = format!("{base}.{}", stmt.module);
    }
    base
  } else if stmt.top_level() == Some(root) {
    stmt.module.clone()
  } else {
    return Vec::new();
  };

  let mut targets = vec![base.clone()];
  targets.extend(stmt.names.iter().filter(|n| *n != "*").map(|n| format!("{base}.{n}")));
  targets
}
