use std::collections::BTreeSet;

use tracing::{info, warn};

use super::manifest::ReductionManifest;
use crate::analyze::AnalysisResult;
use crate::analyze::stdlib::{STDLIB_PACKAGE_DIRS, required_dirs};
use crate::config::Config;
use crate::consts::MANIFEST_VERSION;

/// Extensions `ensurepip` and the interpreter's own startup cannot run without.
pub const PROTECTED_EXTENSIONS: &[&str] = &[
  "_bisect", "_csv", "_opcode", "_posixsubprocess", "_random", "_sha2", "_sha512", "_socket", "_struct",
  "binascii", "math", "select", "zlib",
];

/// Stdlib packages `ensurepip` needs to install pip offline.
pub const PROTECTED_STDLIB_DIRS: &[&str] = &[
  "collections", "email", "encodings", "ensurepip", "html", "http", "importlib", "json", "logging",
  "pathlib", "re", "sysconfig", "tomllib", "urllib", "zipfile",
];

/// [`PROTECTED_STDLIB_DIRS`] plus every package dir they import.
pub fn protected_stdlib_dirs() -> BTreeSet<String> {
  let mut dirs = required_dirs(PROTECTED_STDLIB_DIRS.iter().copied());
  dirs.extend(PROTECTED_STDLIB_DIRS.iter().map(|d| d.to_string()));
  dirs
}

/// Everything a manifest for `config` may never list: the core section, the
/// protected extensions and the protected stdlib dirs with their dependencies.
pub fn protected_modules(config: &Config) -> BTreeSet<String> {
  config
    .modules
    .core
    .iter()
    .cloned()
    .chain(PROTECTED_EXTENSIONS.iter().map(|m| m.to_string()))
    .chain(protected_stdlib_dirs())
    .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReductionPlanner;

impl ReductionPlanner {
  /// Decide what `config`'s build can drop while `analysis`'s packages keep working.
  ///
  /// ```text
  /// removable_extensions  = enabled(config) - required(analysis) - protected
  /// removable_stdlib_dirs = package dirs - dirs reachable from stdlib imports - protected
  /// ```
  pub fn plan(&self, analysis: &AnalysisResult, config: &Config) -> ReductionManifest {
    let protected = protected_modules(config);

    let removable_extensions: BTreeSet<String> = config
      .enabled_modules()
      .into_iter()
      .filter(|m| !analysis.required_extensions.contains(m))
      .filter(|m| !protected.contains(m))
      .collect();

    let needed_dirs = required_dirs(
      analysis
        .stdlib_imports
        .iter()
        .map(String::as_str)
        .chain(PROTECTED_STDLIB_DIRS.iter().copied()),
    );
    let removable_stdlib_dirs: BTreeSet<String> = STDLIB_PACKAGE_DIRS
      .iter()
      .filter(|d| !needed_dirs.contains(**d))
      .map(|d| d.to_string())
      .filter(|d| !protected.contains(d))
      .collect();

    let mut warnings = Vec::new();
    for module in analysis.required_extensions.intersection(config.disabled_modules()) {
      let message = format!("{module} is required by the analyzed packages but disabled in {}", config.name);
      warn!(module = %module, config = %config.name, "required extension is disabled");
      warnings.push(message);
    }

    info!(
      config = %config.name,
      extensions = removable_extensions.len(),
      stdlib_dirs = removable_stdlib_dirs.len(),
      "reduction planned"
    );

    ReductionManifest {
      version: MANIFEST_VERSION.to_string(),
      python_version: config.version.to_string(),
      config: config.name.clone(),
      packages_analyzed: analysis.package_names(),
      required_extensions: analysis.required_extensions.clone(),
      removable_extensions,
      removable_stdlib_dirs,
      protected_modules: protected,
      warnings,
    }
  }
}
