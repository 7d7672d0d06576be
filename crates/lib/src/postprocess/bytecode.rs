//! Stdlib precompilation.

use std::path::Path;

use tracing::info;
use walkdir::WalkDir;

use crate::error::Result;
use crate::process::{Invocation, ProcessRunner};
use crate::util::fs::remove_path;

/// `compileall` invocation writing legacy `.pyc` files beside their sources.
pub fn compileall(executable: &Path, stdlib: &Path, optimization_level: i8) -> Invocation {
  let dir_name = stdlib
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| stdlib.display().to_string());
  let mut invocation = Invocation::new(executable.display().to_string())
    .args(["-m", "compileall", "-f", "-b", "-o"])
    .arg(optimization_level.to_string())
    .arg(dir_name);
  if let Some(parent) = stdlib.parent() {
    invocation = invocation.cwd(parent);
  }
  invocation
}

/// Compile every module under `stdlib` to bytecode, then drop the `.py` sources.
pub async fn precompile<R: ProcessRunner>(
  runner: &R,
  executable: &Path,
  stdlib: &Path,
  optimization_level: i8,
) -> Result<usize> {
  runner.run(&compileall(executable, stdlib, optimization_level)).await?;

  let sources: Vec<_> = WalkDir::new(stdlib)
    .into_iter()
    .filter_map(std::result::Result::ok)
    .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == "py"))
    .map(|e| e.into_path())
    .collect();
  for source in &sources {
    remove_path(source)?;
  }
  info!(removed = sources.len(), level = optimization_level, "precompiled stdlib");
  Ok(sources.len())
}
