//! Rewrite library references so a shared or framework build can be moved.
//!
//! Every loader-relative reference is computed from where the referring
//! binary actually sits relative to `libpython`. When no relative path
//! exists the absolute path is used and a warning is logged.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Linkage;
use crate::deps::recipes::Step;
use crate::layout::InstallLayout;
use crate::platform::Os;
use crate::process::Invocation;
use crate::util::fs::{relative_path, to_slash};

/// Where relocation reads its overrides from.
#[derive(Debug, Clone, Default)]
pub struct RelocationSettings {
  /// Directory of the binary that will load `libpython`.
  pub loader_dir: Option<PathBuf>,
  /// Install name used verbatim.
  pub install_name: Option<String>,
  /// Template from the configuration, already filled in.
  pub template: Option<String>,
}

/// `<token>/<path from dir to target>`, or the absolute target if none exists.
pub fn loader_reference(token: &str, from_dir: &Path, target: &Path) -> String {
  match relative_path(from_dir, target) {
    Some(rel) => format!("{token}/{}", to_slash(&rel)),
    None => {
      warn!(from = ?from_dir, target = ?target, "no relative path, using absolute path");
      target.display().to_string()
    }
  }
}

/// Install name (`LC_ID_DYLIB`) for the interpreter library.
///
/// An explicit override wins. Otherwise a loader directory yields an
/// `@loader_path` reference; framework builds fall back to their template
/// and shared builds to a reference from `bin/`.
pub fn install_id(install: &InstallLayout, settings: &RelocationSettings) -> String {
  let dylib = install.libpython();
  if let Some(name) = &settings.install_name {
    return name.clone();
  }
  if let Some(loader) = &settings.loader_dir {
    return loader_reference("@loader_path", loader, &dylib);
  }
  if install.is_framework()
    && let Some(template) = &settings.template
  {
    return template.clone();
  }
  loader_reference("@loader_path", &install.bin_dir(), &dylib)
}

/// Steps that make the install relocatable; empty for static or Windows builds.
pub fn relocation_steps(install: &InstallLayout, settings: &RelocationSettings) -> Vec<Step> {
  let dylib = install.libpython();
  let dylib_arg = dylib.display().to_string();
  let exe = install.versioned_executable();

  match (install.os, install.linkage) {
    (Os::MacOs, Linkage::Shared | Linkage::Framework) => {
      let mut steps = vec![
        Step::MakeExecutable(dylib.clone()),
        Step::Run(
          Invocation::new("install_name_tool")
            .arg("-id")
            .arg(install_id(install, settings))
            .arg(&dylib_arg),
        ),
        change(&dylib, &exe),
      ];
      if install.is_framework() {
        let app = install
          .prefix()
          .join("Resources/Python.app/Contents/MacOS/Python");
        steps.push(change(&dylib, &app));
      }
      steps
    }
    (Os::Linux, Linkage::Shared) => {
      let rpath = match relative_path(&install.bin_dir(), &install.lib_dir()) {
        Some(rel) => format!("$ORIGIN/{}", to_slash(&rel)),
        None => install.lib_dir().display().to_string(),
      };
      vec![Step::Run(
        Invocation::new("patchelf")
          .arg("--set-rpath")
          .arg(rpath)
          .arg(exe.display().to_string()),
      )]
    }
    _ => Vec::new(),
  }
}

/// Point `binary` at `dylib` through `@executable_path`.
fn change(dylib: &Path, binary: &Path) -> Step {
  let dir = binary.parent().unwrap_or(Path::new("."));
  Step::Run(
    Invocation::new("install_name_tool")
      .arg("-change")
      .arg(dylib.display().to_string())
      .arg(loader_reference("@executable_path", dir, dylib))
      .arg(binary.display().to_string()),
  )
}

pub(crate) fn log_plan(install: &InstallLayout, steps: &[Step]) {
  if !steps.is_empty() {
    info!(linkage = %install.linkage, steps = steps.len(), "making install relocatable");
  }
}
