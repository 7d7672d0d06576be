//! Smoke tests for a freshly built interpreter.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::config::PythonVersion;
use crate::error::{Error, Result};
use crate::pipeline::BuildArtifact;
use crate::process::{Invocation, ProcessRunner};

/// Modules every working interpreter must import, checked one at a time.
pub const CORE_IMPORTS: &[&str] = &["sys", "os", "io", "codecs", "encodings", "zipimport"];

/// Outcome of the smoke-test battery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
  pub version_output: Option<String>,
  /// Failing checks in the order they ran.
  pub failures: Vec<String>,
}

impl ValidationReport {
  pub fn passed(&self) -> bool {
    self.failures.is_empty()
  }
}

pub struct BuildValidator<'a, R: ProcessRunner> {
  runner: &'a R,
  modules: BTreeSet<String>,
}

impl<'a, R: ProcessRunner> BuildValidator<'a, R> {
  /// Validator that also imports each of `modules`.
  pub fn new(runner: &'a R, modules: BTreeSet<String>) -> Self {
    Self { runner, modules }
  }

  /// Run every check and collect failures without stopping early.
  pub async fn check(&self, artifact: &BuildArtifact) -> ValidationReport {
    let mut report = ValidationReport::default();
    let exe = &artifact.executable;
    if !exe.is_file() {
      report.failures.push(format!("executable not found: {}", exe.display()));
      return report;
    }
    let python = exe.display().to_string();

    match self.runner.run(&Invocation::new(&python).arg("--version")).await {
      Ok(output) => {
        let reported = if output.stdout.is_empty() { output.stderr } else { output.stdout };
        let reported = reported.trim().to_string();
        if let Some(message) = version_mismatch(&reported, &artifact.version) {
          report.failures.push(message);
        }
        report.version_output = Some(reported);
      }
      Err(e) => report.failures.push(format!("version check failed: {e}")),
    }

    for module in CORE_IMPORTS {
      let check = Invocation::new(&python).arg("-c").arg(format!("import {module}"));
      if let Err(e) = self.runner.run(&check).await {
        report.failures.push(format!("import {module} failed: {e}"));
      }
    }

    if !self.modules.is_empty() {
      let script = import_script(&self.modules);
      match self.runner.run(&Invocation::new(&python).arg("-c").arg(script)).await {
        Ok(output) => report.failures.extend(import_failures(&self.modules, &output.stdout)),
        Err(e) => report.failures.push(format!("module import check failed: {e}")),
      }
    }
    report
  }

  /// Mark `artifact` validated if every check passes.
  ///
  /// Failures come back as [`Error::SmokeTestFailed`]; the artifact on disk is untouched.
  pub async fn validate(&self, mut artifact: BuildArtifact) -> Result<BuildArtifact> {
    let report = self.check(&artifact).await;
    if !report.passed() {
      for failure in &report.failures {
        warn!(check = %failure, "smoke test failed");
      }
      return Err(Error::SmokeTestFailed {
        failures: report.failures,
      });
    }
    info!(
      version = report.version_output.as_deref().unwrap_or_default(),
      modules = self.modules.len(),
      "interpreter validated"
    );
    artifact.validated = true;
    artifact.validation_messages = report.version_output.into_iter().collect();
    Ok(artifact)
  }
}

fn version_mismatch(reported: &str, expected: &PythonVersion) -> Option<String> {
  let wanted = format!("Python {expected}");
  (reported != wanted).then(|| format!("version mismatch: expected '{wanted}', got '{reported}'"))
}

/// Script that imports each module and prints `ok:<name>` or `fail:<name>:<error>`.
pub fn import_script(modules: &BTreeSet<String>) -> String {
  let names = modules
    .iter()
    .map(|m| format!("{m:?}"))
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "import importlib\n\
     for name in [{names}]:\n\
     \x20   try:\n\
     \x20       importlib.import_module(name)\n\
     \x20       print('ok:' + name)\n\
     \x20   except Exception as e:\n\
     \x20       print('fail:' + name + ':' + type(e).__name__ + ': ' + str(e))\n"
  )
}

/// Failures reported by the import script, then every expected module it never reported on.
fn import_failures(expected: &BTreeSet<String>, stdout: &str) -> Vec<String> {
  let mut reported = BTreeSet::new();
  let mut failures = Vec::new();
  for line in stdout.lines().map(str::trim) {
    if let Some(name) = line.strip_prefix("ok:") {
      reported.insert(name.to_string());
    } else if let Some(rest) = line.strip_prefix("fail:") {
      let (name, message) = match rest.split_once(':') {
        Some((name, err)) => (name, format!("import {name} failed: {}", err.trim())),
        None => (rest, format!("import {rest} failed")),
      };
      reported.insert(name.to_string());
      failures.push(message);
    }
  }
  failures.extend(
    expected
      .iter()
      .filter(|m| !reported.contains(*m))
      .map(|m| format!("import {m} failed: no result reported")),
  );
  failures
}
