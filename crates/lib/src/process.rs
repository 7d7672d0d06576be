//! External command execution.
//!
//! Every build step that shells out goes through a [`ProcessRunner`]. Commands
//! are always an explicit program plus argument list, never a shell string.
//! [`SystemRunner`] is the real implementation; tests substitute a recording
//! double.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::SOURCE_DATE_EPOCH;
use crate::error::{Error, Result};

/// How much of a driven command's output reaches the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
  /// Capture everything; surface stderr only in errors.
  Quiet,
  /// Capture output and log it at debug level.
  #[default]
  Normal,
  /// Stream command output straight to the terminal.
  Verbose,
}

/// A single command to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  pub env: BTreeMap<String, String>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  /// Program and arguments joined for display. Not meant to be re-parsed.
  pub fn display(&self) -> String {
    let mut out = self.program.clone();
    for arg in &self.args {
      out.push(' ');
      out.push_str(arg);
    }
    out
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display())
  }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

/// Executes external commands.
pub trait ProcessRunner: Send + Sync {
  /// Run the invocation to completion.
  ///
  /// A non-zero exit is reported as [`Error::CmdFailed`]; failure to start the
  /// program as [`Error::CmdSpawn`].
  fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput>> + Send;
}

impl<R: ProcessRunner> ProcessRunner for &R {
  fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<CommandOutput>> + Send {
    (**self).run(invocation)
  }
}

/// Runs commands on the host through `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
  verbosity: Verbosity,
}

impl SystemRunner {
  pub fn new(verbosity: Verbosity) -> Self {
    Self { verbosity }
  }
}

impl ProcessRunner for SystemRunner {
  async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
    info!(cmd = %invocation, "executing command");

    let mut command = Command::new(&invocation.program);
    command
      .args(&invocation.args)
      .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
      .stdin(Stdio::null());
    for (key, value) in &invocation.env {
      command.env(key, value);
    }
    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }
    if self.verbosity == Verbosity::Verbose {
      command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
      command.stdout(Stdio::piped()).stderr(Stdio::piped());
    }

    debug!(program = %invocation.program, cwd = ?invocation.cwd, "spawning process");

    let output = command.output().await.map_err(|source| Error::CmdSpawn {
      program: invocation.program.clone(),
      source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if self.verbosity != Verbosity::Quiet {
      if !stdout.is_empty() {
        debug!(stdout = %stdout, "command stdout");
      }
      if !stderr.is_empty() {
        debug!(stderr = %stderr, "command stderr");
      }
    }

    if !output.status.success() {
      return Err(Error::CmdFailed {
        cmd: invocation.display(),
        code: output.status.code(),
        stderr: tail(&stderr, 20),
      });
    }

    Ok(CommandOutput {
      code: output.status.code(),
      stdout,
      stderr,
    })
  }
}

/// Last `lines` lines of `text`.
fn tail(text: &str, lines: usize) -> String {
  let all: Vec<&str> = text.lines().collect();
  let start = all.len().saturating_sub(lines);
  all[start..].join("\n")
}
