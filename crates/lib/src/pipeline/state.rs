//! Pipeline states and the transitions allowed between them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// A working stage of a pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Pending,
  Fetching,
  Verifying,
  Extracting,
  ConfiguringDeps,
  BuildingDeps,
  Configuring,
  Compiling,
  Installing,
  PostProcessing,
  Validating,
}

impl Stage {
  pub const ALL: [Stage; 11] = [
    Stage::Pending,
    Stage::Fetching,
    Stage::Verifying,
    Stage::Extracting,
    Stage::ConfiguringDeps,
    Stage::BuildingDeps,
    Stage::Configuring,
    Stage::Compiling,
    Stage::Installing,
    Stage::PostProcessing,
    Stage::Validating,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Fetching => "fetching",
      Self::Verifying => "verifying",
      Self::Extracting => "extracting",
      Self::ConfiguringDeps => "configuring_deps",
      Self::BuildingDeps => "building_deps",
      Self::Configuring => "configuring",
      Self::Compiling => "compiling",
      Self::Installing => "installing",
      Self::PostProcessing => "post_processing",
      Self::Validating => "validating",
    }
  }

  /// The stage after this one, `None` for [`Stage::Validating`] which leads to `Cached`.
  pub fn next(&self) -> Option<Stage> {
    let idx = Self::ALL.iter().position(|s| s == self)?;
    Self::ALL.get(idx + 1).copied()
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
  At { stage: Stage },
  Cached,
  Failed { stage: Stage, kind: ErrorKind },
}

impl PipelineState {
  pub const START: PipelineState = PipelineState::At { stage: Stage::Pending };

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Cached | Self::Failed { .. })
  }

  /// Check that moving to `to` is allowed.
  ///
  /// Stages advance one at a time; `Pending` may jump straight to `Cached`
  /// on a cache hit, `Validating` leads to `Cached`, and any non-terminal
  /// state may fail. Terminal states never move.
  pub fn advance(self, to: PipelineState) -> Result<PipelineState> {
    let allowed = match (self, to) {
      (Self::At { stage: from }, Self::At { stage: next }) => from.next() == Some(next),
      (Self::At { stage: Stage::Pending }, Self::Cached) => true,
      (Self::At { stage: Stage::Validating }, Self::Cached) => true,
      (Self::At { stage: from }, Self::Failed { stage, .. }) => from == stage,
      _ => false,
    };
    if allowed {
      Ok(to)
    } else {
      Err(Error::IllegalTransition {
        from: self.to_string(),
        to: to.to_string(),
      })
    }
  }
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::At { stage } => write!(f, "{stage}"),
      Self::Cached => f.write_str("cached"),
      Self::Failed { stage, kind } => write!(f, "failed({stage}, {})", kind.as_str()),
    }
  }
}
