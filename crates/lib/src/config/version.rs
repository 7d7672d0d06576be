use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_PATCH_RELEASES;
use crate::error::Error;

/// A CPython release in the supported 3.11 to 3.14 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PythonVersion {
  pub major: u32,
  pub minor: u32,
  pub patch: u32,
}

impl PythonVersion {
  /// `3.13`
  pub fn short(&self) -> String {
    format!("{}.{}", self.major, self.minor)
  }

  /// `313`
  pub fn nodot(&self) -> String {
    format!("{}{}", self.major, self.minor)
  }

  /// Default patch release for a supported `3.<minor>` series.
  pub fn default_for_minor(minor: u32) -> Option<Self> {
    DEFAULT_PATCH_RELEASES
      .iter()
      .find(|(m, _)| *m == minor)
      .and_then(|(_, full)| full.parse().ok())
  }
}

impl FromStr for PythonVersion {
  type Err = Error;

  /// Accepts `X.Y.Z`, or `X.Y` which resolves to the series' default patch release.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let unsupported = || Error::UnsupportedVersion(s.to_string());
    let parts: Vec<u32> = s
      .trim()
      .split('.')
      .map(|p| p.parse::<u32>())
      .collect::<Result<_, _>>()
      .map_err(|_| unsupported())?;

    let supported = |major: u32, minor: u32| {
      major == 3 && DEFAULT_PATCH_RELEASES.iter().any(|(m, _)| *m == minor)
    };

    match parts.as_slice() {
      [major, minor] if supported(*major, *minor) => {
        Self::default_for_minor(*minor).ok_or_else(unsupported)
      }
      [major, minor, patch] if supported(*major, *minor) => Ok(Self {
        major: *major,
        minor: *minor,
        patch: *patch,
      }),
      _ => Err(unsupported()),
    }
  }
}

impl TryFrom<String> for PythonVersion {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<PythonVersion> for String {
  fn from(value: PythonVersion) -> Self {
    value.to_string()
  }
}

impl fmt::Display for PythonVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}
