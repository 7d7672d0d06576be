use std::fmt;

use serde::{Deserialize, Serialize};

/// Operating systems an interpreter can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
    }
  }

  pub fn is_unix(&self) -> bool {
    !matches!(self, Self::Windows)
  }

  /// File name suffix of a shared library, including the dot.
  pub fn dylib_suffix(&self) -> &'static str {
    match self {
      Self::Linux => ".so",
      Self::MacOs => ".dylib",
      Self::Windows => ".dll",
    }
  }

  /// File name suffix of a static library, including the dot.
  pub fn staticlib_suffix(&self) -> &'static str {
    match self {
      Self::Windows => ".lib",
      _ => ".a",
    }
  }

  /// Glob patterns matching a compiled extension module named `module`.
  pub fn extension_patterns(&self, module: &str) -> Vec<String> {
    match self {
      Self::Windows => vec![format!("{module}.pyd"), format!("{module}.*.pyd"), format!("{module}_d.pyd")],
      _ => vec![format!("{module}.cpython-*.so"), format!("{module}.*.so")],
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
