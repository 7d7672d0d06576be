//! Versioned configuration matrix.
//!
//! A configuration is named `<linkage>_<tier>` (`static_mid`, `shared_vanilla`,
//! ...). Looking one up for a version starts from the base module table,
//! applies every per-version delta up to that version, then the tier policy.
//! The result is a [`Config`] that is never mutated afterwards.

mod base;
mod table;
mod tiers;
mod version;
mod versions;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use table::{ModuleTable, Section};
pub use version::PythonVersion;

use crate::error::{Error, Result};
use crate::platform::Os;

/// Every configuration name the matrix accepts.
pub const CONFIG_NAMES: &[&str] = &[
  "static_max",
  "static_mid",
  "static_min",
  "static_bootstrap",
  "shared_max",
  "shared_mid",
  "shared_vanilla",
  "framework_max",
  "framework_mid",
];

/// How the interpreter links its core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
  Static,
  Shared,
  Framework,
}

impl Linkage {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Static => "static",
      Self::Shared => "shared",
      Self::Framework => "framework",
    }
  }

  /// Shared and framework builds load `libpython` at runtime.
  pub fn is_dynamic(&self) -> bool {
    !matches!(self, Self::Static)
  }
}

impl fmt::Display for Linkage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Module-inclusion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeTier {
  Max,
  Mid,
  Min,
  Bootstrap,
  Vanilla,
}

impl SizeTier {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Max => "max",
      Self::Mid => "mid",
      Self::Min => "min",
      Self::Bootstrap => "bootstrap",
      Self::Vanilla => "vanilla",
    }
  }
}

impl fmt::Display for SizeTier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A parsed configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigName {
  pub linkage: Linkage,
  pub tier: SizeTier,
}

impl ConfigName {
  /// Parse `name`, reporting an unknown name against `version`.
  pub fn parse(name: &str, version: &str) -> Result<Self> {
    let unknown = || Error::UnknownConfig {
      version: version.to_string(),
      name: name.to_string(),
    };
    let (linkage, tier) = name.split_once('_').ok_or_else(unknown)?;
    let linkage = match linkage {
      "static" => Linkage::Static,
      "shared" => Linkage::Shared,
      "framework" => Linkage::Framework,
      _ => return Err(unknown()),
    };
    let tier = match (linkage, tier) {
      (_, "max") => SizeTier::Max,
      (_, "mid") => SizeTier::Mid,
      (Linkage::Static, "min" | "tiny") => SizeTier::Min,
      (Linkage::Static, "bootstrap") => SizeTier::Bootstrap,
      (Linkage::Shared, "vanilla") => SizeTier::Vanilla,
      _ => return Err(unknown()),
    };
    Ok(Self { linkage, tier })
  }
}

impl fmt::Display for ConfigName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}", self.linkage, self.tier)
  }
}

/// Resolved module set and flags for one (version, configuration) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  pub name: String,
  pub version: PythonVersion,
  pub linkage: Linkage,
  pub tier: SizeTier,
  pub os: Os,
  pub modules: ModuleTable,
  pub configure_flags: Vec<String>,
  pub install_name_template: Option<String>,
}

impl Config {
  /// Modules built as core, static or shared extensions.
  pub fn enabled_modules(&self) -> BTreeSet<String> {
    self.modules.enabled()
  }

  pub fn disabled_modules(&self) -> &BTreeSet<String> {
    &self.modules.disabled
  }

  pub fn is_enabled(&self, module: &str) -> bool {
    matches!(
      self.modules.section_of(module),
      Some(Section::Core | Section::Static | Section::Shared)
    )
  }

  /// Native libraries the enabled modules link against.
  pub fn required_dependencies(&self) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    if self.is_enabled("_ssl") || self.is_enabled("_hashlib") {
      deps.insert("openssl".to_string());
    }
    if self.is_enabled("_bz2") {
      deps.insert("bzip2".to_string());
    }
    if self.is_enabled("_lzma") {
      deps.insert("xz".to_string());
    }
    deps
  }

  /// Install name with `{ver}` filled in, for framework builds.
  pub fn install_name(&self) -> Option<String> {
    self
      .install_name_template
      .as_ref()
      .map(|t| t.replace("{ver}", &self.version.short()))
  }

  /// Contents of `Modules/Setup.local`.
  pub fn render_setup_local(&self) -> String {
    self.modules.render()
  }
}

/// Lookup table of every supported (version, configuration) pair for one OS.
#[derive(Debug, Clone, Copy)]
pub struct ConfigMatrix {
  os: Os,
}

impl ConfigMatrix {
  pub fn new(os: Os) -> Self {
    Self { os }
  }

  /// Matrix for the host platform.
  pub fn host() -> Result<Self> {
    Ok(Self::new(crate::platform::host_os()?))
  }

  pub fn os(&self) -> Os {
    self.os
  }

  /// Resolve `name` for `version` (`X.Y` or `X.Y.Z`).
  pub fn lookup(&self, version: &str, name: &str) -> Result<Config> {
    let version: PythonVersion = version.parse()?;
    self.resolve(version, name)
  }

  pub fn resolve(&self, version: PythonVersion, name: &str) -> Result<Config> {
    let parsed = ConfigName::parse(name, &version.to_string())?;
    debug!(version = %version, config = %parsed, os = %self.os.as_str(), "resolving configuration");

    let mut modules = versions::table_for(version.minor, self.os);
    tiers::apply(&mut modules, parsed.linkage, parsed.tier, self.os);

    let mut configure_flags = vec!["--disable-test-modules".to_string()];
    if parsed.linkage == Linkage::Shared {
      configure_flags.push("--enable-shared".to_string());
      configure_flags.push("--without-static-libpython".to_string());
    }

    let install_name_template = (parsed.linkage == Linkage::Framework)
      .then(|| "@rpath/Python.framework/Versions/{ver}/Python".to_string());

    Ok(Config {
      name: parsed.to_string(),
      version,
      linkage: parsed.linkage,
      tier: parsed.tier,
      os: self.os,
      modules,
      configure_flags,
      install_name_template,
    })
  }
}
