//! Native prerequisites of the interpreter build.
//!
//! Each [`DependencySpec`] names one library (OpenSSL, bzip2, xz), where to
//! fetch it and which other specs must be installed first. [`dag`] orders
//! them; [`builder`] runs one spec's recipe.

pub mod builder;
pub mod dag;
pub mod recipes;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use builder::DependencyBuilder;
pub use dag::DependencyGraph;

use crate::util::hash::Checksum;

/// One native library the interpreter links against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
  pub name: String,
  pub version: String,
  pub source_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub checksum: Option<Checksum>,
  #[serde(default)]
  pub depends_on: BTreeSet<String>,
}

impl DependencySpec {
  pub fn new(name: &str, version: &str, source_url: &str) -> Self {
    Self {
      name: name.to_string(),
      version: version.to_string(),
      source_url: source_url.to_string(),
      checksum: None,
      depends_on: BTreeSet::new(),
    }
  }

  pub fn with_checksum(mut self, checksum: Checksum) -> Self {
    self.checksum = Some(checksum);
    self
  }

  pub fn depends_on(mut self, name: &str) -> Self {
    self.depends_on.insert(name.to_string());
    self
  }

  /// `openssl-1.1.1w`, the name of the extracted source tree.
  pub fn label(&self) -> String {
    format!("{}-{}", self.name, self.version)
  }

  pub fn openssl() -> Self {
    Self::new(
      "openssl",
      "1.1.1w",
      "https://www.openssl.org/source/old/1.1.1/openssl-1.1.1w.tar.gz",
    )
  }

  pub fn bzip2() -> Self {
    Self::new("bzip2", "1.0.8", "https://sourceware.org/pub/bzip2/bzip2-1.0.8.tar.gz")
  }

  pub fn xz() -> Self {
    Self::new(
      "xz",
      "5.8.2",
      "https://github.com/tukaani-project/xz/releases/download/v5.8.2/xz-5.8.2.tar.gz",
    )
  }

  /// The three prerequisites the module tables know how to link.
  pub fn defaults() -> Vec<Self> {
    vec![Self::openssl(), Self::bzip2(), Self::xz()]
  }
}
