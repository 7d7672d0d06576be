//! Mutable module table used while resolving a configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::base;

/// Section of `Modules/Setup.local` a module is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
  Core,
  Shared,
  Static,
  Disabled,
}

impl Section {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Core => "core",
      Self::Shared => "shared",
      Self::Static => "static",
      Self::Disabled => "disabled",
    }
  }
}

impl fmt::Display for Section {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Extension sources plus the section each module is assigned to.
///
/// A module appears in at most one section. Modules present in `extensions`
/// but in no section are left to the interpreter's own `Setup.stdlib` defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTable {
  pub header: Vec<String>,
  pub extensions: BTreeMap<String, Vec<String>>,
  pub core: BTreeSet<String>,
  pub shared: BTreeSet<String>,
  #[serde(rename = "static")]
  pub static_: BTreeSet<String>,
  pub disabled: BTreeSet<String>,
}

impl ModuleTable {
  /// The table every supported version starts from.
  pub fn base() -> Self {
    let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<BTreeSet<_>>();
    Self {
      header: base::HEADER.iter().map(|h| h.to_string()).collect(),
      extensions: base::EXTENSIONS
        .iter()
        .map(|(name, sources)| (name.to_string(), sources.iter().map(|s| s.to_string()).collect()))
        .collect(),
      core: owned(base::CORE),
      shared: BTreeSet::new(),
      static_: owned(base::STATIC),
      disabled: owned(base::DISABLED),
    }
  }

  pub fn section(&self, section: Section) -> &BTreeSet<String> {
    match section {
      Section::Core => &self.core,
      Section::Shared => &self.shared,
      Section::Static => &self.static_,
      Section::Disabled => &self.disabled,
    }
  }

  fn section_mut(&mut self, section: Section) -> &mut BTreeSet<String> {
    match section {
      Section::Core => &mut self.core,
      Section::Shared => &mut self.shared,
      Section::Static => &mut self.static_,
      Section::Disabled => &mut self.disabled,
    }
  }

  /// Section currently holding `module`, if any.
  pub fn section_of(&self, module: &str) -> Option<Section> {
    [Section::Core, Section::Shared, Section::Static, Section::Disabled]
      .into_iter()
      .find(|s| self.section(*s).contains(module))
  }

  /// Move each of `names` from `from` to `to`.
  ///
  /// Names not currently in `from` are left where they are; platform deltas
  /// mean a policy may name a module this table never enabled.
  pub fn move_modules(&mut self, from: Section, to: Section, names: &[&str]) {
    for name in names {
      if self.section_mut(from).remove(*name) {
        debug!(module = %name, from = %from, to = %to, "moving module");
        self.section_mut(to).insert(name.to_string());
      }
    }
  }

  /// Put `name` in `section`, taking it out of whichever section held it.
  pub fn assign(&mut self, name: &str, section: Section) {
    if let Some(current) = self.section_of(name) {
      self.section_mut(current).remove(name);
    }
    self.section_mut(section).insert(name.to_string());
  }

  /// Remove `name` from `section` without reassigning it.
  pub fn unlist(&mut self, name: &str, section: Section) {
    self.section_mut(section).remove(name);
  }

  pub fn set_extension(&mut self, name: &str, sources: &[&str]) {
    self
      .extensions
      .insert(name.to_string(), sources.iter().map(|s| s.to_string()).collect());
  }

  /// Forget an extension entirely: its sources and every section listing it.
  pub fn drop_extension(&mut self, name: &str) {
    self.extensions.remove(name);
    for section in [Section::Core, Section::Shared, Section::Static, Section::Disabled] {
      self.section_mut(section).remove(name);
    }
  }

  /// Modules built into or alongside the interpreter: core, static and shared.
  pub fn enabled(&self) -> BTreeSet<String> {
    self
      .core
      .iter()
      .chain(&self.static_)
      .chain(&self.shared)
      .cloned()
      .collect()
  }

  /// Enabled modules that have no source line.
  pub fn missing_sources(&self) -> Vec<String> {
    self
      .enabled()
      .into_iter()
      .filter(|m| !self.extensions.contains_key(m))
      .collect()
  }

  /// Render the `Modules/Setup.local` makefile fragment.
  pub fn render(&self) -> String {
    let mut out = vec!["# -*- makefile -*-".to_string()];
    out.extend(self.header.iter().cloned());
    out.push("\n# core\n".to_string());
    for name in &self.core {
      out.push(self.line(name));
    }
    for section in [Section::Shared, Section::Static, Section::Disabled] {
      let names = self.section(section);
      if names.is_empty() {
        continue;
      }
      out.push(format!("\n*{section}*\n"));
      for name in names {
        if section == Section::Disabled {
          out.push(name.clone());
        } else {
          out.push(self.line(name));
        }
      }
    }
    out.push("# end \n".to_string());
    out.join("\n")
  }

  fn line(&self, name: &str) -> String {
    match self.extensions.get(name) {
      Some(sources) if !sources.is_empty() => format!("{name} {}", sources.join(" ")),
      _ => name.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn base_table_has_sources_for_every_enabled_module() {
    let table = ModuleTable::base();
    assert!(table.missing_sources().is_empty());
    assert!(table.shared.is_empty());
    assert!(table.core.contains("posix"));
  }

  #[test]
  fn sections_are_disjoint_in_base_table() {
    let table = ModuleTable::base();
    for name in table.extensions.keys() {
      let count = [&table.core, &table.shared, &table.static_, &table.disabled]
        .iter()
        .filter(|s| s.contains(name))
        .count();
      assert!(count <= 1, "{name} listed {count} times");
    }
  }

  #[test]
  fn move_ignores_modules_not_in_source_section() {
    let mut table = ModuleTable::base();
    table.move_modules(Section::Static, Section::Disabled, &["_ssl", "_tkinter"]);
    assert_eq!(table.section_of("_ssl"), Some(Section::Disabled));
    assert_eq!(table.section_of("_tkinter"), Some(Section::Disabled));
    assert!(!table.static_.contains("_tkinter"));
  }

  #[test]
  fn drop_extension_purges_every_section() {
    let mut table = ModuleTable::base();
    table.assign("ossaudiodev", Section::Static);
    table.drop_extension("ossaudiodev");
    assert_eq!(table.section_of("ossaudiodev"), None);
    assert!(!table.extensions.contains_key("ossaudiodev"));
  }

  #[test]
  fn render_lists_sections_in_order() {
    let mut table = ModuleTable::base();
    table.move_modules(Section::Static, Section::Shared, &["_decimal"]);
    let text = table.render();

    assert!(text.starts_with("# -*- makefile -*-\nDESTLIB=$(LIBDEST)\n"));
    assert!(text.contains("\n# core\n\n_abc _abc.c\n"));
    assert!(text.ends_with("# end \n"));

    let shared = text.find("*shared*").unwrap();
    let statics = text.find("*static*").unwrap();
    let disabled = text.find("*disabled*").unwrap();
    assert!(shared < statics && statics < disabled);
    assert!(text.contains("_decimal _decimal/_decimal.c -DCONFIG_64=1"));
    assert!(text.contains("\n_tkinter\n"));
  }

  #[test]
  fn render_skips_empty_sections() {
    let table = ModuleTable::base();
    assert!(!table.render().contains("*shared*"));
  }
}
