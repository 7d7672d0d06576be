//! Module-exclusion policies for each `<linkage>_<tier>` configuration.

use super::table::{ModuleTable, Section};
use super::{Linkage, SizeTier};
use crate::platform::Os;

/// Modules that reference interpreter internals and cannot be loaded as
/// shared extensions.
const MUST_STAY_STATIC: &[&str] = &[
  "_functools",
  "_locale",
  "_signal",
  "_sre",
  "_thread",
  "posix",
  "time",
  "_typing",
];

/// Modules `shared_vanilla` re-enables when the platform can build them.
const VANILLA_ENABLE: &[&str] = &[
  "_ctypes",
  "_curses",
  "_curses_panel",
  "_dbm",
  "_scproxy",
  "_tkinter",
  "resource",
  "syslog",
  "termios",
];

const MIN_DISABLE: &[&str] = &[
  "_bz2",
  "_decimal",
  "_csv",
  "_json",
  "_lzma",
  "_scproxy",
  "_sqlite3",
  "_ssl",
  "_hashlib",
  "pyexpat",
];

const OPENSSL_AND_DECIMAL: &[&str] = &["_decimal", "_ssl", "_hashlib"];

const FRAMEWORK_SHARED: &[&str] = &["_bz2", "_lzma", "_sqlite3", "_scproxy", "zlib", "binascii"];

/// Whether `module` can be built on `os`.
fn available_on(module: &str, os: Os) -> bool {
  match module {
    "_scproxy" => os == Os::MacOs,
    "ossaudiodev" => os == Os::Linux,
    _ => true,
  }
}

/// Re-enable a disabled module as a shared extension when it has a source
/// line and builds on this platform; otherwise just stop disabling it.
fn enable_shared(table: &mut ModuleTable, module: &str, os: Os) {
  if !table.disabled.contains(module) {
    return;
  }
  if table.extensions.contains_key(module) && available_on(module, os) {
    table.move_modules(Section::Disabled, Section::Shared, &[module]);
  } else {
    table.unlist(module, Section::Disabled);
  }
}

fn shared_max(table: &mut ModuleTable, os: Os) {
  enable_shared(table, "_ctypes", os);
  table.move_modules(Section::Static, Section::Shared, OPENSSL_AND_DECIMAL);
}

fn framework_max(table: &mut ModuleTable, os: Os) {
  shared_max(table, os);
  table.move_modules(Section::Static, Section::Shared, FRAMEWORK_SHARED);
}

pub(crate) fn apply(table: &mut ModuleTable, linkage: Linkage, tier: SizeTier, os: Os) {
  match (linkage, tier) {
    (Linkage::Static, SizeTier::Max) => {}
    (Linkage::Static, SizeTier::Mid) | (Linkage::Shared, SizeTier::Mid) => {
      table.move_modules(Section::Static, Section::Disabled, OPENSSL_AND_DECIMAL);
    }
    (Linkage::Static, SizeTier::Min) => {
      table.move_modules(Section::Static, Section::Disabled, MIN_DISABLE);
    }
    (Linkage::Static, SizeTier::Bootstrap) => {
      let statics = std::mem::take(&mut table.static_);
      table.disabled.extend(statics);
      table.static_ = std::mem::take(&mut table.core);
    }
    (Linkage::Shared, SizeTier::Max) => shared_max(table, os),
    (Linkage::Shared, SizeTier::Vanilla) => {
      for module in VANILLA_ENABLE {
        enable_shared(table, module, os);
      }
      let movable: Vec<String> = table
        .static_
        .iter()
        .filter(|m| !MUST_STAY_STATIC.contains(&m.as_str()))
        .cloned()
        .collect();
      let movable: Vec<&str> = movable.iter().map(String::as_str).collect();
      table.move_modules(Section::Static, Section::Shared, &movable);
    }
    (Linkage::Framework, SizeTier::Max) => framework_max(table, os),
    (Linkage::Framework, SizeTier::Mid) => {
      framework_max(table, os);
      table.move_modules(Section::Shared, Section::Disabled, OPENSSL_AND_DECIMAL);
    }
    // Rejected by name parsing before a table is ever built.
    _ => {}
  }
}
