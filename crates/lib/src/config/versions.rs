//! Per-version changes to the base module table.
//!
//! Deltas are cumulative: resolving 3.13 applies the 3.11, 3.12 and 3.13
//! entries in that order.

use tracing::debug;

use super::table::{ModuleTable, Section};
use crate::platform::Os;

/// Changes one minor release makes relative to the previous one.
pub(crate) struct VersionDelta {
  pub minor: u32,
  /// Disabled modules enabled statically on one platform only.
  pub platform_static: &'static [(Os, &'static str)],
  /// New or replaced source lines.
  pub set_extensions: &'static [(&'static str, &'static [&'static str])],
  /// Extensions that no longer exist in this release.
  pub drop_extensions: &'static [&'static str],
  pub add_static: &'static [&'static str],
  pub remove_static: &'static [&'static str],
  pub add_disabled: &'static [&'static str],
  pub remove_disabled: &'static [&'static str],
}

const HACL_FLAGS: [&str; 3] = ["-I$(srcdir)/Modules/_hacl/include", "-D_BSD_SOURCE", "-D_DEFAULT_SOURCE"];

pub(crate) const DELTAS: &[VersionDelta] = &[
  VersionDelta {
    minor: 11,
    platform_static: &[(Os::MacOs, "_scproxy"), (Os::Linux, "ossaudiodev")],
    set_extensions: &[],
    drop_extensions: &[],
    add_static: &[],
    remove_static: &[],
    add_disabled: &[],
    remove_disabled: &[],
  },
  VersionDelta {
    minor: 12,
    platform_static: &[],
    set_extensions: &[
      (
        "_md5",
        &["md5module.c", HACL_FLAGS[0], "_hacl/Hacl_Hash_MD5.c", HACL_FLAGS[1], HACL_FLAGS[2]],
      ),
      (
        "_sha1",
        &["sha1module.c", HACL_FLAGS[0], "_hacl/Hacl_Hash_SHA1.c", HACL_FLAGS[1], HACL_FLAGS[2]],
      ),
      (
        "_sha2",
        &["sha2module.c", HACL_FLAGS[0], "_hacl/Hacl_Hash_SHA2.c", HACL_FLAGS[1], HACL_FLAGS[2]],
      ),
      (
        "_sha3",
        &["sha3module.c", HACL_FLAGS[0], "_hacl/Hacl_Hash_SHA3.c", HACL_FLAGS[1], HACL_FLAGS[2]],
      ),
    ],
    drop_extensions: &["_sha256", "_sha512"],
    add_static: &["_sha2"],
    remove_static: &[],
    add_disabled: &["_xxinterpchannels"],
    remove_disabled: &[],
  },
  VersionDelta {
    minor: 13,
    platform_static: &[],
    set_extensions: &[
      ("_interpchannels", &["_interpchannelsmodule.c"]),
      ("_interpqueues", &["_interpqueuesmodule.c"]),
      ("_interpreters", &["_interpretersmodule.c"]),
      ("_sysconfig", &["_sysconfig.c"]),
      ("_testexternalinspection", &["_testexternalinspection.c"]),
    ],
    drop_extensions: &["_crypt", "ossaudiodev", "spwd"],
    add_static: &["_interpchannels", "_interpqueues", "_interpreters", "_sysconfig"],
    remove_static: &[],
    add_disabled: &["_testexternalinspection"],
    remove_disabled: &["_xxsubinterpreters", "audioop", "nis"],
  },
  VersionDelta {
    minor: 14,
    platform_static: &[],
    set_extensions: &[
      ("_types", &["_typesmodule.c"]),
      ("_hmac", &["hmacmodule.c"]),
      ("_remote_debugging", &["_remote_debugging_module.c"]),
      ("_zstd", &["_zstd/_zstdmodule.c", "-lzstd", "-I$(srcdir)/Modules/_zstd"]),
      ("_blake2", &["blake2module.c"]),
      ("_md5", &["md5module.c"]),
      ("_sha1", &["sha1module.c"]),
      ("_sha2", &["sha2module.c"]),
      ("_sha3", &["sha3module.c"]),
    ],
    drop_extensions: &["_contextvars", "_testexternalinspection"],
    add_static: &["_types"],
    // The HACL-backed hashes and _hmac are left to Setup.stdlib.
    remove_static: &["_sha1", "_sha2", "_sha3"],
    add_disabled: &["_remote_debugging", "_zstd"],
    remove_disabled: &[],
  },
];

impl VersionDelta {
  pub fn apply(&self, table: &mut ModuleTable, os: Os) {
    debug!(minor = self.minor, os = %os.as_str(), "applying version delta");
    for (only_on, name) in self.platform_static {
      if *only_on == os {
        table.move_modules(Section::Disabled, Section::Static, &[name]);
      }
    }
    for (name, sources) in self.set_extensions {
      table.set_extension(name, sources);
    }
    for name in self.drop_extensions {
      table.drop_extension(name);
    }
    for name in self.remove_static {
      table.unlist(name, Section::Static);
    }
    for name in self.add_static {
      table.assign(name, Section::Static);
    }
    for name in self.remove_disabled {
      table.unlist(name, Section::Disabled);
    }
    for name in self.add_disabled {
      table.assign(name, Section::Disabled);
    }
  }
}

/// Base table with every delta up to and including `minor` applied.
pub(crate) fn table_for(minor: u32, os: Os) -> ModuleTable {
  let mut table = ModuleTable::base();
  for delta in DELTAS.iter().filter(|d| d.minor <= minor) {
    delta.apply(&mut table, os);
  }
  table
}
