//! Crate-wide constants.

/// Interpreter version built when none is requested.
pub const DEFAULT_PYTHON_VERSION: &str = "3.13.11";

/// Default patch release for each supported minor series, oldest first.
pub const DEFAULT_PATCH_RELEASES: &[(u32, &str)] =
  &[(11, "3.11.14"), (12, "3.12.12"), (13, "3.13.11"), (14, "3.14.2")];

/// Length of the truncated fingerprint used for cache entry names.
pub const FINGERPRINT_LEN: usize = 20;

/// Marker written into a source tree once extraction completed successfully.
pub const EXTRACTED_MARKER: &str = ".buildpy-extracted";

/// Format version of persisted cache entries.
pub const CACHE_ENTRY_VERSION: u32 = 1;

/// Format version of persisted reduction manifests.
pub const MANIFEST_VERSION: &str = "1.0";

/// Read buffer used when hashing files.
pub const HASH_BUFFER_SIZE: usize = 8192;

/// `SOURCE_DATE_EPOCH` handed to every driven build command.
///
/// 315532800 is 1980-01-01 00:00:00 UTC, the earliest timestamp a zip entry can carry.
pub const SOURCE_DATE_EPOCH: &str = "315532800";
