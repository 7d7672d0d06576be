//! buildpy-lib: build, post-process and shrink CPython interpreters.
//!
//! - [`config`]: the versioned configuration matrix (`static_mid`, `shared_vanilla`, ...)
//! - [`fetch`] and [`extract`]: checksum-gated downloads and traversal-safe extraction
//! - [`deps`]: native prerequisites (OpenSSL, bzip2, xz) ordered by a DAG
//! - [`pipeline`]: the build state machine from `pending` to `cached`
//! - [`postprocess`] and [`validate`]: finishing and smoke-testing an install
//! - [`analyze`] and [`reduce`]: import analysis and size reduction of a built tree

pub mod analyze;
pub mod cache;
pub mod config;
pub mod consts;
pub mod deps;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod layout;
pub mod pipeline;
pub mod platform;
pub mod postprocess;
pub mod process;
pub mod reduce;
pub mod report;
pub mod util;
pub mod validate;

pub use error::{Error, ErrorKind, Result};
