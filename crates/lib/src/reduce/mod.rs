//! Size reduction driven by dependency analysis.
//!
//! The [`ReductionPlanner`] turns an [`AnalysisResult`](crate::analyze::AnalysisResult)
//! and a [`Config`](crate::config::Config) into a [`ReductionManifest`]; the
//! [`ReductionApplier`] deletes what a manifest lists from an installed tree.
//! Planning never touches the filesystem and applying never second-guesses
//! the manifest beyond path safety and the protected set.

mod apply;
mod manifest;
mod plan;

pub use apply::{ReductionApplier, ReductionReport};
pub use manifest::ReductionManifest;
pub use plan::{PROTECTED_EXTENSIONS, PROTECTED_STDLIB_DIRS, ReductionPlanner, protected_modules, protected_stdlib_dirs};
