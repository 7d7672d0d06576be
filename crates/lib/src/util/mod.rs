//! Shared utilities.
//!
//! Hashing, filesystem helpers and test doubles used across the crate.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
