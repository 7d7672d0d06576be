//! Host platform detection.

pub mod os;

pub use os::Os;

/// Returns the host OS, or an error naming the unsupported platform.
pub fn host_os() -> crate::Result<Os> {
  Os::current().ok_or_else(|| {
    crate::Error::InvalidTarget(format!("unsupported host platform '{}'", std::env::consts::OS))
  })
}
