//! Compress the standard library into `python3X.zip`.
//!
//! Extension modules and the `os` landmark the interpreter uses to locate its
//! prefix must stay on disk, so they are parked in the build directory while
//! the archive is written and moved back afterwards.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::Result;
use crate::layout::InstallLayout;
use crate::platform::Os;
use crate::util::fs::{move_path, remove_path, to_slash};

/// Paths moved out of the way, put back on [`Relocation::restore`] or drop.
#[derive(Debug, Default)]
pub struct Relocation {
  moved: Vec<(PathBuf, PathBuf)>,
}

impl Relocation {
  /// Move `from` to `parking` if it exists. Returns whether anything moved.
  pub fn move_aside(&mut self, from: &Path, parking: &Path) -> Result<bool> {
    if from.symlink_metadata().is_err() {
      return Ok(false);
    }
    remove_path(parking)?;
    move_path(from, parking)?;
    self.moved.push((from.to_path_buf(), parking.to_path_buf()));
    Ok(true)
  }

  /// Move every parked path back, most recent first.
  pub fn restore(mut self) -> Result<()> {
    for (original, parked) in std::mem::take(&mut self.moved).into_iter().rev() {
      move_path(&parked, &original)?;
    }
    Ok(())
  }
}

impl Drop for Relocation {
  fn drop(&mut self) {
    for (original, parked) in self.moved.drain(..).rev() {
      if let Err(e) = move_path(&parked, &original) {
        warn!(from = ?parked, to = ?original, error = %e, "failed to restore relocated path");
      }
    }
  }
}

/// Write every entry under `root` into a zip at `dest`.
///
/// Entries are sorted and carry the fixed 1980-01-01 timestamp, so the same
/// tree always produces the same archive.
pub fn zip_dir(root: &Path, dest: &Path) -> Result<u64> {
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent)?;
  }
  let mut writer = ZipWriter::new(BufWriter::new(File::create(dest)?));
  let options = SimpleFileOptions::default()
    .compression_method(CompressionMethod::Deflated)
    .last_modified_time(DateTime::default());

  let mut count = 0;
  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(root).map_err(io::Error::other)?;
    let name = to_slash(rel);
    if entry.file_type().is_dir() {
      writer.add_directory(format!("{name}/"), options).map_err(io::Error::other)?;
    } else if entry.file_type().is_file() {
      writer.start_file(name, options).map_err(io::Error::other)?;
      io::copy(&mut File::open(entry.path())?, &mut writer)?;
      count += 1;
    }
  }
  writer.finish().map_err(io::Error::other)?;
  Ok(count)
}

/// Zip the stdlib of `install` and leave the extension modules outside it.
///
/// `work_dir` receives the parked paths while the archive is written.
pub fn ziplib(install: &InstallLayout, work_dir: &Path) -> Result<PathBuf> {
  let stdlib = install.stdlib_dir();
  let zip_path = install.stdlib_zip();

  if install.os == Os::Windows {
    let files = zip_dir(&stdlib, &zip_path)?;
    remove_path(&stdlib)?;
    info!(zip = ?zip_path, files, "zipped stdlib");
    return Ok(zip_path);
  }

  let parking = work_dir.join("stdlib-aside");
  let mut aside = Relocation::default();
  aside.move_aside(&install.dynload_dir(), &parking.join("lib-dynload"))?;
  for landmark in ["os.py", "os.pyc"] {
    aside.move_aside(&stdlib.join(landmark), &parking.join(landmark))?;
  }

  let files = zip_dir(&stdlib, &zip_path)?;
  remove_path(&stdlib)?;
  remove_path(&install.lib_dir().join("pkgconfig"))?;
  fs::create_dir_all(install.site_packages())?;
  aside.restore()?;
  remove_path(&parking)?;

  info!(zip = ?zip_path, files, "zipped stdlib");
  Ok(zip_path)
}
