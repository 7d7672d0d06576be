//! Path-traversal-safe archive extraction.
//!
//! Every member is checked before it is written: its path must be relative and
//! may not climb out of the destination, and link targets must resolve inside
//! the destination too. Members are unpacked into a staging directory beside
//! the destination; only a fully successful extraction is renamed into place
//! and stamped with the [`EXTRACTED_MARKER`]. Any failure drops the staging
//! directory, so a partial tree is never visible under the destination name.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::EXTRACTED_MARKER;
use crate::error::{Error, Result};
use crate::util::fs::{normalize_lexically, remove_path};

/// A source tree produced from one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSource {
  pub path: PathBuf,
  pub originating_archive: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  Tar,
  TarGz,
  TarXz,
  Zip,
}

impl ArchiveFormat {
  /// Identify the format from the file's leading bytes.
  pub fn sniff(path: &Path) -> Result<Self> {
    let mut head = [0u8; 512];
    let mut file = fs::File::open(path).map_err(|e| Error::corrupt(path, e))?;
    let mut read = 0;
    while read < head.len() {
      let n = file.read(&mut head[read..]).map_err(|e| Error::corrupt(path, e))?;
      if n == 0 {
        break;
      }
      read += n;
    }
    let head = &head[..read];

    if head.starts_with(&[0x1f, 0x8b]) {
      Ok(Self::TarGz)
    } else if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
      Ok(Self::TarXz)
    } else if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
      Ok(Self::Zip)
    } else if is_tar_header(head) {
      Ok(Self::Tar)
    } else {
      Err(Error::UnsupportedArchive(path.to_path_buf()))
    }
  }
}

/// Whether `head` starts with a tar header block: ustar magic, or for pre-POSIX
/// archives a header checksum that adds up.
fn is_tar_header(head: &[u8]) -> bool {
  if head.len() < 512 {
    return false;
  }
  if &head[257..262] == b"ustar" {
    return true;
  }
  let field = String::from_utf8_lossy(&head[148..156]);
  let Ok(stored) = u32::from_str_radix(field.trim_matches(|c: char| c == '\0' || c == ' '), 8) else {
    return false;
  };
  // The checksum is computed with its own field read as spaces.
  let sum: u32 = head[..512]
    .iter()
    .enumerate()
    .map(|(i, b)| if (148..156).contains(&i) { u32::from(b' ') } else { u32::from(*b) })
    .sum();
  head[0] != 0 && sum == stored
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
  /// Discard any existing tree (marked or not) and extract again.
  pub reset: bool,
  /// When the archive holds a single top-level directory, use its contents as the tree root.
  pub strip_single_root: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExtractionMarker {
  archive: PathBuf,
  members: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafeExtractor;

impl SafeExtractor {
  /// Extract `archive` so that its tree ends up at `dest`.
  ///
  /// Skips work when `dest` already carries the success marker, unless a
  /// reset is requested.
  pub fn extract(&self, archive: &Path, dest: &Path, options: ExtractOptions) -> Result<ExtractedSource> {
    let extracted = ExtractedSource {
      path: dest.to_path_buf(),
      originating_archive: archive.to_path_buf(),
    };

    if !options.reset && is_extracted(dest) {
      info!(path = ?dest, "source already extracted");
      return Ok(extracted);
    }

    remove_path(dest).map_err(|e| Error::corrupt(dest, e))?;
    let parent = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| Error::corrupt(dest, e))?;

    let staging = tempfile::Builder::new()
      .prefix(".extract-")
      .tempdir_in(parent)
      .map_err(|e| Error::corrupt(archive, e))?;

    let format = ArchiveFormat::sniff(archive)?;
    info!(archive = ?archive, format = ?format, "extracting archive");

    let open = || fs::File::open(archive).map_err(|e| Error::corrupt(archive, e));
    let members = match format {
      ArchiveFormat::Tar => unpack_tar(archive, open()?, staging.path())?,
      ArchiveFormat::TarGz => unpack_tar(archive, flate2::read::GzDecoder::new(open()?), staging.path())?,
      ArchiveFormat::TarXz => unpack_tar(archive, xz2::read::XzDecoder::new(open()?), staging.path())?,
      ArchiveFormat::Zip => unpack_zip(archive, open()?, staging.path())?,
    };

    let root = if options.strip_single_root {
      single_child_dir(staging.path()).map_err(|e| Error::corrupt(archive, e))?
    } else {
      None
    };
    let root = root.unwrap_or_else(|| staging.path().to_path_buf());

    // The staging directory is dropped afterwards either way; if `root` was the
    // staging directory itself its cleanup finds nothing to remove.
    fs::rename(&root, dest).map_err(|e| Error::corrupt(archive, e))?;
    drop(staging);

    let marker = ExtractionMarker {
      archive: archive.to_path_buf(),
      members,
    };
    fs::write(dest.join(EXTRACTED_MARKER), serde_json::to_string(&marker)?)?;

    debug!(path = ?dest, members, "extraction complete");
    Ok(extracted)
  }
}

/// Whether `dest` holds a completed extraction.
pub fn is_extracted(dest: &Path) -> bool {
  dest.join(EXTRACTED_MARKER).is_file()
}

/// Normalized relative path of a member, or `None` if it is absolute or climbs out.
pub fn safe_member_path(name: &Path) -> Option<PathBuf> {
  if name
    .components()
    .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
  {
    return None;
  }
  normalize_lexically(name)
}

/// Whether a symlink at `member` pointing to `target` stays inside the root.
///
/// Only lexical: chains of links are handled by never writing through a link
/// the same archive created, see [`LinkTracker`].
pub fn link_stays_inside(member: &Path, target: &Path) -> bool {
  if target.is_absolute() || target.components().any(|c| matches!(c, Component::Prefix(_))) {
    return false;
  }
  let base = member.parent().unwrap_or(Path::new(""));
  normalize_lexically(&base.join(target)).is_some()
}

/// Symlinks written so far by one extraction.
///
/// A later member whose path runs through (or replaces) one of them is
/// refused, so a link that is harmless on its own cannot be chained with
/// another to reach outside the root.
#[derive(Debug, Default)]
struct LinkTracker {
  links: HashSet<PathBuf>,
}

impl LinkTracker {
  fn crosses_link(&self, rel: &Path) -> bool {
    rel.ancestors().any(|a| self.links.contains(a))
  }

  fn record(&mut self, rel: &Path) {
    self.links.insert(rel.to_path_buf());
  }
}

fn unsafe_member(name: &Path, dest: &Path) -> Error {
  Error::UnsafeArchiveMember {
    member: name.display().to_string(),
    dest: dest.to_path_buf(),
  }
}

fn unpack_tar<R: Read>(archive_path: &Path, reader: R, staging: &Path) -> Result<usize> {
  let mut archive = tar::Archive::new(reader);
  archive.set_overwrite(true);
  archive.set_preserve_mtime(false);

  let mut links = LinkTracker::default();
  let mut count = 0;
  for entry in archive.entries().map_err(|e| Error::corrupt(archive_path, e))? {
    let mut entry = entry.map_err(|e| Error::corrupt(archive_path, e))?;
    let name = entry.path().map_err(|e| Error::corrupt(archive_path, e))?.into_owned();

    let Some(rel) = safe_member_path(&name) else {
      return Err(unsafe_member(&name, staging));
    };
    if links.crosses_link(&rel) {
      return Err(unsafe_member(&name, staging));
    }

    let entry_type = entry.header().entry_type();
    if entry_type.is_symlink() || entry_type.is_hard_link() {
      let target = entry
        .link_name()
        .map_err(|e| Error::corrupt(archive_path, e))?
        .map(|t| t.into_owned())
        .unwrap_or_default();
      let inside = if entry_type.is_symlink() {
        link_stays_inside(&rel, &target)
      } else {
        safe_member_path(&target).is_some_and(|t| !links.crosses_link(&t))
      };
      if !inside {
        return Err(unsafe_member(&name, staging));
      }
      if entry_type.is_symlink() {
        links.record(&rel);
      }
    }

    // unpack_in re-checks that the parent resolves inside the staging root,
    // which also catches paths routed through previously unpacked symlinks.
    let unpacked = entry
      .unpack_in(staging)
      .map_err(|e| Error::corrupt(archive_path, e))?;
    if !unpacked {
      return Err(unsafe_member(&name, staging));
    }
    count += 1;
  }
  Ok(count)
}

fn unpack_zip(archive_path: &Path, file: fs::File, staging: &Path) -> Result<usize> {
  let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::corrupt(archive_path, e))?;

  let mut links = LinkTracker::default();
  for index in 0..archive.len() {
    let mut member = archive.by_index(index).map_err(|e| Error::corrupt(archive_path, e))?;
    let name = PathBuf::from(member.name());
    let Some(rel) = safe_member_path(&name) else {
      return Err(unsafe_member(&name, staging));
    };
    if links.crosses_link(&rel) {
      return Err(unsafe_member(&name, staging));
    }
    let target = staging.join(&rel);

    if member.is_dir() {
      create_dir_inside(staging, &target).map_err(|_| unsafe_member(&name, staging))?;
      continue;
    }
    if let Some(parent) = target.parent() {
      create_dir_inside(staging, parent).map_err(|_| unsafe_member(&name, staging))?;
    }

    if member.is_symlink() {
      let mut link = String::new();
      member
        .read_to_string(&mut link)
        .map_err(|e| Error::corrupt(archive_path, e))?;
      if !link_stays_inside(&rel, Path::new(&link)) {
        return Err(unsafe_member(&name, staging));
      }
      write_symlink(Path::new(&link), &target)?;
      links.record(&rel);
      continue;
    }

    let mut out = fs::File::create(&target)?;
    io::copy(&mut member, &mut out).map_err(|e| Error::corrupt(archive_path, e))?;

    #[cfg(unix)]
    if let Some(mode) = member.unix_mode() {
      use std::os::unix::fs::PermissionsExt;
      fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))?;
    }
  }
  Ok(archive.len())
}

/// Create `dir` after checking that its deepest existing ancestor resolves inside `root`.
///
/// The check runs before anything is created, so a directory is never made
/// through a path that leaves the root.
fn create_dir_inside(root: &Path, dir: &Path) -> io::Result<()> {
  let root = root.canonicalize()?;
  let existing = dir
    .ancestors()
    .find(|a| a.symlink_metadata().is_ok())
    .ok_or_else(|| io::Error::other("no existing ancestor"))?;
  if !existing.canonicalize()?.starts_with(&root) {
    return Err(io::Error::other("path escapes extraction root"));
  }
  fs::create_dir_all(dir)?;
  if !dir.canonicalize()?.starts_with(&root) {
    return Err(io::Error::other("path escapes extraction root"));
  }
  Ok(())
}

#[cfg(unix)]
fn write_symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn write_symlink(target: &Path, link: &Path) -> io::Result<()> {
  // Without symlink privileges, store the target path as file contents.
  fs::write(link, target.to_string_lossy().as_bytes())
}

/// The only entry of `dir` if it is a directory.
fn single_child_dir(dir: &Path) -> io::Result<Option<PathBuf>> {
  let mut entries = fs::read_dir(dir)?;
  let Some(first) = entries.next().transpose()? else {
    return Ok(None);
  };
  if entries.next().is_some() || !first.file_type()?.is_dir() {
    return Ok(None);
  }
  Ok(Some(first.path()))
}
