//! Small filesystem helpers used by the build stages.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Remove a file, symlink or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
  match fs::symlink_metadata(path) {
    Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
    Ok(_) => fs::remove_file(path),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e),
  }
}

/// Move `from` to `to`, creating the parent of `to`.
///
/// Falls back to copy-and-delete when a rename crosses filesystems.
pub fn move_path(from: &Path, to: &Path) -> io::Result<()> {
  if let Some(parent) = to.parent() {
    fs::create_dir_all(parent)?;
  }
  match fs::rename(from, to) {
    Ok(()) => Ok(()),
    Err(_) if from.is_dir() => {
      copy_tree(from, to)?;
      fs::remove_dir_all(from)
    }
    Err(_) => {
      fs::copy(from, to)?;
      fs::remove_file(from)
    }
  }
}

/// Recursively copy `src` into `dst`, preserving symlinks on Unix.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
  for entry in WalkDir::new(src).follow_links(false) {
    let entry = entry.map_err(io::Error::other)?;
    let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
    let target = dst.join(rel);
    let file_type = entry.file_type();

    if file_type.is_dir() {
      fs::create_dir_all(&target)?;
    } else if file_type.is_symlink() {
      #[cfg(unix)]
      {
        let link = fs::read_link(entry.path())?;
        std::os::unix::fs::symlink(link, &target)?;
      }
      #[cfg(not(unix))]
      {
        fs::copy(entry.path(), &target)?;
      }
    } else {
      fs::copy(entry.path(), &target)?;
    }
  }
  Ok(())
}

/// Total size in bytes of regular files under `path` (or of `path` itself).
pub fn dir_size(path: &Path) -> u64 {
  WalkDir::new(path)
    .follow_links(false)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_file())
    .filter_map(|e| e.metadata().ok())
    .map(|m| m.len())
    .sum()
}

/// Collapse `.` and `..` components without touching the filesystem.
///
/// Returns `None` if a `..` would climb above the first component.
pub fn normalize_lexically(path: &Path) -> Option<PathBuf> {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => match out.components().next_back() {
        Some(Component::Normal(_)) => {
          out.pop();
        }
        _ => return None,
      },
      other => out.push(other.as_os_str()),
    }
  }
  Some(out)
}

/// Path of `to` relative to the directory `from_dir`, e.g. `bin` → `lib/x` gives `../lib/x`.
///
/// Both paths must be absolute (or both relative to the same base). Returns
/// `None` when no relative path exists, such as across Windows drive prefixes.
pub fn relative_path(from_dir: &Path, to: &Path) -> Option<PathBuf> {
  let from = normalize_lexically(from_dir)?;
  let to = normalize_lexically(to)?;
  if from.is_absolute() != to.is_absolute() {
    return None;
  }

  let from_parts: Vec<_> = from.components().collect();
  let to_parts: Vec<_> = to.components().collect();
  if let (Some(Component::Prefix(a)), Some(Component::Prefix(b))) = (from_parts.first(), to_parts.first())
    && a != b
  {
    return None;
  }

  let common = from_parts.iter().zip(&to_parts).take_while(|(a, b)| a == b).count();
  let mut rel = PathBuf::new();
  for _ in common..from_parts.len() {
    rel.push("..");
  }
  for part in &to_parts[common..] {
    rel.push(part.as_os_str());
  }
  Some(rel)
}

/// Render a relative path with forward slashes, as loader paths require.
pub fn to_slash(path: &Path) -> String {
  path
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join("/")
}

/// Compile file-name globs (`turtle*`, `_test*`) into one matcher.
pub fn name_matcher<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    let pattern = pattern.as_ref();
    let glob = Glob::new(pattern).map_err(|e| Error::InvalidPattern {
      pattern: pattern.to_string(),
      message: e.to_string(),
    })?;
    builder.add(glob);
  }
  builder.build().map_err(|e| Error::InvalidPattern {
    pattern: patterns.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(","),
    message: e.to_string(),
  })
}

/// Delete every entry under `root` whose file name matches `matcher`.
///
/// A matching directory is removed whole and not descended into. Directories
/// named in `skip_dirs` are left untouched. Returns the removed paths in walk order.
pub fn remove_matching(root: &Path, matcher: &GlobSet, skip_dirs: &[&str]) -> Result<Vec<PathBuf>> {
  if !root.is_dir() {
    return Ok(Vec::new());
  }
  let mut matched = Vec::new();
  let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
  while let Some(entry) = walker.next() {
    let entry = entry.map_err(io::Error::other)?;
    let name = entry.file_name().to_string_lossy();
    let is_dir = entry.file_type().is_dir();
    if is_dir && skip_dirs.contains(&name.as_ref()) {
      walker.skip_current_dir();
      continue;
    }
    if matcher.is_match(name.as_ref()) {
      if is_dir {
        walker.skip_current_dir();
      }
      matched.push(entry.path().to_path_buf());
    }
  }
  for path in &matched {
    remove_path(path)?;
  }
  Ok(matched)
}
