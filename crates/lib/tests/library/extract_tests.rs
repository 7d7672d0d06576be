//! Archive extraction never writes outside its destination.

use buildpy_lib::Error;
use buildpy_lib::extract::{ExtractOptions, SafeExtractor, is_extracted};
use tempfile::TempDir;

use super::common::{write_hostile_tar_gz, write_tar_gz};

#[test]
fn parent_traversal_is_rejected() {
  let temp = TempDir::new().unwrap();
  let archive = temp.path().join("evil.tar.gz");
  write_hostile_tar_gz(&archive, "../escaped.txt", "pwned");
  let dest = temp.path().join("out/src");

  let err = SafeExtractor
    .extract(&archive, &dest, ExtractOptions::default())
    .unwrap_err();
  assert!(matches!(err, Error::UnsafeArchiveMember { .. }));
  assert!(!temp.path().join("out/escaped.txt").exists());
  assert!(!temp.path().join("escaped.txt").exists());
  assert!(!dest.exists());
}

#[test]
fn absolute_member_is_rejected() {
  let temp = TempDir::new().unwrap();
  let archive = temp.path().join("abs.tar.gz");
  write_hostile_tar_gz(&archive, "/tmp/buildpy-absolute.txt", "x");
  let dest = temp.path().join("src");

  let err = SafeExtractor
    .extract(&archive, &dest, ExtractOptions::default())
    .unwrap_err();
  assert!(matches!(err, Error::UnsafeArchiveMember { .. }));
  assert!(!is_extracted(&dest));
}

#[test]
fn marked_tree_is_reused_until_reset() {
  let temp = TempDir::new().unwrap();
  let archive = temp.path().join("pkg-1.0.tar.gz");
  write_tar_gz(&archive, &[("pkg-1.0/README", "hello")]);
  let dest = temp.path().join("pkg");
  let options = ExtractOptions {
    reset: false,
    strip_single_root: true,
  };

  SafeExtractor.extract(&archive, &dest, options).unwrap();
  assert!(is_extracted(&dest));
  std::fs::write(dest.join("local-edit"), "kept").unwrap();

  SafeExtractor.extract(&archive, &dest, options).unwrap();
  assert!(dest.join("local-edit").exists());

  SafeExtractor
    .extract(&archive, &dest, ExtractOptions { reset: true, ..options })
    .unwrap();
  assert!(!dest.join("local-edit").exists());
  assert_eq!(std::fs::read_to_string(dest.join("README")).unwrap(), "hello");
}
