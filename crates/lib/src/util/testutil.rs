//! Test utilities for buildpy-lib.
//!
//! Provides a recording [`ProcessRunner`] so build stages can be exercised
//! without compilers, plus small fixture builders for archives and trees.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::process::{CommandOutput, Invocation, ProcessRunner};

type Hook = Box<dyn Fn(&Invocation) + Send + Sync>;

/// Records every invocation and answers from canned rules.
#[derive(Default)]
pub struct FakeRunner {
  calls: Mutex<Vec<Invocation>>,
  failures: Vec<(String, i32)>,
  responses: Vec<(String, String)>,
  hooks: Vec<Hook>,
}

impl FakeRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fail any command whose display string contains `needle`.
  pub fn fail_when(mut self, needle: &str, code: i32) -> Self {
    self.failures.push((needle.to_string(), code));
    self
  }

  /// Reply with `stdout` to any command whose display string contains `needle`.
  pub fn respond(mut self, needle: &str, stdout: &str) -> Self {
    self.responses.push((needle.to_string(), stdout.to_string()));
    self
  }

  /// Run `hook` for every successful invocation, e.g. to fake install products.
  pub fn on_run(mut self, hook: impl Fn(&Invocation) + Send + Sync + 'static) -> Self {
    self.hooks.push(Box::new(hook));
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().map(|c| c.clone()).unwrap_or_default()
  }

  pub fn call_lines(&self) -> Vec<String> {
    self.calls().iter().map(Invocation::display).collect()
  }
}

impl ProcessRunner for FakeRunner {
  async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
    if let Ok(mut calls) = self.calls.lock() {
      calls.push(invocation.clone());
    }
    let line = invocation.display();

    if let Some((_, code)) = self.failures.iter().find(|(needle, _)| line.contains(needle.as_str())) {
      return Err(Error::CmdFailed {
        cmd: line,
        code: Some(*code),
        stderr: "simulated failure".to_string(),
      });
    }

    for hook in &self.hooks {
      hook(invocation);
    }

    let stdout = self
      .responses
      .iter()
      .find(|(needle, _)| line.contains(needle.as_str()))
      .map(|(_, out)| out.clone())
      .or_else(|| imports_all_ok(invocation))
      .unwrap_or_default();

    Ok(CommandOutput {
      code: Some(0),
      stdout,
      stderr: String::new(),
    })
  }
}

/// Stdout of the validator's import script when every module imports.
fn imports_all_ok(invocation: &Invocation) -> Option<String> {
  let script = invocation.args.iter().find(|a| a.contains("importlib.import_module"))?;
  let start = script.find("for name in [")? + "for name in [".len();
  let end = start + script[start..].find("]:")?;
  let lines: Vec<String> = script[start..end]
    .split(", ")
    .map(|name| format!("ok:{}", name.trim_matches('"')))
    .collect();
  Some(lines.join("\n"))
}

/// Write a gzip tarball at `path` whose entries are `(name, contents)`.
pub fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
  let file = std::fs::File::create(path).unwrap();
  let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
  let mut builder = tar::Builder::new(encoder);
  for (name, contents) in entries {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, contents.as_bytes()).unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap();
}

/// Write a zip archive at `path` whose entries are `(name, contents)`.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
  let file = std::fs::File::create(path).unwrap();
  let mut writer = zip::ZipWriter::new(file);
  let options = zip::write::SimpleFileOptions::default();
  for (name, contents) in entries {
    writer.start_file(*name, options).unwrap();
    writer.write_all(contents.as_bytes()).unwrap();
  }
  writer.finish().unwrap();
}

/// One member of a zip written by [`write_zip_members`].
pub enum ZipMember<'a> {
  File(&'a str, &'a str),
  Dir(&'a str),
  Symlink(&'a str, &'a str),
}

/// Write a zip archive that may hold directory and symlink members.
pub fn write_zip_members(path: &Path, members: &[ZipMember<'_>]) {
  let file = std::fs::File::create(path).unwrap();
  let mut writer = zip::ZipWriter::new(file);
  let options = zip::write::SimpleFileOptions::default();
  for member in members {
    match member {
      ZipMember::File(name, contents) => {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
      }
      ZipMember::Dir(name) => writer.add_directory(*name, options).unwrap(),
      ZipMember::Symlink(name, target) => writer.add_symlink(*name, *target, options).unwrap(),
    }
  }
  writer.finish().unwrap();
}

/// Create `rel` under `root` with `contents`, making parent directories.
pub fn touch(root: &Path, rel: &str, contents: &str) {
  let path = root.join(rel);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, contents).unwrap();
}

/// A tar member written without the path sanitising `tar::Builder` applies.
pub struct RawEntry<'a> {
  pub name: &'a str,
  pub contents: &'a str,
  pub symlink_to: Option<&'a str>,
}

impl<'a> RawEntry<'a> {
  pub fn file(name: &'a str, contents: &'a str) -> Self {
    Self {
      name,
      contents,
      symlink_to: None,
    }
  }

  pub fn symlink(name: &'a str, target: &'a str) -> Self {
    Self {
      name,
      contents: "",
      symlink_to: Some(target),
    }
  }
}

/// Write an uncompressed tarball with names copied verbatim into the headers.
pub fn write_raw_tar(path: &Path, entries: &[RawEntry<'_>]) {
  let file = std::fs::File::create(path).unwrap();
  let mut builder = tar::Builder::new(file);
  for entry in entries {
    let mut header = tar::Header::new_old();
    let name = entry.name.as_bytes();
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_mode(0o644);
    match entry.symlink_to {
      Some(target) => {
        let target = target.as_bytes();
        header.as_old_mut().linkname[..target.len()].copy_from_slice(target);
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
      }
      None => {
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(entry.contents.len() as u64);
      }
    }
    header.set_cksum();
    builder.append(&header, entry.contents.as_bytes()).unwrap();
  }
  builder.finish().unwrap();
}
