//! Shared fixtures for the library integration tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use buildpy_lib::Error;
use buildpy_lib::process::{CommandOutput, Invocation, ProcessRunner};
use sha2::{Digest, Sha256};

type Hook = Box<dyn Fn(&Invocation) + Send + Sync>;

/// Records every invocation; fails or answers by substring of the command line.
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

  pub fn fail_when(mut self, needle: &str, code: i32) -> Self {
    self.failures.push((needle.to_string(), code));
    self
  }

  pub fn respond(mut self, needle: &str, stdout: &str) -> Self {
    self.responses.push((needle.to_string(), stdout.to_string()));
    self
  }

  pub fn on_run(mut self, hook: impl Fn(&Invocation) + Send + Sync + 'static) -> Self {
    self.hooks.push(Box::new(hook));
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_lines(&self) -> Vec<String> {
    self.calls().iter().map(Invocation::display).collect()
  }
}

impl ProcessRunner for FakeRunner {
  async fn run(&self, invocation: &Invocation) -> buildpy_lib::Result<CommandOutput> {
    self.calls.lock().unwrap().push(invocation.clone());
    let line = invocation.display();
    if let Some((_, code)) = self.failures.iter().find(|(n, _)| line.contains(n.as_str())) {
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
      .find(|(n, _)| line.contains(n.as_str()))
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

pub fn touch(root: &Path, rel: &str, contents: &str) {
  let path = root.join(rel);
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, contents).unwrap();
}

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
  builder.into_inner().unwrap().finish().unwrap().flush().unwrap();
}

/// A gzip tarball whose single member is written with a raw, unchecked name.
pub fn write_hostile_tar_gz(path: &Path, name: &str, contents: &str) {
  let file = std::fs::File::create(path).unwrap();
  let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
  let mut builder = tar::Builder::new(encoder);
  let mut header = tar::Header::new_gnu();
  let raw = &mut header.as_old_mut().name;
  raw[..name.len()].copy_from_slice(name.as_bytes());
  header.set_size(contents.len() as u64);
  header.set_mode(0o644);
  header.set_entry_type(tar::EntryType::Regular);
  header.set_cksum();
  builder.append(&header, contents.as_bytes()).unwrap();
  builder.into_inner().unwrap().finish().unwrap();
}

pub fn sha256_hex(path: &Path) -> String {
  hex::encode(Sha256::digest(std::fs::read(path).unwrap()))
}

pub fn file_url(path: &Path) -> String {
  format!("file://{}", path.display())
}

/// Name of the directory a command runs in, e.g. `bzip2-1.0.8`.
pub fn cwd_name(invocation: &Invocation) -> String {
  invocation
    .cwd
    .as_ref()
    .and_then(|c| c.file_name())
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default()
}

/// Runner that fakes the products every `make install` would leave behind.
pub fn installing_runner(install_root: PathBuf, python_prefix: PathBuf, version: &str) -> FakeRunner {
  FakeRunner::new()
    .respond("--version", &format!("Python {version}"))
    .on_run(move |inv| {
      if inv.program != "make" || !inv.args.iter().any(|a| a.starts_with("install")) {
        return;
      }
      let dir = cwd_name(inv);
      if dir.starts_with("bzip2-") {
        touch(&install_root.join("bzip2"), "lib/libbz2.a", "");
      } else if dir.starts_with("xz-") {
        touch(&install_root.join("xz"), "lib/liblzma.a", "");
      } else if dir.starts_with("openssl-") {
        touch(&install_root.join("openssl"), "lib/libssl.a", "");
        touch(&install_root.join("openssl"), "lib/libcrypto.a", "");
      } else if dir.starts_with("Python-") {
        touch(&python_prefix, "bin/python3", "#!/bin/sh\n");
        touch(&python_prefix, "lib/python3.13/os.py", "");
      }
    })
}
