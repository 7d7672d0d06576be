//! CLI output formatting utilities.
//!
//! Colored status lines, sizes and durations for terminal summaries. Machine
//! readable output goes through [`print_json`].

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const REMOVE: &str = "-";
}

pub fn truncate_hash(hash: &str) -> &str {
  let len = hash.len().min(12);
  &hash[..len]
}

/// Whole seconds only; sub-second precision is noise for a build.
pub fn format_duration(duration: Duration) -> String {
  if duration.as_secs() == 0 {
    return format!("{}ms", duration.subsec_millis());
  }
  humantime::format_duration(Duration::from_secs(duration.as_secs())).to_string()
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

/// One `- name` line per item under a dimmed heading; nothing when empty.
pub fn print_list<I, S>(heading: &str, items: I)
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let items: Vec<S> = items.into_iter().collect();
  if items.is_empty() {
    return;
  }
  println!("  {} ({})", heading.if_supports_color(Stream::Stdout, |s| s.dimmed()), items.len());
  for item in &items {
    println!("    {} {}", symbols::REMOVE, item.as_ref());
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}
