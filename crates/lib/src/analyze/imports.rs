//! Static import scanner for Python source.
//!
//! Works on text only, nothing is executed. The source is first folded into
//! logical lines: comments go, string literals collapse to `""`, and lines
//! joined by a backslash or an open bracket become one. Each logical line is
//! then split on `;`, compound-statement headers (`try:`, `if x:` ...) are
//! peeled off, and what remains is parsed if it is an import.

use serde::{Deserialize, Serialize};

/// One imported module.
///
/// `import a.b, c` yields two statements. `from ..pkg import x, y` yields one
/// with `level == 2`, `module == "pkg"` and `names == ["x", "y"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStmt {
  pub module: String,
  /// Leading dots of a relative import. Zero for absolute imports.
  pub level: usize,
  /// Names after `from ... import`. Empty for a plain `import`.
  pub names: Vec<String>,
}

impl ImportStmt {
  pub fn is_relative(&self) -> bool {
    self.level > 0
  }

  /// First component of an absolute import.
  pub fn top_level(&self) -> Option<&str> {
    if self.is_relative() || self.module.is_empty() {
      return None;
    }
    self.module.split('.').next()
  }
}

const HEADER_KEYWORDS: &[&str] = &[
  "async", "class", "def", "elif", "else", "except", "finally", "for", "if", "try", "while", "with",
];

/// Every import statement in `source`, in order of appearance.
pub fn scan_imports(source: &str) -> Vec<ImportStmt> {
  let mut out = Vec::new();
  for line in logical_lines(source) {
    for statement in line.split(';') {
      out.extend(parse_statement(strip_headers(statement)));
    }
  }
  out
}

fn logical_lines(source: &str) -> Vec<String> {
  let chars: Vec<char> = source.chars().collect();
  let mut lines = Vec::new();
  let mut current = String::new();
  let mut depth = 0usize;
  let mut i = 0;

  while i < chars.len() {
    let c = chars[i];
    match c {
      '#' => {
        while i < chars.len() && chars[i] != '\n' {
          i += 1;
        }
        continue;
      }
      '\\' if chars.get(i + 1) == Some(&'\n') => {
        current.push(' ');
        i += 2;
        continue;
      }
      '\\' if chars.get(i + 1) == Some(&'\r') && chars.get(i + 2) == Some(&'\n') => {
        current.push(' ');
        i += 3;
        continue;
      }
      '\'' | '"' => {
        i = skip_string(&chars, i);
        current.push_str("\"\"");
        continue;
      }
      '(' | '[' | '{' => depth += 1,
      ')' | ']' | '}' => depth = depth.saturating_sub(1),
      '\n' => {
        if depth == 0 {
          flush(&mut lines, &mut current);
        } else {
          current.push(' ');
        }
        i += 1;
        continue;
      }
      _ => {}
    }
    current.push(c);
    i += 1;
  }
  flush(&mut lines, &mut current);
  lines
}

fn flush(lines: &mut Vec<String>, current: &mut String) {
  let line = std::mem::take(current);
  if !line.trim().is_empty() {
    lines.push(line);
  }
}

/// Index just past the string literal opening at `start`.
///
/// An unterminated single-quoted string ends at the newline.
fn skip_string(chars: &[char], start: usize) -> usize {
  let quote = chars[start];
  let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
  let mut i = start + if triple { 3 } else { 1 };
  while i < chars.len() {
    let c = chars[i];
    if c == '\\' {
      i += 2;
      continue;
    }
    if triple {
      if c == quote && chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
        return i + 3;
      }
    } else if c == quote {
      return i + 1;
    } else if c == '\n' {
      return i;
    }
    i += 1;
  }
  chars.len()
}

/// Drop leading `if x:` / `try:` / `def f():` headers from a one-line compound statement.
fn strip_headers(statement: &str) -> &str {
  let mut s = statement.trim();
  loop {
    let word = s
      .split(|c: char| !(c.is_alphanumeric() || c == '_'))
      .next()
      .unwrap_or("");
    if !HEADER_KEYWORDS.contains(&word) {
      return s;
    }
    match top_level_colon(s) {
      Some(pos) => s = s[pos + 1..].trim_start(),
      None => return s,
    }
  }
}

fn top_level_colon(s: &str) -> Option<usize> {
  let mut depth = 0usize;
  for (i, c) in s.char_indices() {
    match c {
      '(' | '[' | '{' => depth += 1,
      ')' | ']' | '}' => depth = depth.saturating_sub(1),
      ':' if depth == 0 => return Some(i),
      _ => {}
    }
  }
  None
}

fn parse_statement(s: &str) -> Vec<ImportStmt> {
  if let Some(rest) = after_keyword(s, "import") {
    return rest
      .split(',')
      .filter_map(|part| part.split_whitespace().next())
      .filter(|name| is_dotted_name(name))
      .map(|name| ImportStmt {
        module: name.to_string(),
        level: 0,
        names: Vec::new(),
      })
      .collect();
  }

  let Some(rest) = after_keyword(s, "from") else {
    return Vec::new();
  };
  let Some((source, names)) = split_at_import(rest) else {
    return Vec::new();
  };
  let source = source.trim();
  let module = source.trim_start_matches('.');
  let level = source.len() - module.len();
  let module = module.trim();
  if !(module.is_empty() && level > 0) && !is_dotted_name(module) {
    return Vec::new();
  }

  let names = names
    .trim()
    .trim_start_matches('(')
    .trim_end_matches(')')
    .split(',')
    .filter_map(|part| part.split_whitespace().next())
    .filter(|name| *name == "*" || is_dotted_name(name))
    .map(str::to_string)
    .collect();
  vec![ImportStmt {
    module: module.to_string(),
    level,
    names,
  }]
}

/// Text after `keyword` when `s` starts with it as a whole word.
fn after_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
  let rest = s.strip_prefix(keyword)?;
  match rest.chars().next() {
    Some(c) if c.is_whitespace() => Some(rest),
    Some('.') if keyword == "from" => Some(rest),
    _ => None,
  }
}

/// Split `..pkg import a, b` into its source and name list.
fn split_at_import(rest: &str) -> Option<(&str, &str)> {
  for (i, _) in rest.match_indices("import") {
    let before = rest[..i].chars().next_back();
    let after = rest[i + "import".len()..].chars().next();
    let starts_word = before.is_none_or(|c| c.is_whitespace() || c == '.');
    let ends_word = after.is_some_and(|c| c.is_whitespace() || c == '(');
    if starts_word && ends_word {
      return Some((&rest[..i], &rest[i + "import".len()..]));
    }
  }
  None
}

fn is_dotted_name(s: &str) -> bool {
  !s.is_empty()
    && s.split('.').all(|part| {
      let mut chars = part.chars();
      chars.next().is_some_and(|c| c.is_alphabetic() || c == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
    })
}
