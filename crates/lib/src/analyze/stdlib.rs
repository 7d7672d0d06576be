//! Standard-library tables for 3.11 to 3.14.

use std::collections::BTreeSet;

/// Top-level standard-library module names, including the private C modules.
pub const STDLIB_MODULES: &[&str] = &[
  "__future__", "_abc", "_asyncio", "_bisect", "_blake2", "_bz2", "_codecs", "_collections",
  "_contextvars", "_csv", "_ctypes", "_datetime", "_decimal", "_elementtree", "_functools",
  "_hashlib", "_heapq", "_hmac", "_io", "_json", "_locale", "_lsprof", "_lzma", "_md5",
  "_multibytecodec", "_multiprocessing", "_opcode", "_operator", "_pickle", "_posixshmem",
  "_posixsubprocess", "_queue", "_random", "_sha1", "_sha2", "_sha256", "_sha3", "_sha512",
  "_signal", "_socket", "_sqlite3", "_sre", "_ssl", "_stat", "_statistics", "_struct",
  "_symtable", "_thread", "_tracemalloc", "_typing", "_uuid", "_weakref", "_zoneinfo",
  "abc", "aifc", "argparse", "array", "ast", "asyncio", "atexit", "base64", "bdb", "binascii",
  "bisect", "builtins", "bz2", "calendar", "cgi", "cgitb", "chunk", "cmath", "cmd", "code",
  "codecs", "codeop", "collections", "colorsys", "compileall", "concurrent", "configparser",
  "contextlib", "contextvars", "copy", "copyreg", "cProfile", "crypt", "csv", "ctypes", "curses",
  "dataclasses", "datetime", "dbm", "decimal", "difflib", "dis", "doctest", "email", "encodings",
  "enum", "errno", "faulthandler", "fcntl", "filecmp", "fileinput", "fnmatch", "fractions",
  "ftplib", "functools", "gc", "getopt", "getpass", "gettext", "glob", "graphlib", "grp", "gzip",
  "hashlib", "heapq", "hmac", "html", "http", "idlelib", "imaplib", "imghdr", "importlib",
  "inspect", "io", "ipaddress", "itertools", "json", "keyword", "lib2to3", "linecache", "locale",
  "logging", "lzma", "mailbox", "mailcap", "marshal", "math", "mimetypes", "mmap",
  "modulefinder", "msvcrt", "multiprocessing", "netrc", "nis", "nntplib", "nt", "ntpath",
  "numbers", "opcode", "operator", "optparse", "os", "ossaudiodev", "pathlib", "pdb", "pickle",
  "pickletools", "pipes", "pkgutil", "platform", "plistlib", "poplib", "posix", "posixpath",
  "pprint", "profile", "pstats", "pty", "pwd", "py_compile", "pyclbr", "pydoc", "pyexpat",
  "queue", "quopri", "random", "re", "readline", "reprlib", "resource", "rlcompleter", "runpy",
  "sched", "secrets", "select", "selectors", "shelve", "shlex", "shutil", "signal", "site",
  "smtpd", "smtplib", "sndhdr", "socket", "socketserver", "spwd", "sqlite3", "sre_compile",
  "sre_constants", "sre_parse", "ssl", "stat", "statistics", "string", "stringprep", "struct",
  "subprocess", "sunau", "symtable", "sys", "sysconfig", "syslog", "tabnanny", "tarfile",
  "telnetlib", "tempfile", "termios", "test", "textwrap", "threading", "time", "timeit",
  "tkinter", "token", "tokenize", "tomllib", "trace", "traceback", "tracemalloc", "tty",
  "turtle", "turtledemo", "types", "typing", "unicodedata", "unittest", "urllib", "uu", "uuid",
  "venv", "warnings", "wave", "weakref", "webbrowser", "winreg", "winsound", "wsgiref", "xdrlib",
  "xml", "xmlrpc", "zipapp", "zipfile", "zipimport", "zlib", "zoneinfo",
];

/// Native extension modules backing a standard-library module.
///
/// Includes known transitive needs, e.g. `inspect` reaches `_opcode` through `dis`.
pub const STDLIB_TO_EXTENSION: &[(&str, &[&str])] = &[
  ("array", &["array"]),
  ("asyncio", &["_asyncio"]),
  ("binascii", &["binascii"]),
  ("bisect", &["_bisect"]),
  ("bz2", &["_bz2"]),
  ("collections", &["_collections"]),
  ("contextvars", &["_contextvars"]),
  ("csv", &["_csv"]),
  ("ctypes", &["_ctypes"]),
  ("datetime", &["_datetime"]),
  ("decimal", &["_decimal"]),
  ("dis", &["_opcode"]),
  ("fcntl", &["fcntl"]),
  ("functools", &["_functools"]),
  ("grp", &["grp"]),
  ("hashlib", &["_hashlib", "_md5", "_sha1", "_sha2", "_sha3", "_blake2"]),
  ("heapq", &["_heapq"]),
  ("hmac", &["_hashlib", "_hmac"]),
  ("inspect", &["_opcode"]),
  ("itertools", &["itertools"]),
  ("json", &["_json"]),
  ("lzma", &["_lzma"]),
  ("math", &["math", "cmath"]),
  ("mmap", &["mmap"]),
  ("multiprocessing", &["_multiprocessing", "_posixshmem"]),
  ("pickle", &["_pickle"]),
  ("pwd", &["pwd"]),
  ("random", &["_random", "_sha2"]),
  ("readline", &["readline"]),
  ("select", &["select"]),
  ("socket", &["_socket", "select"]),
  ("sqlite3", &["_sqlite3"]),
  ("ssl", &["_ssl"]),
  ("statistics", &["_statistics"]),
  ("struct", &["_struct"]),
  ("subprocess", &["_posixsubprocess", "select", "fcntl"]),
  ("typing", &["_typing"]),
  ("unicodedata", &["unicodedata"]),
  ("uuid", &["_uuid"]),
  ("xml", &["_elementtree", "pyexpat"]),
  ("zlib", &["zlib"]),
  ("zoneinfo", &["_zoneinfo"]),
];

/// Standard-library packages that live as directories under `lib/python3.X`.
pub const STDLIB_PACKAGE_DIRS: &[&str] = &[
  "_pyrepl", "asyncio", "collections", "concurrent", "ctypes", "curses", "dbm", "email",
  "encodings", "ensurepip", "html", "http", "idlelib", "importlib", "json", "lib2to3", "logging",
  "multiprocessing", "pathlib", "pydoc_data", "re", "sqlite3", "sysconfig", "tkinter", "tomllib",
  "turtledemo", "unittest", "urllib", "venv", "wsgiref", "xml", "xmlrpc", "zipfile", "zoneinfo",
];

/// Package directories a stdlib module pulls in when imported.
const STDLIB_DIR_DEPENDS: &[(&str, &[&str])] = &[
  ("asyncio", &["concurrent", "collections"]),
  ("concurrent", &["multiprocessing"]),
  ("ctypes", &["re"]),
  ("email", &["urllib", "re", "encodings"]),
  ("http", &["email", "urllib", "html"]),
  ("importlib", &["zipfile"]),
  ("json", &["re"]),
  ("logging", &["re", "string"]),
  ("multiprocessing", &["concurrent"]),
  ("sqlite3", &["collections"]),
  ("unittest", &["re", "logging"]),
  ("urllib", &["email", "http"]),
  ("xml", &["re"]),
  ("xmlrpc", &["xml", "http", "urllib"]),
  ("zipfile", &["importlib", "re"]),
  ("zoneinfo", &["importlib"]),
];

pub fn is_stdlib(module: &str) -> bool {
  STDLIB_MODULES.contains(&module)
}

/// Extensions required by importing `module`: its table entry, or itself for a private C module.
pub fn extensions_for(module: &str) -> Vec<&'static str> {
  let mut out: Vec<&'static str> = STDLIB_TO_EXTENSION
    .iter()
    .find(|(name, _)| *name == module)
    .map(|(_, exts)| exts.to_vec())
    .unwrap_or_default();
  if module.starts_with('_')
    && let Some(known) = STDLIB_MODULES.iter().find(|m| **m == module)
  {
    out.push(known);
  }
  out
}

/// Stdlib package directories reachable from `modules`.
pub fn required_dirs<'a>(modules: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
  let mut seen = BTreeSet::new();
  let mut queue: Vec<String> = modules.into_iter().map(str::to_string).collect();
  while let Some(module) = queue.pop() {
    if !seen.insert(module.clone()) {
      continue;
    }
    if let Some((_, deps)) = STDLIB_DIR_DEPENDS.iter().find(|(name, _)| *name == module) {
      queue.extend(deps.iter().map(|d| d.to_string()));
    }
  }
  seen.retain(|m| STDLIB_PACKAGE_DIRS.contains(&m.as_str()));
  seen
}
