//! Dependency graph ordering.

use std::collections::BTreeSet;

use buildpy_lib::Error;
use buildpy_lib::deps::{DependencyGraph, DependencySpec};

fn names(order: &[DependencySpec]) -> Vec<&str> {
  order.iter().map(|s| s.name.as_str()).collect()
}

fn roots(names: &[&str]) -> BTreeSet<String> {
  names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn prerequisites_come_first() {
  let graph = DependencyGraph::new([
    DependencySpec::new("app", "1", "file:///app.tgz").depends_on("zlib").depends_on("ssl"),
    DependencySpec::new("ssl", "1", "file:///ssl.tgz").depends_on("zlib"),
    DependencySpec::new("zlib", "1", "file:///zlib.tgz"),
  ])
  .unwrap();
  let order = graph.resolve_order(&roots(&["app"])).unwrap();
  assert_eq!(names(&order), ["zlib", "ssl", "app"]);
  assert_eq!(graph.waves(&order), vec![vec!["zlib"], vec!["ssl"], vec!["app"]]);
}

#[test]
fn only_requested_closure_is_built() {
  let graph = DependencyGraph::new(DependencySpec::defaults()).unwrap();
  let order = graph.resolve_order(&roots(&["xz"])).unwrap();
  assert_eq!(names(&order), ["xz"]);
}

#[test]
fn cycles_are_rejected() {
  let result = DependencyGraph::new([
    DependencySpec::new("a", "1", "file:///a").depends_on("b"),
    DependencySpec::new("b", "1", "file:///b").depends_on("a"),
  ])
  .and_then(|g| g.resolve_order(&roots(&["a"])));
  assert!(matches!(result, Err(Error::CycleDetected(_))));
}

#[test]
fn unknown_root_is_an_error() {
  let graph = DependencyGraph::new(DependencySpec::defaults()).unwrap();
  assert!(matches!(
    graph.resolve_order(&roots(&["sqlite"])),
    Err(Error::UnknownDependency { .. })
  ));
}
