//! Ordering of native dependency builds.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use super::DependencySpec;
use crate::error::{Error, Result};

/// Graph over every known [`DependencySpec`], edges pointing from a
/// prerequisite to the spec that needs it.
pub struct DependencyGraph {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
  specs: BTreeMap<String, DependencySpec>,
}

impl DependencyGraph {
  /// Build the graph, rejecting unknown prerequisites and cycles.
  pub fn new(specs: impl IntoIterator<Item = DependencySpec>) -> Result<Self> {
    let specs: BTreeMap<String, DependencySpec> = specs.into_iter().map(|s| (s.name.clone(), s)).collect();
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for name in specs.keys() {
      nodes.insert(name.clone(), graph.add_node(name.clone()));
    }

    for (name, spec) in &specs {
      for dep in &spec.depends_on {
        let Some(&from) = nodes.get(dep) else {
          return Err(Error::UnknownDependency {
            name: dep.clone(),
            required_by: name.clone(),
          });
        };
        graph.add_edge(from, nodes[name], ());
      }
    }

    let dag = Self { graph, nodes, specs };
    dag.order()?;
    Ok(dag)
  }

  fn order(&self) -> Result<Vec<NodeIndex>> {
    toposort(&self.graph, None).map_err(|cycle| Error::CycleDetected(self.graph[cycle.node_id()].clone()))
  }

  pub fn get(&self, name: &str) -> Option<&DependencySpec> {
    self.specs.get(name)
  }

  /// `roots` and everything they transitively need, prerequisites first.
  pub fn resolve_order(&self, roots: &BTreeSet<String>) -> Result<Vec<DependencySpec>> {
    let mut reachable = BTreeSet::new();
    for root in roots {
      let Some(&start) = self.nodes.get(root) else {
        return Err(Error::UnknownDependency {
          name: root.clone(),
          required_by: "python".to_string(),
        });
      };
      // Walk prerequisites by following edges backwards.
      let reversed = petgraph::visit::Reversed(&self.graph);
      let mut dfs = Dfs::new(reversed, start);
      while let Some(idx) = dfs.next(reversed) {
        reachable.insert(idx);
      }
    }

    Ok(
      self
        .order()?
        .into_iter()
        .filter(|idx| reachable.contains(idx))
        .filter_map(|idx| self.specs.get(&self.graph[idx]).cloned())
        .collect(),
    )
  }

  /// Group `order` into waves whose members only need earlier waves.
  pub fn waves(&self, order: &[DependencySpec]) -> Vec<Vec<String>> {
    let selected: BTreeSet<&str> = order.iter().map(|s| s.name.as_str()).collect();
    let mut level: BTreeMap<&str, usize> = BTreeMap::new();

    for spec in order {
      let Some(&idx) = self.nodes.get(&spec.name) else {
        continue;
      };
      let depth = self
        .graph
        .neighbors_directed(idx, Direction::Incoming)
        .map(|dep| self.graph[dep].as_str())
        .filter(|dep| selected.contains(dep))
        .filter_map(|dep| level.get(dep).map(|l| l + 1))
        .max()
        .unwrap_or(0);
      level.insert(spec.name.as_str(), depth);
    }

    let mut waves: Vec<Vec<String>> = Vec::new();
    for (name, depth) in level {
      if waves.len() <= depth {
        waves.resize(depth + 1, Vec::new());
      }
      waves[depth].push(name.to_string());
    }
    waves
  }
}
