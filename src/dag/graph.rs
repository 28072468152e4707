// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::config::model::{ConfigFile, TargetConfig};
use crate::dag::target::{Target, TargetName};
use crate::errors::{GeocompileError, Result};

/// Dependency graph of targets.
///
/// Targets live in a `petgraph` arena; node indices follow insertion order,
/// which is what topological ties are broken on. Internally an edge points
/// from a prerequisite to its dependent. All mutation happens before a run
/// starts, so the scheduler can share the graph behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct TargetGraph {
    graph: DiGraph<Target, ()>,
    index: HashMap<TargetName, NodeIndex>,
}

impl TargetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph described by a validated [`ConfigFile`].
    ///
    /// Targets are registered in name order, then every `after` edge is added
    /// with the usual duplicate and cycle checks.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Self::from_target_configs(&cfg.target)
    }

    pub(crate) fn from_target_configs(targets: &BTreeMap<String, TargetConfig>) -> Result<Self> {
        let mut graph = Self::new();

        for (name, tc) in targets.iter() {
            graph.add_target(tc.to_target(name))?;
        }

        for (name, tc) in targets.iter() {
            for dep in tc.after.iter() {
                graph.add_dependency(name, dep)?;
            }
        }

        Ok(graph)
    }

    /// Register a target. Fails if the name is already taken.
    pub fn add_target(&mut self, target: Target) -> Result<()> {
        if self.index.contains_key(&target.name) {
            return Err(GeocompileError::DuplicateTarget(target.name));
        }
        let name = target.name.clone();
        let idx = self.graph.add_node(target);
        self.index.insert(name, idx);
        Ok(())
    }

    /// Record that `from` requires `to` to be up to date first.
    ///
    /// Rejected, leaving the graph untouched, when the edge would close a
    /// cycle, i.e. when `from` is already a (transitive) prerequisite of `to`.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<()> {
        let from_idx = self.node(from)?;
        let to_idx = self.node(to)?;

        if self.graph.find_edge(to_idx, from_idx).is_some() {
            return Ok(());
        }

        if from_idx == to_idx || has_path_connecting(&self.graph, from_idx, to_idx, None) {
            return Err(GeocompileError::CycleDetected {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.graph.add_edge(to_idx, from_idx, ());
        debug!(from = %from, to = %to, "added dependency edge");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|idx| &self.graph[*idx])
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct prerequisites of `name`, in registration order.
    pub fn prerequisites_of(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, Direction::Incoming)
    }

    /// Direct dependents of `name`, in registration order.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, Direction::Outgoing)
    }

    /// Every target that (transitively) depends on `name`, nearest first.
    pub fn transitive_dependents(&self, name: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(name) else {
            return Vec::new();
        };

        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);
        let mut out = Vec::new();

        while let Some(idx) = queue.pop_front() {
            for next in self.sorted_neighbours(idx, Direction::Outgoing) {
                if seen.insert(next) {
                    out.push(self.graph[next].name.as_str());
                    queue.push_back(next);
                }
            }
        }

        out
    }

    /// The given targets plus all of their transitive prerequisites.
    pub fn prerequisite_closure<S: AsRef<str>>(&self, names: &[S]) -> Result<HashSet<TargetName>> {
        let mut stack = Vec::new();
        for name in names {
            stack.push(self.node(name.as_ref())?);
        }

        let mut closure = HashSet::new();
        while let Some(idx) = stack.pop() {
            if closure.insert(self.graph[idx].name.clone()) {
                stack.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
            }
        }

        Ok(closure)
    }

    /// Deterministic total order with every prerequisite ahead of its
    /// dependents. Ties go to the target registered first.
    pub fn topological_order(&self) -> Vec<&str> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BTreeSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());

        while let Some(idx) = ready.pop_first() {
            order.push(self.graph[idx].name.as_str());
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let deg = &mut in_degree[next.index()];
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(next);
                }
            }
        }

        order
    }

    /// All registered targets, in registration order.
    pub fn vertices(&self) -> impl Iterator<Item = &Target> {
        self.graph.node_indices().map(|idx| &self.graph[idx])
    }

    /// All edges as `(dependent, prerequisite)` pairs, matching
    /// [`add_dependency`](Self::add_dependency)'s argument order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph.raw_edges().iter().map(|edge| {
            (
                self.graph[edge.target()].name.as_str(),
                self.graph[edge.source()].name.as_str(),
            )
        })
    }

    fn node(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GeocompileError::UnknownTarget(name.to_string()))
    }

    fn neighbours(&self, name: &str, dir: Direction) -> Vec<&str> {
        match self.index.get(name) {
            Some(&idx) => self
                .sorted_neighbours(idx, dir)
                .into_iter()
                .map(|n| self.graph[n].name.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    fn sorted_neighbours(&self, idx: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
        out.sort();
        out
    }
}
