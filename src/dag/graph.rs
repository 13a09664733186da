// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::dag::declaration::{Declaration, parse_declarations};
use crate::errors::{FetchdagError, Result};
use crate::types::SourceName;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct prerequisites, in declared order.
    deps: Vec<SourceName>,
    /// Direct dependents: sources that list this one as a prerequisite.
    dependents: Vec<SourceName>,
    /// Tie-break when several nodes are ready at once; lower wins.
    rank: usize,
}

/// In-memory dependency graph keyed by source name.
///
/// Nodes are ranked by their first declaration. Names that only ever appear
/// as prerequisites become nodes with no prerequisites of their own, ranked
/// after every declared name in the order they were first listed, so that
/// the scheduler can still look up (and complain about) their providers.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<SourceName, DagNode>,
    /// Node names indexed by rank.
    ranked: Vec<SourceName>,
}

impl DagGraph {
    /// Parse declarations and build the graph.
    pub fn from_strs<S: AsRef<str>>(declarations: &[S]) -> Result<Self> {
        let parsed = parse_declarations(declarations)?;
        Ok(Self::from_declarations(&parsed))
    }

    /// Build a graph from already parsed declarations.
    ///
    /// A name declared twice keeps the rank of its first declaration but
    /// takes the edge list of its last one.
    pub fn from_declarations(declarations: &[Declaration]) -> Self {
        let mut graph = DagGraph::default();

        for decl in declarations {
            if !graph.insert_node(&decl.name) {
                warn!(
                    source = %decl.name,
                    "source declared more than once; the later declaration replaces its prerequisites"
                );
            }
            if let Some(node) = graph.nodes.get_mut(&decl.name) {
                node.deps = decl.prerequisites.clone();
            }
        }

        let implicit_from = graph.ranked.len();
        for decl in declarations {
            for dep in &decl.prerequisites {
                graph.insert_node(dep);
            }
        }
        if graph.ranked.len() > implicit_from {
            debug!(
                implicit = ?&graph.ranked[implicit_from..],
                "prerequisites without a declaration of their own"
            );
        }

        // Populate dependents from the final dependency lists.
        let names = graph.ranked.clone();
        for name in names {
            let deps = graph
                .nodes
                .get(&name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = graph.nodes.get_mut(&dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        graph
    }

    /// Add `name` with the next rank. Returns false if it already exists.
    fn insert_node(&mut self, name: &str) -> bool {
        if self.nodes.contains_key(name) {
            return false;
        }
        let rank = self.ranked.len();
        self.ranked.push(name.to_string());
        self.nodes.insert(
            name.to_string(),
            DagNode {
                deps: Vec::new(),
                dependents: Vec::new(),
                rank,
            },
        );
        true
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// All source names: declared ones in declaration order, then implicit
    /// ones.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.ranked.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate prerequisites of a source, in declared order.
    pub fn dependencies_of(&self, name: &str) -> &[SourceName] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a source.
    pub fn dependents_of(&self, name: &str) -> &[SourceName] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Kahn's algorithm. Among ready nodes the one declared earliest wins,
    /// so identical input always yields the identical order.
    pub fn topological_order(&self) -> Result<Vec<SourceName>> {
        let mut remaining: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.deps.len()))
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = self
            .nodes
            .values()
            .filter(|node| node.deps.is_empty())
            .map(|node| Reverse(node.rank))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(Reverse(rank)) = ready.pop() {
            let name = &self.ranked[rank];
            order.push(name.clone());

            for dependent in self.dependents_of(name) {
                if let Some(count) = remaining.get_mut(dependent.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        if let Some(node) = self.nodes.get(dependent) {
                            ready.push(Reverse(node.rank));
                        }
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            let placed: HashSet<&str> = order.iter().map(|s| s.as_str()).collect();
            let cycle = self.find_cycle(&placed);
            return Err(FetchdagError::CircularDependency(cycle.join(" -> ")));
        }

        debug!(?order, "computed topological order");
        Ok(order)
    }

    /// Walk prerequisites among unplaced nodes until a name repeats; the
    /// repeated stretch is a cycle.
    fn find_cycle(&self, placed: &HashSet<&str>) -> Vec<SourceName> {
        let Some(start) = self
            .ranked
            .iter()
            .find(|name| !placed.contains(name.as_str()))
        else {
            return Vec::new();
        };

        let mut path: Vec<SourceName> = Vec::new();
        let mut seen: HashMap<SourceName, usize> = HashMap::new();
        let mut current = start.clone();

        loop {
            if let Some(&idx) = seen.get(&current) {
                let mut cycle = path.split_off(idx);
                cycle.push(current);
                return cycle;
            }
            seen.insert(current.clone(), path.len());
            path.push(current.clone());

            // Every unplaced node has at least one unplaced prerequisite.
            let next = self
                .dependencies_of(&current)
                .iter()
                .find(|dep| !placed.contains(dep.as_str()));
            match next {
                Some(dep) => current = dep.clone(),
                None => return path,
            }
        }
    }
}
