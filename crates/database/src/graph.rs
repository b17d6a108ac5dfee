//! Dependency edges between tables and live views.
//!
//! An edge `from -> to` means a change of `from` must reach `to`. Edges come
//! from three places: a view reads its source table, a materialized table
//! mirrors its view, and a resolve column reads its target. Nodes are
//! addressed by name so an edge may point at an entity that does not exist
//! yet; the edge starts carrying changes once the entity is created.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::{HashMap, HashSet};
use horizon_core::{Error, Result};

/// A table or live view, by registry name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Table(String),
    Session(String),
}

impl Node {
    pub fn table(name: impl Into<String>) -> Self {
        Node::Table(name.into())
    }

    pub fn session(name: impl Into<String>) -> Self {
        Node::Session(name.into())
    }

    /// Registry name of the entity.
    pub fn name(&self) -> &str {
        match self {
            Node::Table(name) | Node::Session(name) => name,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Table(name) => write!(f, "table {}", name),
            Node::Session(name) => write!(f, "session {}", name),
        }
    }
}

/// How a dependent consumes its upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// A view over a table.
    Source,
    /// A table materialized from a view.
    Mirror,
    /// A resolve column reading the upstream.
    Resolve,
}

/// Adjacency lists over table and view names.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<Node, Vec<(Node, EdgeKind)>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `from -> to`, refusing edges that close a cycle.
    ///
    /// Adding an edge that already exists is a no-op.
    pub fn add_edge(&mut self, from: Node, to: Node, kind: EdgeKind) -> Result<()> {
        if let Some(path) = self.path(&to, &from) {
            let mut names: Vec<String> = path.iter().map(|n| alloc::format!("{}", n)).collect();
            names.push(alloc::format!("{}", to));
            return Err(Error::dependency_cycle(names.join(" -> ")));
        }
        let out = self.edges.entry(from).or_default();
        if !out.iter().any(|(n, k)| *n == to && *k == kind) {
            out.push((to, kind));
        }
        Ok(())
    }

    /// Removes every edge leaving or entering `node` of the given kinds.
    pub fn remove_edges(&mut self, node: &Node, kinds: &[EdgeKind]) {
        if let Some(out) = self.edges.get_mut(node) {
            out.retain(|(_, k)| !kinds.contains(k));
        }
        for out in self.edges.values_mut() {
            out.retain(|(n, k)| n != node || !kinds.contains(k));
        }
        self.edges.retain(|_, out| !out.is_empty());
    }

    /// Removes the resolve edges pointing into `node`.
    pub fn remove_resolve_edges_into(&mut self, node: &Node) {
        for out in self.edges.values_mut() {
            out.retain(|(n, k)| n != node || *k != EdgeKind::Resolve);
        }
        self.edges.retain(|_, out| !out.is_empty());
    }

    /// Direct dependents of `node` in insertion order.
    pub fn dependents(&self, node: &Node) -> &[(Node, EdgeKind)] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dependents of `node` reached through the given kind of edge.
    pub fn dependents_of_kind(&self, node: &Node, kind: EdgeKind) -> impl Iterator<Item = &Node> {
        self.dependents(node)
            .iter()
            .filter(move |(_, k)| *k == kind)
            .map(|(n, _)| n)
    }

    /// Returns true if anything depends on `node`.
    pub fn has_dependents(&self, node: &Node) -> bool {
        !self.dependents(node).is_empty()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// A path of nodes from `start` to `goal`, both included.
    fn path(&self, start: &Node, goal: &Node) -> Option<Vec<Node>> {
        let mut visited: HashSet<&Node> = HashSet::new();
        let mut stack: Vec<(&Node, usize)> = alloc::vec![(start, 0)];
        let mut trail: Vec<&Node> = Vec::new();

        while let Some((node, depth)) = stack.pop() {
            trail.truncate(depth);
            trail.push(node);
            if node == goal {
                return Some(trail.into_iter().cloned().collect());
            }
            if !visited.insert(node) {
                continue;
            }
            for (next, _) in self.dependents(node) {
                stack.push((next, depth + 1));
            }
        }
        None
    }
}
