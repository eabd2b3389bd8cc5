//! Whole-library reference graph.
//!
//! The validator in [`super::validator`] walks the graph lazily through a fetch
//! capability, one prompt at a time. This module instead materializes every
//! reference of a library at once, which import and `pweave check` need:
//! a cycle check over prompts that are not stored yet, and a
//! dependencies-first order for backfilling `max_depth`.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// A cycle found in a [`ReferenceGraph`], closing node repeated at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle<N>(pub Vec<N>);

impl<N: fmt::Display> fmt::Display for Cycle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(" → "))
    }
}

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is on the current DFS path.
    Gray,
    /// Node and everything below it has been visited.
    Black,
}

/// Directed graph of "compound prompt references prompt" edges.
///
/// Nodes are slugs during import and ids when checking a store.
pub struct ReferenceGraph<N> {
    graph: DiGraph<N, ()>,
    node_map: HashMap<N, NodeIndex>,
}

impl<N> ReferenceGraph<N>
where
    N: Clone + Eq + Hash + Ord + fmt::Display,
{
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    fn ensure_node(&mut self, node: N) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&node) {
            index
        } else {
            let index = self.graph.add_node(node.clone());
            self.node_map.insert(node, index);
            index
        }
    }

    /// Register a prompt that may have no references at all.
    pub fn add_prompt(&mut self, node: N) {
        self.ensure_node(node);
    }

    /// Record that compound prompt `from` has a component referencing `to`.
    pub fn add_reference(&mut self, from: N, to: N) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);

        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    /// Find a cycle, if any, using DFS with colors.
    pub fn find_cycle(&self) -> Option<Cycle<N>> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|idx| (idx, Color::White)).collect();
        let mut path: Vec<NodeIndex> = Vec::new();

        for node in self.graph.node_indices() {
            if colors.get(&node) == Some(&Color::White)
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Some(Cycle(cycle.into_iter().map(|idx| self.graph[idx].clone()).collect()));
            }
        }

        None
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Nodes ordered so every referenced prompt precedes the prompts referencing it.
    ///
    /// # Errors
    ///
    /// Returns the offending [`Cycle`] when the graph is cyclic.
    pub fn topological_order(&self) -> Result<Vec<N>, Cycle<N>> {
        if let Some(cycle) = self.find_cycle() {
            return Err(cycle);
        }

        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices.into_iter().rev().map(|idx| self.graph[idx].clone()).collect()),
            Err(cycle) => Err(Cycle(vec![self.graph[cycle.node_id()].clone()])),
        }
    }

    /// Prompts directly referenced by `node`, sorted.
    pub fn references_of(&self, node: &N) -> Vec<N> {
        let mut refs: Vec<N> = match self.node_map.get(node) {
            Some(&idx) => self.graph.neighbors(idx).map(|n| self.graph[n].clone()).collect(),
            None => Vec::new(),
        };
        refs.sort();
        refs
    }

    /// Prompts whose components reference `node` directly, sorted.
    pub fn dependents_of(&self, node: &N) -> Vec<N> {
        let mut dependents: Vec<N> = match self.node_map.get(node) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Incoming)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        };
        dependents.sort();
        dependents
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of prompts in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct references in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Render the references below `root` as an indented tree.
    pub fn to_tree_string(&self, root: &N) -> String {
        let mut result = format!("{root}\n");
        let mut on_path = HashSet::new();
        on_path.insert(root.clone());
        self.build_tree_string(root, &mut result, "", &mut on_path);
        result
    }

    fn build_tree_string(&self, node: &N, result: &mut String, prefix: &str, on_path: &mut HashSet<N>) {
        let refs = self.references_of(node);

        for (i, child) in refs.iter().enumerate() {
            let is_last = i == refs.len() - 1;
            let connector = if is_last {
                "└── "
            } else {
                "├── "
            };
            result.push_str(&format!("{prefix}{connector}{child}\n"));

            let child_prefix = if is_last {
                format!("{prefix}    ")
            } else {
                format!("{prefix}│   ")
            };

            if !on_path.insert(child.clone()) {
                result.push_str(&format!("{child_prefix}└── (circular reference)\n"));
                continue;
            }
            self.build_tree_string(child, result, &child_prefix, on_path);
            on_path.remove(child);
        }
    }
}

impl<N> Default for ReferenceGraph<N>
where
    N: Clone + Eq + Hash + Ord + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}
