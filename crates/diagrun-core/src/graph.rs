//! Generic directed dependency graph with referential and cycle checks.
//!
//! Nodes are keyed by any hashable, cloneable value. An edge `A → B` means
//! "A depends on B". Edges may point at keys that were never registered as
//! nodes; those are reported by [`DependencyGraph::missing_references`] and
//! ignored by cycle detection.
//!
//! Cycle detection is a three-colour depth-first search: a node is white
//! until first visited, grey while its descendants are being explored, and
//! black once finished. Any edge into a grey node closes a cycle. A
//! self-edge is simply the shortest such cycle.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed graph over keys of type `K`, preserving node insertion order.
#[derive(Debug, Clone)]
pub struct DependencyGraph<K> {
    order: Vec<K>,
    nodes: HashSet<K>,
    /// `node → [dependency, ...]`, in declaration order.
    edges: HashMap<K, Vec<K>>,
}

impl<K> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            nodes: HashSet::new(),
            edges: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> DependencyGraph<K> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(node, dependencies)` pairs.
    pub fn from_adjacency<I, D>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        D: IntoIterator<Item = K>,
    {
        let mut graph = Self::new();
        for (node, deps) in entries {
            graph.add_node(node.clone());
            for dep in deps {
                graph.add_edge(node.clone(), dep);
            }
        }
        graph
    }

    /// Register a node. Idempotent.
    pub fn add_node(&mut self, node: K) {
        if self.nodes.insert(node.clone()) {
            self.order.push(node);
        }
    }

    /// Record that `node` depends on `dependency`. `node` is registered if
    /// absent; `dependency` is not.
    pub fn add_edge(&mut self, node: K, dependency: K) {
        self.add_node(node.clone());
        self.edges.entry(node).or_default().push(dependency);
    }

    pub fn contains(&self, node: &K) -> bool {
        self.nodes.contains(node)
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Direct dependencies of `node`, in declaration order.
    pub fn dependencies_of(&self, node: &K) -> &[K] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every edge whose target is not a registered node, as
    /// `(dependent, missing_dependency)` pairs in declaration order.
    pub fn missing_references(&self) -> Vec<(K, K)> {
        self.order
            .iter()
            .flat_map(|node| {
                self.dependencies_of(node)
                    .iter()
                    .filter(|dep| !self.nodes.contains(*dep))
                    .map(move |dep| (node.clone(), dep.clone()))
            })
            .collect()
    }

    /// All cycles reachable by DFS, each as a closed path (`[a, b, a]`).
    ///
    /// Roots are tried in node insertion order, so results are deterministic.
    /// Each back edge yields exactly one reported cycle. The traversal keeps
    /// its own frame stack, so chain depth is bounded by memory rather than
    /// the thread's call stack.
    pub fn find_cycles(&self) -> Vec<Vec<K>> {
        let mut colors: HashMap<&K, Color> = HashMap::with_capacity(self.order.len());
        let mut cycles = Vec::new();
        // (node, index of its next dependency to explore); doubles as the grey path.
        let mut stack: Vec<(&K, usize)> = Vec::new();

        for root in &self.order {
            if colors.get(root).copied().unwrap_or(Color::White) != Color::White {
                continue;
            }
            colors.insert(root, Color::Gray);
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let (node, edge) = *frame;
                let Some(next) = self.dependencies_of(node).get(edge) else {
                    colors.insert(node, Color::Black);
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                if !self.nodes.contains(next) {
                    continue;
                }
                match colors.get(next).copied().unwrap_or(Color::White) {
                    Color::White => {
                        colors.insert(next, Color::Gray);
                        stack.push((next, 0));
                    }
                    Color::Gray => {
                        // A grey node is always on the current path.
                        let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                        let mut cycle: Vec<K> =
                            stack[start..].iter().map(|(n, _)| (*n).clone()).collect();
                        cycle.push(next.clone());
                        cycles.push(cycle);
                    }
                    Color::Black => {}
                }
            }
        }
        cycles
    }

    pub fn is_acyclic(&self) -> bool {
        self.find_cycles().is_empty()
    }
}
