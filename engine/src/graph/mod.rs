use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use petgraph::dot::{Config, Dot};
use petgraph::stable_graph::{EdgeReference, NodeIndex, StableDiGraph};
use petgraph::visit::{depth_first_search, Bfs, DfsEvent, EdgeRef, IntoEdgeReferences};
use petgraph::Direction;

/// A directed, edge-labelled multigraph whose nodes are addressed by value
#[derive(Clone)]
pub struct LabeledGraph<N, E> {
    graph: StableDiGraph<N, E>,
    /// node value to index in the graph
    node_to_index: BTreeMap<N, NodeIndex>,
}

impl<N: Copy + Ord, E> Default for LabeledGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Copy + Ord, E> LabeledGraph<N, E> {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            node_to_index: BTreeMap::new(),
        }
    }

    fn index_or_insert(&mut self, node: N) -> NodeIndex {
        match self.node_to_index.get(&node) {
            Some(index) => *index,
            None => {
                let index = self.graph.add_node(node);
                self.node_to_index.insert(node, index);
                index
            }
        }
    }

    /// Add a node, returns false if the node already exists
    pub fn add_node(&mut self, node: N) -> bool {
        if self.node_to_index.contains_key(&node) {
            return false;
        }
        self.index_or_insert(node);
        true
    }

    pub fn contains(&self, node: &N) -> bool {
        self.node_to_index.contains_key(node)
    }

    /// Add an edge, creating its endpoints when missing
    pub fn add_edge(&mut self, src: N, dst: N, label: E) {
        let src_index = self.index_or_insert(src);
        let dst_index = self.index_or_insert(dst);
        self.graph.add_edge(src_index, dst_index, label);
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All nodes, in ascending order
    pub fn nodes(&self) -> impl Iterator<Item = N> + '_ {
        self.node_to_index.keys().copied()
    }

    /// All edges as `(src, dst, label)`
    pub fn edges(&self) -> impl Iterator<Item = (N, N, &E)> + '_ {
        self.graph
            .edge_references()
            .map(|edge| (self.graph[edge.source()], self.graph[edge.target()], edge.weight()))
    }

    fn neighbors_with_labels(&self, node: N, dir: Direction) -> Vec<(N, &E)> {
        let Some(index) = self.node_to_index.get(&node) else {
            return vec![];
        };
        self.graph
            .edges_directed(*index, dir)
            .map(|edge| {
                let other = match dir {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (self.graph[other], edge.weight())
            })
            .collect()
    }

    /// Outgoing edges of `node` as `(dst, label)`
    pub fn out_edges(&self, node: N) -> Vec<(N, &E)> {
        self.neighbors_with_labels(node, Direction::Outgoing)
    }

    /// Incoming edges of `node` as `(src, label)`
    pub fn in_edges(&self, node: N) -> Vec<(N, &E)> {
        self.neighbors_with_labels(node, Direction::Incoming)
    }

    /// Successors of `node`, one entry per edge
    pub fn successors(&self, node: N) -> Vec<N> {
        self.out_edges(node).into_iter().map(|(n, _)| n).collect()
    }

    /// Predecessors of `node`, one entry per edge
    pub fn predecessors(&self, node: N) -> Vec<N> {
        self.in_edges(node).into_iter().map(|(n, _)| n).collect()
    }

    /// Move the incoming edges of `node` accepted by `filter` (on the source) onto `target`
    pub fn redirect_in_edges<F>(&mut self, node: N, target: N, filter: F)
    where
        F: Fn(N) -> bool,
    {
        let Some(index) = self.node_to_index.get(&node).copied() else {
            return;
        };
        let target_index = self.index_or_insert(target);
        let moved: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .filter(|edge| filter(self.graph[edge.source()]))
            .map(|edge| (edge.id(), edge.source()))
            .collect();
        for (edge, src) in moved {
            if let Some(label) = self.graph.remove_edge(edge) {
                self.graph.add_edge(src, target_index, label);
            }
        }
    }

    /// Move every outgoing edge of `node` so that it leaves from `origin` instead
    pub fn redirect_out_edges(&mut self, node: N, origin: N) {
        let Some(index) = self.node_to_index.get(&node).copied() else {
            return;
        };
        let origin_index = self.index_or_insert(origin);
        let moved: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        for (edge, dst) in moved {
            if let Some(label) = self.graph.remove_edge(edge) {
                self.graph.add_edge(origin_index, dst, label);
            }
        }
    }

    /// Nodes reachable from `from`, including itself
    pub fn reachable_from(&self, from: N) -> BTreeSet<N> {
        let mut reached = BTreeSet::new();
        let Some(index) = self.node_to_index.get(&from) else {
            return reached;
        };
        let mut bfs = Bfs::new(&self.graph, *index);
        while let Some(next) = bfs.next(&self.graph) {
            reached.insert(self.graph[next]);
        }
        reached
    }

    /// Edges reaching an ancestor on the stack of a depth-first traversal over all nodes,
    /// as `(src, dst)` in discovery order
    pub fn back_edges(&self) -> Vec<(N, N)> {
        let mut found = vec![];
        let mut seen = BTreeSet::new();
        depth_first_search(&self.graph, self.node_to_index.values().copied(), |event| {
            if let DfsEvent::BackEdge(src, dst) = event {
                let pair = (self.graph[src], self.graph[dst]);
                if seen.insert(pair) {
                    found.push(pair);
                }
            }
        });
        found
    }

    /// Render the graph in the dot format with custom printers
    pub fn to_dot<FN, FE>(&self, node_label: FN, edge_label: FE) -> String
    where
        N: Display,
        E: Display,
        FN: Fn(&N) -> String,
        FE: Fn(&E) -> String,
    {
        let edge_attrs = |_: &StableDiGraph<N, E>, edge: EdgeReference<'_, E>| {
            format!("label = {:?}", edge_label(edge.weight()))
        };
        let node_attrs = |_: &StableDiGraph<N, E>, (_, node): (NodeIndex, &N)| {
            format!("label = {:?}", node_label(node))
        };
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[Config::EdgeNoLabel, Config::NodeNoLabel],
            &edge_attrs,
            &node_attrs,
        );
        format!("{}", dot)
    }
}

impl<N: Copy + Ord, E: Clone> LabeledGraph<N, E> {
    /// The sub-graph induced by `keep`
    pub fn restrict(&self, keep: &BTreeSet<N>) -> Self {
        let mut result = Self::new();
        for node in self.nodes().filter(|n| keep.contains(n)) {
            result.add_node(node);
        }
        for (src, dst, label) in self.edges() {
            if keep.contains(&src) && keep.contains(&dst) {
                result.add_edge(src, dst, label.clone());
            }
        }
        result
    }
}
