//! Implements a directed graph.
//!
//! Vertices and edges are addressed by `usize` indices. On top of the basic
//! structure this module computes dominators, back edges and natural loops,
//! which is what loop detection over a control-flow graph needs.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::Error;

pub trait Vertex: Clone {
    // The index of this vertex.
    fn index(&self) -> usize;
}

pub trait Edge: Clone {
    /// The index of the head vertex.
    fn head(&self) -> usize;
    /// The index of the tail vertex.
    fn tail(&self) -> usize;
}

/// An empty vertex for creating structures when data is not required
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NullVertex {
    index: usize,
}

impl NullVertex {
    pub fn new(index: usize) -> NullVertex {
        NullVertex { index }
    }
}

impl Vertex for NullVertex {
    fn index(&self) -> usize {
        self.index
    }
}

/// An empty edge for creating structures when data is not required
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct NullEdge {
    head: usize,
    tail: usize,
}

impl NullEdge {
    pub fn new(head: usize, tail: usize) -> NullEdge {
        NullEdge { head, tail }
    }
}

impl Edge for NullEdge {
    fn head(&self) -> usize {
        self.head
    }
    fn tail(&self) -> usize {
        self.tail
    }
}

/// A natural loop: a header and every vertex which can reach a back edge into
/// that header without passing through it.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Loop {
    header: usize,
    nodes: BTreeSet<usize>,
}

impl Loop {
    pub fn new(header: usize, nodes: BTreeSet<usize>) -> Self {
        Self { header, nodes }
    }

    /// The set of nodes part of this loop, header included
    pub fn nodes(&self) -> &BTreeSet<usize> {
        &self.nodes
    }

    /// The loop header node
    pub fn header(&self) -> usize {
        self.header
    }

    /// Returns `true` if `index` belongs to this loop.
    pub fn contains(&self, index: usize) -> bool {
        self.nodes.contains(&index)
    }
}

impl fmt::Display for Loop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Loop 0x{:X}: {{", self.header)?;
        let nodes = self
            .nodes
            .iter()
            .map(|node| format!("0x{:X}", node))
            .collect::<Vec<String>>();
        write!(f, "{}}}", nodes.join(", "))
    }
}

/// A directed graph.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Graph<V: Vertex, E: Edge> {
    vertices: BTreeMap<usize, V>,
    edges: BTreeMap<(usize, usize), E>,
    successors: BTreeMap<usize, BTreeSet<usize>>,
    predecessors: BTreeMap<usize, BTreeSet<usize>>,
}

impl<V: Vertex, E: Edge> Default for Graph<V, E> {
    fn default() -> Self {
        Graph::new()
    }
}

impl<V, E> Graph<V, E>
where
    V: Vertex,
    E: Edge,
{
    pub fn new() -> Graph<V, E> {
        Graph {
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
            successors: BTreeMap::new(),
            predecessors: BTreeMap::new(),
        }
    }

    /// Returns true if the vertex with the given index exists in this graph
    pub fn has_vertex(&self, index: usize) -> bool {
        self.vertices.contains_key(&index)
    }

    /// Inserts a vertex into the graph.
    /// # Errors
    /// Error if the vertex already exists by index.
    pub fn insert_vertex(&mut self, v: V) -> Result<(), Error> {
        if self.vertices.contains_key(&v.index()) {
            return Err("duplicate vertex index".into());
        }
        self.successors.insert(v.index(), BTreeSet::new());
        self.predecessors.insert(v.index(), BTreeSet::new());
        self.vertices.insert(v.index(), v);
        Ok(())
    }

    /// Inserts an edge into the graph.
    /// # Errors
    /// Error if the edge already exists by indices, or if either vertex is
    /// missing.
    pub fn insert_edge(&mut self, edge: E) -> Result<(), Error> {
        let (head, tail) = (edge.head(), edge.tail());
        if self.edges.contains_key(&(head, tail)) {
            return Err("duplicate edge".into());
        }
        if !self.vertices.contains_key(&head) {
            return Err(Error::GraphVertexNotFound(head));
        }
        if !self.vertices.contains_key(&tail) {
            return Err(Error::GraphVertexNotFound(tail));
        }

        self.edges.insert((head, tail), edge);
        self.successors.entry(head).or_default().insert(tail);
        self.predecessors.entry(tail).or_default().insert(head);

        Ok(())
    }

    /// Computes the set of vertices reachable from the given index.
    pub fn reachable_vertices(&self, index: usize) -> Result<FxHashSet<usize>, Error> {
        if !self.has_vertex(index) {
            return Err(Error::GraphVertexNotFound(index));
        }

        let mut reachable_vertices: FxHashSet<usize> = FxHashSet::default();
        let mut queue: Vec<usize> = vec![index];

        reachable_vertices.insert(index);

        while let Some(vertex) = queue.pop() {
            for &successor in &self.successors[&vertex] {
                if reachable_vertices.insert(successor) {
                    queue.push(successor);
                }
            }
        }

        Ok(reachable_vertices)
    }

    /// Computes the dominators of every vertex reachable from `root`.
    ///
    /// Iterates the classic data-flow equations
    /// `dom(v) = {v} ∪ ⋂ dom(p)` over the reachable predecessors `p` of `v`
    /// until nothing changes. Unreachable vertices are absent from the result.
    pub fn compute_dominators(
        &self,
        root: usize,
    ) -> Result<FxHashMap<usize, FxHashSet<usize>>, Error> {
        let reachable = self.reachable_vertices(root)?;

        // Walking in index order keeps the result independent of hash order.
        let order: Vec<usize> = self
            .vertices
            .keys()
            .filter(|index| reachable.contains(index))
            .cloned()
            .collect();

        let mut dominators: FxHashMap<usize, FxHashSet<usize>> = FxHashMap::default();
        for &vertex in &order {
            if vertex == root {
                dominators.insert(vertex, std::iter::once(root).collect());
            } else {
                dominators.insert(vertex, reachable.clone());
            }
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &vertex in &order {
                if vertex == root {
                    continue;
                }

                let mut new_dominators: Option<FxHashSet<usize>> = None;
                for predecessor in &self.predecessors[&vertex] {
                    let predecessor_dominators = match dominators.get(predecessor) {
                        Some(predecessor_dominators) => predecessor_dominators,
                        None => continue,
                    };
                    new_dominators = Some(match new_dominators {
                        Some(set) => set
                            .intersection(predecessor_dominators)
                            .cloned()
                            .collect(),
                        None => predecessor_dominators.clone(),
                    });
                }

                let mut new_dominators = new_dominators.unwrap_or_default();
                new_dominators.insert(vertex);

                if dominators[&vertex] != new_dominators {
                    dominators.insert(vertex, new_dominators);
                    changed = true;
                }
            }
        }

        Ok(dominators)
    }

    /// Computes the set of back edges
    ///
    /// Back edges are edges whose tails dominate their heads.
    pub fn compute_back_edges(&self, root: usize) -> Result<BTreeSet<(usize, usize)>, Error> {
        let mut back_edges = BTreeSet::new();

        for (node, dominators) in self.compute_dominators(root)? {
            for successor in &self.successors[&node] {
                if dominators.contains(successor) {
                    back_edges.insert((node, *successor));
                }
            }
        }

        Ok(back_edges)
    }

    /// Computes the set of natural loops in the graph
    pub fn compute_loops(&self, root: usize) -> Result<Vec<Loop>, Error> {
        let mut loops: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

        // For each back edge compute the set of nodes part of the loop
        for (tail, header) in self.compute_back_edges(root)? {
            let nodes = loops.entry(header).or_default();
            let mut queue: Vec<usize> = Vec::new();

            nodes.insert(header);

            if nodes.insert(tail) {
                queue.push(tail);
            }

            while let Some(node) = queue.pop() {
                for &predecessor in &self.predecessors[&node] {
                    if nodes.insert(predecessor) {
                        queue.push(predecessor);
                    }
                }
            }
        }

        Ok(loops
            .into_iter()
            .map(|(header, nodes)| Loop::new(header, nodes))
            .collect())
    }

    /// Returns all vertices in the graph.
    pub fn vertices(&self) -> Vec<&V> {
        self.vertices.values().collect()
    }

    /// Fetches a vertex from the graph by index.
    pub fn vertex(&self, index: usize) -> Result<&V, Error> {
        self.vertices
            .get(&index)
            .ok_or(Error::GraphVertexNotFound(index))
    }

    // Fetches a mutable instance of a vertex.
    pub fn vertex_mut(&mut self, index: usize) -> Result<&mut V, Error> {
        self.vertices
            .get_mut(&index)
            .ok_or(Error::GraphVertexNotFound(index))
    }

    pub fn edge(&self, head: usize, tail: usize) -> Result<&E, Error> {
        self.edges
            .get(&(head, tail))
            .ok_or(Error::GraphEdgeNotFound(head, tail))
    }

    /// Get a reference to every `Edge` in the `Graph`.
    pub fn edges(&self) -> Vec<&E> {
        self.edges.values().collect()
    }

    /// Return all edges out for a vertex
    pub fn edges_out(&self, index: usize) -> Result<Vec<&E>, Error> {
        self.successors
            .get(&index)
            .map(|succs| {
                succs
                    .iter()
                    .map(|succ| &self.edges[&(index, *succ)])
                    .collect()
            })
            .ok_or(Error::GraphVertexNotFound(index))
    }
}
