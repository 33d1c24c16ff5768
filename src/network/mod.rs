//! Social network topology.
//!
//! The simulation never mutates its graph. [`SocialGraph`] freezes a
//! `petgraph` graph into a dense adjacency list keyed by [`AgentId`], so every
//! step walks neighbors in the same order and sampling stays reproducible.
//!
//! Node weights carry the agent ids and must be exactly `0..N`. Directed
//! graphs expose outgoing edges as neighbors; undirected graphs expose both
//! endpoints.
//!
//! The builders below produce the synthetic topologies used by the `mim`
//! driver and the tests. Real ego-centric networks are built elsewhere and
//! handed over as `petgraph` graphs.

use clap::ValueEnum;
use petgraph::graph::{Graph, NodeIndex, UnGraph};
use petgraph::EdgeType;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::{MimError, Result};

/// Immutable adjacency of the simulated population
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialGraph {
    adjacency: Vec<Vec<AgentId>>,
    directed: bool,
    edge_count: usize,
}

impl SocialGraph {
    /// Freeze a petgraph graph whose node weights are the agent ids `0..N`.
    pub fn from_petgraph<Ty: EdgeType>(graph: &Graph<usize, (), Ty>) -> Result<Self> {
        let n = graph.node_count();
        let mut slot_of_node = vec![None; n];
        let mut seen = vec![false; n];

        for node in graph.node_indices() {
            let id = graph[node];
            if id >= n {
                return Err(MimError::InvalidGraph(format!(
                    "node id {id} out of range for {n} nodes"
                )));
            }
            if seen[id] {
                return Err(MimError::InvalidGraph(format!("duplicate node id {id}")));
            }
            seen[id] = true;
            slot_of_node[node.index()] = Some(id);
        }

        let mut adjacency = vec![Vec::new(); n];
        for node in graph.node_indices() {
            let Some(id) = slot_of_node[node.index()] else {
                continue;
            };
            let mut neighbors: Vec<AgentId> = graph
                .neighbors(node)
                .filter_map(|other| slot_of_node[other.index()].map(AgentId))
                .collect();
            neighbors.sort_unstable();
            neighbors.dedup();
            adjacency[id] = neighbors;
        }

        Ok(Self {
            adjacency,
            directed: Ty::is_directed(),
            edge_count: graph.edge_count(),
        })
    }

    /// Build directly from an adjacency list.
    pub fn from_adjacency(adjacency: Vec<Vec<usize>>, directed: bool) -> Result<Self> {
        let n = adjacency.len();
        let mut edge_count = 0;
        let mut frozen = Vec::with_capacity(n);

        for (id, neighbors) in adjacency.into_iter().enumerate() {
            if let Some(bad) = neighbors.iter().find(|&&other| other >= n) {
                return Err(MimError::InvalidGraph(format!(
                    "node {id} links to unknown node {bad}"
                )));
            }
            let mut neighbors: Vec<AgentId> = neighbors.into_iter().map(AgentId).collect();
            neighbors.sort_unstable();
            neighbors.dedup();
            edge_count += neighbors.len();
            frozen.push(neighbors);
        }

        if !directed {
            edge_count /= 2;
        }

        Ok(Self {
            adjacency: frozen,
            directed,
            edge_count,
        })
    }

    /// Number of nodes (graph agents, bots excluded)
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Whether edges are directed
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Potential neighbors of `id`; empty for ids outside the graph (bots).
    pub fn neighbors(&self, id: AgentId) -> &[AgentId] {
        match self.adjacency.get(id.index()) {
            Some(neighbors) => neighbors,
            None => &[],
        }
    }

    /// Each edge once, as `(source, target)`
    pub fn edges(&self) -> impl Iterator<Item = (AgentId, AgentId)> + '_ {
        let directed = self.directed;
        self.adjacency.iter().enumerate().flat_map(move |(id, neighbors)| {
            neighbors
                .iter()
                .filter(move |other| directed || id <= other.index())
                .map(move |&other| (AgentId(id), other))
        })
    }
}

/// Synthetic topology kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Topology {
    /// Watts-Strogatz small-world network
    SmallWorld,
    /// Erdos-Renyi random graph
    Random,
    /// Ring topology (each agent connected to k neighbors)
    Ring,
}

/// Build a synthetic topology with `n` nodes and mean degree about `k`.
pub fn build_topology(
    topology: Topology,
    n: usize,
    k: usize,
    rewire_prob: f64,
    rng: &mut impl Rng,
) -> UnGraph<usize, ()> {
    match topology {
        Topology::SmallWorld => build_small_world_network(n, k, rewire_prob, rng),
        Topology::Random => build_random_network(n, k, rng),
        Topology::Ring => build_ring_network(n, k),
    }
}

/// Ring lattice where every edge is rewired with probability `p`.
pub fn build_small_world_network(
    n: usize,
    k: usize,
    p: f64,
    rng: &mut impl Rng,
) -> UnGraph<usize, ()> {
    let mut graph = build_ring_network(n, k);
    let nodes: Vec<NodeIndex> = graph.node_indices().collect();

    let edges: Vec<_> = graph.edge_indices().collect();
    for edge in edges.into_iter().rev() {
        if rng.gen::<f64>() >= p {
            continue;
        }
        let Some((source, _)) = graph.edge_endpoints(edge) else {
            continue;
        };
        let source_id = graph[source];

        for _ in 0..n {
            let new_target_id = rng.gen_range(0..n);
            if new_target_id != source_id
                && !graph.contains_edge(nodes[source_id], nodes[new_target_id])
            {
                // Removing swaps the last edge into this slot, hence the reverse walk
                graph.remove_edge(edge);
                graph.add_edge(nodes[source_id], nodes[new_target_id], ());
                break;
            }
        }
    }

    graph
}

/// G(n, p) graph with `p` chosen for mean degree `k`.
pub fn build_random_network(n: usize, k: usize, rng: &mut impl Rng) -> UnGraph<usize, ()> {
    let mut graph = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();

    if n < 2 {
        return graph;
    }

    let p = (k as f64 / (n - 1) as f64).min(1.0);

    for i in 0..n {
        for j in (i + 1)..n {
            if rng.gen::<f64>() < p {
                graph.add_edge(nodes[i], nodes[j], ());
            }
        }
    }

    graph
}

/// Ring where each node links to its `k / 2` successors.
pub fn build_ring_network(n: usize, k: usize) -> UnGraph<usize, ()> {
    let mut graph = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();

    let half_k = k / 2;
    for i in 0..n {
        for j in 1..=half_k {
            let neighbor = (i + j) % n;
            if neighbor != i && !graph.contains_edge(nodes[i], nodes[neighbor]) {
                graph.add_edge(nodes[i], nodes[neighbor], ());
            }
        }
    }

    graph
}
