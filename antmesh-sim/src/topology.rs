//! Overlay topology - how nodes are linked
//!
//! Builds the neighbor graph probes are routed over. All randomized shapes
//! draw from an injected RNG so a seed fully determines the overlay.

use std::collections::BTreeMap;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use antmesh_core::NodeId;

use crate::SimError;

/// Overlay shapes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TopologyKind {
    /// Fully connected mesh
    FullMesh,
    /// Ring
    Ring,
    /// Square-ish grid
    Grid,
    /// Random graph with the given edge probability
    Random { edge_prob: f64 },
    /// Small world (Watts-Strogatz)
    SmallWorld { k: usize, rewire_prob: f64 },
    /// Scale-free (Barabasi-Albert) with m edges per joining node
    ScaleFree { m: usize },
}

impl Default for TopologyKind {
    fn default() -> Self {
        Self::SmallWorld {
            k: 4,
            rewire_prob: 0.3,
        }
    }
}

impl FromStr for TopologyKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full_mesh" | "mesh" => Ok(Self::FullMesh),
            "ring" => Ok(Self::Ring),
            "grid" => Ok(Self::Grid),
            "random" => Ok(Self::Random { edge_prob: 0.3 }),
            "small_world" => Ok(Self::default()),
            "scale_free" => Ok(Self::ScaleFree { m: 2 }),
            other => Err(SimError::UnknownTopology(other.to_string())),
        }
    }
}

/// The undirected neighbor graph over node identities.
///
/// Adjacency lists keep insertion order, so a node's neighbor view is stable
/// across protocol steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overlay {
    adjacency: BTreeMap<NodeId, Vec<NodeId>>,
}

impl Overlay {
    /// Create an overlay with `n` unconnected nodes, identified 0..n
    pub fn new(n: usize) -> Self {
        Self {
            adjacency: (0..n as u64).map(|i| (NodeId(i), Vec::new())).collect(),
        }
    }

    /// Build an overlay of `n` nodes with the given shape
    pub fn build(kind: TopologyKind, n: usize, rng: &mut StdRng) -> Self {
        let mut overlay = Self::new(n);

        if n < 2 {
            return overlay;
        }

        match kind {
            TopologyKind::FullMesh => {
                for i in 0..n {
                    for j in (i + 1)..n {
                        overlay.connect(NodeId(i as u64), NodeId(j as u64));
                    }
                }
            }
            TopologyKind::Ring => {
                for i in 0..n {
                    overlay.connect(NodeId(i as u64), NodeId(((i + 1) % n) as u64));
                }
            }
            TopologyKind::Grid => {
                let side = (n as f64).sqrt().ceil() as usize;
                for i in 0..n {
                    let col = i % side;
                    if col + 1 < side && i + 1 < n {
                        overlay.connect(NodeId(i as u64), NodeId((i + 1) as u64));
                    }
                    if i + side < n {
                        overlay.connect(NodeId(i as u64), NodeId((i + side) as u64));
                    }
                }
            }
            TopologyKind::Random { edge_prob } => {
                for i in 0..n {
                    for j in (i + 1)..n {
                        if rng.gen::<f64>() < edge_prob {
                            overlay.connect(NodeId(i as u64), NodeId(j as u64));
                        }
                    }
                }
            }
            TopologyKind::SmallWorld { k, rewire_prob } => {
                // Watts-Strogatz: ring of k nearest neighbors, then rewire
                let k = k.min(n - 1);
                for i in 0..n {
                    for j in 1..=k / 2 {
                        overlay.connect(NodeId(i as u64), NodeId(((i + j) % n) as u64));
                    }
                }
                for i in 0..n {
                    for j in 1..=k / 2 {
                        if rng.gen::<f64>() < rewire_prob {
                            let old = NodeId(((i + j) % n) as u64);
                            let new = NodeId(rng.gen_range(0..n) as u64);
                            let this = NodeId(i as u64);
                            if new != this && new != old && !overlay.linked(this, new) {
                                overlay.disconnect(this, old);
                                overlay.connect(this, new);
                            }
                        }
                    }
                }
            }
            TopologyKind::ScaleFree { m } => {
                // Barabasi-Albert preferential attachment
                let m = m.max(1).min(n - 1);
                let mut degrees = vec![0usize; n];

                for i in 0..m {
                    for j in (i + 1)..=m {
                        overlay.connect(NodeId(i as u64), NodeId(j as u64));
                        degrees[i] += 1;
                        degrees[j] += 1;
                    }
                }

                for i in (m + 1)..n {
                    let mut attached = 0;
                    while attached < m {
                        let total: usize = degrees[..i].iter().sum();
                        let candidate = rng.gen_range(0..i);
                        let this = NodeId(i as u64);
                        let target = NodeId(candidate as u64);
                        let accept = rng.gen::<f64>()
                            < degrees[candidate] as f64 / total.max(1) as f64;
                        if accept && !overlay.linked(this, target) {
                            overlay.connect(this, target);
                            degrees[i] += 1;
                            degrees[candidate] += 1;
                            attached += 1;
                        }
                    }
                }
            }
        }

        overlay
    }

    /// Connect two nodes bidirectionally; duplicate edges are ignored
    pub fn connect(&mut self, a: NodeId, b: NodeId) {
        if a == b || self.linked(a, b) {
            return;
        }
        self.adjacency.entry(a).or_default().push(b);
        self.adjacency.entry(b).or_default().push(a);
    }

    /// Remove the edge between two nodes, both directions
    pub fn disconnect(&mut self, a: NodeId, b: NodeId) {
        if let Some(list) = self.adjacency.get_mut(&a) {
            list.retain(|n| *n != b);
        }
        if let Some(list) = self.adjacency.get_mut(&b) {
            list.retain(|n| *n != a);
        }
    }

    /// Are the two nodes directly linked?
    pub fn linked(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency
            .get(&a)
            .map(|list| list.contains(&b))
            .unwrap_or(false)
    }

    /// The stable neighbor view of a node
    pub fn neighbors_of(&self, node: NodeId) -> &[NodeId] {
        self.adjacency
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All node identities, ascending
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum::<usize>() / 2
    }

    /// Mean node degree
    pub fn avg_degree(&self) -> f64 {
        if self.adjacency.is_empty() {
            return 0.0;
        }
        self.adjacency.values().map(Vec::len).sum::<usize>() as f64 / self.adjacency.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_ring_degree() {
        let mut rng = StdRng::seed_from_u64(1);
        let overlay = Overlay::build(TopologyKind::Ring, 5, &mut rng);

        assert_eq!(overlay.node_count(), 5);
        for node in overlay.node_ids() {
            assert_eq!(overlay.neighbors_of(node).len(), 2);
        }
    }

    #[test]
    fn test_full_mesh_degree() {
        let mut rng = StdRng::seed_from_u64(1);
        let overlay = Overlay::build(TopologyKind::FullMesh, 6, &mut rng);

        for node in overlay.node_ids() {
            assert_eq!(overlay.neighbors_of(node).len(), 5);
        }
        assert_eq!(overlay.edge_count(), 15);
    }

    #[test]
    fn test_grid_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let overlay = Overlay::build(TopologyKind::Grid, 9, &mut rng);

        // 3x3 grid: corner nodes have 2 neighbors, center has 4
        assert_eq!(overlay.neighbors_of(NodeId(0)).len(), 2);
        assert_eq!(overlay.neighbors_of(NodeId(4)).len(), 4);
    }

    #[test]
    fn test_connections_are_bidirectional() {
        let mut rng = StdRng::seed_from_u64(9);
        for kind in [
            TopologyKind::Random { edge_prob: 0.4 },
            TopologyKind::default(),
            TopologyKind::ScaleFree { m: 2 },
        ] {
            let overlay = Overlay::build(kind, 12, &mut rng);
            for node in overlay.node_ids() {
                for neighbor in overlay.neighbors_of(node) {
                    assert!(overlay.linked(*neighbor, node));
                }
            }
        }
    }

    #[test]
    fn test_build_is_deterministic_per_seed() {
        let kind = TopologyKind::default();
        let a = Overlay::build(kind, 20, &mut StdRng::seed_from_u64(3));
        let b = Overlay::build(kind, 20, &mut StdRng::seed_from_u64(3));

        for node in a.node_ids() {
            assert_eq!(a.neighbors_of(node), b.neighbors_of(node));
        }
    }

    #[test]
    fn test_duplicate_connect_ignored() {
        let mut overlay = Overlay::new(3);
        overlay.connect(NodeId(0), NodeId(1));
        overlay.connect(NodeId(0), NodeId(1));
        overlay.connect(NodeId(1), NodeId(0));

        assert_eq!(overlay.edge_count(), 1);
    }

    #[test]
    fn test_topology_parsing() {
        assert_eq!("ring".parse::<TopologyKind>().unwrap(), TopologyKind::Ring);
        assert!(matches!(
            "small_world".parse::<TopologyKind>().unwrap(),
            TopologyKind::SmallWorld { .. }
        ));
        assert!("hypercube".parse::<TopologyKind>().is_err());
    }
}
