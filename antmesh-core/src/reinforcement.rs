//! Path reinforcement - strengthening trails after a hit
//!
//! When a probe finds its resource, every edge along the recorded path is
//! reinforced, walking from the hitting node back toward the originator.
//! The walk is strictly ordered: each step changes hit counts that feed the
//! next update, so it must never be reordered or parallelized.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pheromone::PheromoneTable;
use crate::NodeId;

/// Capability lookup for pheromone tables owned by other nodes.
///
/// The engine implements this over its node registry. A node that does not
/// run the pheromone protocol must surface an error here, not be skipped:
/// wrong-kind collaborators mean the topology wiring is broken.
pub trait TableDirectory {
    /// Mutable access to the table owned by `node`
    fn table_mut(&mut self, node: NodeId) -> Result<&mut PheromoneTable>;
}

impl TableDirectory for std::collections::HashMap<NodeId, PheromoneTable> {
    fn table_mut(&mut self, node: NodeId) -> Result<&mut PheromoneTable> {
        self.get_mut(&node)
            .ok_or(crate::AntmeshError::NodeNotFound(node))
    }
}

/// An ordered list of edges to reinforce after a hit.
///
/// For a path `[n0, .., nk]` (hit at `nk`) the edges are
/// `(n_{k-1}, n_k), (n_{k-2}, n_{k-1}), .., (n0, n1)`: each upstream node
/// strengthens its trail toward the next hop on the successful path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReinforcementPlan {
    edges: Vec<(NodeId, NodeId)>,
}

impl ReinforcementPlan {
    /// Derive the plan from a probe path, walked end toward start
    pub fn from_path(path: &[NodeId]) -> Self {
        let edges = (1..path.len())
            .rev()
            .map(|i| (path[i - 1], path[i]))
            .collect();
        Self { edges }
    }

    /// The `(upstream, downstream)` edges, in application order
    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }

    /// Number of edges to reinforce
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// A single-node path produces nothing to reinforce
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Apply the plan in order: for each edge, bump the upstream node's hit
    /// counter for the downstream neighbor, then update and normalize that
    /// node's table.
    ///
    /// Fails fast if any upstream node lacks the pheromone capability.
    pub fn apply(&self, directory: &mut dyn TableDirectory) -> Result<()> {
        for (upstream, downstream) in &self.edges {
            directory.table_mut(*upstream)?.reinforce_edge(*downstream);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::AntmeshError;

    fn directory_for(nodes: &[NodeId]) -> HashMap<NodeId, PheromoneTable> {
        // Each node sees every other node as a neighbor with an even trail
        nodes
            .iter()
            .map(|n| {
                let levels = nodes
                    .iter()
                    .filter(|m| *m != n)
                    .map(|m| (*m, 1.0 / (nodes.len() - 1) as f64));
                (*n, PheromoneTable::with_levels(60.0, -0.075, levels))
            })
            .collect()
    }

    #[test]
    fn test_plan_walks_end_toward_start() {
        let path = [NodeId(0), NodeId(1), NodeId(2)];
        let plan = ReinforcementPlan::from_path(&path);

        assert_eq!(
            plan.edges(),
            &[(NodeId(1), NodeId(2)), (NodeId(0), NodeId(1))]
        );
    }

    #[test]
    fn test_single_node_path_is_empty() {
        let plan = ReinforcementPlan::from_path(&[NodeId(4)]);
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn test_apply_increments_each_edge_once() {
        let nodes = [NodeId(0), NodeId(1), NodeId(2)];
        let mut directory = directory_for(&nodes);

        let plan = ReinforcementPlan::from_path(&nodes);
        plan.apply(&mut directory).unwrap();

        // A->B and B->C incremented exactly once, nothing else
        assert_eq!(directory[&NodeId(0)].query_hits(NodeId(1)), 1);
        assert_eq!(directory[&NodeId(1)].query_hits(NodeId(2)), 1);
        assert_eq!(directory[&NodeId(0)].query_hits(NodeId(2)), 0);
        assert_eq!(directory[&NodeId(1)].query_hits(NodeId(0)), 0);
        assert_eq!(directory[&NodeId(2)].query_hits(NodeId(0)), 0);
        assert_eq!(directory[&NodeId(2)].query_hits(NodeId(1)), 0);

        // Every touched table is normalized back to a distribution
        assert!((directory[&NodeId(0)].total() - 1.0).abs() < 1e-9);
        assert!((directory[&NodeId(1)].total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_fails_fast_on_missing_node() {
        let mut directory = directory_for(&[NodeId(0), NodeId(1)]);
        directory.remove(&NodeId(0));

        let plan = ReinforcementPlan::from_path(&[NodeId(0), NodeId(1)]);
        assert_eq!(
            plan.apply(&mut directory),
            Err(AntmeshError::NodeNotFound(NodeId(0)))
        );
    }
}
