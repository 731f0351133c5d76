//! # Antmesh Core
//!
//! Core primitives and algorithms for the antmesh protocol.
//!
//! Antmesh is an ant-colony-inspired query routing protocol for peer-to-peer
//! overlays. Nodes hold private resources and cooperatively route search
//! probes ("ants") toward nodes that can satisfy a query. Each node keeps a
//! pheromone level per neighbor that is reinforced along successful search
//! paths and evaporates over time, biasing both neighbor selection and the
//! remaining lifetime of forwarded probes.
//!
//! ## Core Concepts
//!
//! - **Probe**: a search message carrying its query, hop budget and path
//! - **Pheromone Table**: per-neighbor trail levels plus query-hit counters
//! - **Resource Store**: the resource identifiers a node can answer for
//! - **Routing**: TTL-adaptive forwarding driven by pheromone levels
//! - **Router**: the per-node protocol state machine tying it all together
//!
//! ## Example
//!
//! ```rust
//! use antmesh_core::{NodeId, PheromoneRouter, ProtocolConfig, ResourceId};
//!
//! let config = ProtocolConfig::default();
//! let mut router = PheromoneRouter::new(NodeId(7), config, 42).unwrap();
//! router.register_neighbor(NodeId(8));
//! router.add_resource(ResourceId(3));
//!
//! let probe = router.originate(ResourceId(3));
//! let outcome = router.handle_probe(probe, &[NodeId(8)]);
//! assert!(outcome.hit.is_some());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod pheromone;
pub mod probe;
pub mod protocol;
pub mod reinforcement;
pub mod resource;
pub mod routing;

pub use config::{ForwardingPolicy, ProtocolConfig};
pub use error::{AntmeshError, Result};
pub use pheromone::PheromoneTable;
pub use probe::{Probe, ProbeBuilder};
pub use protocol::{Disposition, HitReport, PheromoneRouter, StepOutcome};
pub use reinforcement::{ReinforcementPlan, TableDirectory};
pub use resource::{ResourceId, ResourceStore};
pub use routing::Forward;

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default reinforcement scale (`q1` in the trail update rule)
pub const DEFAULT_Q1: f64 = 60.0;

/// Default reinforcement exponent coefficient (`q2` in the trail update
/// rule).
/// Negative values give diminishing returns for frequently hit neighbors.
pub const DEFAULT_Q2: f64 = -0.075;

/// Default evaporation rate applied on every processed probe
pub const DEFAULT_EVAPORATION: f64 = 0.1;

/// Default lower pheromone bound; below it a forwarded probe loses one TTL
pub const DEFAULT_LOW_BOUND: f64 = 0.4;

/// Default upper pheromone bound; above it a forwarded probe gains one TTL
pub const DEFAULT_HIGH_BOUND: f64 = 0.8;

/// Default exploration threshold for greedy forwarding
pub const DEFAULT_ALPHA: f64 = 0.5;

/// Default starting probe lifetime in hops
pub const DEFAULT_INITIAL_TTL: i32 = 5;

/// Opaque identifier for a node in the overlay.
///
/// Node identity must be stable and hashable across probe replicas, so it is
/// a plain integer rather than a reference to any node object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(42).to_string(), "n42");
    }

    #[test]
    fn test_node_id_ordering() {
        assert!(NodeId(1) < NodeId(2));
        assert_eq!(NodeId(7), NodeId(7));
    }
}
