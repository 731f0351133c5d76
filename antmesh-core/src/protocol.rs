//! Node protocol state machine
//!
//! One `PheromoneRouter` per overlay node. Each delivered probe runs one
//! synchronous step: loop guard, visit recording, trail evaporation, match
//! check, and the forwarding decision. All cross-node effects (probe
//! deliveries, path reinforcement, hit notification) are returned to the
//! caller rather than executed here, so the step never reaches into another
//! node's state.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::pheromone::PheromoneTable;
use crate::probe::Probe;
use crate::reinforcement::ReinforcementPlan;
use crate::resource::{ResourceId, ResourceStore};
use crate::routing::{self, Forward};
use crate::NodeId;

/// How a protocol step disposed of the delivered probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// The probe had already visited this node; dropped with no side effects
    LoopDropped,
    /// The routing engine was consulted; see `StepOutcome::forwards`
    Forwarded,
    /// Hop budget exhausted, no forwarding attempted
    TtlExpired,
}

/// Report of a query hit, handed to the notifier collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitReport {
    /// The search this probe belongs to
    pub search_id: Uuid,
    /// The node whose resource store matched
    pub node: NodeId,
    /// The matched query
    pub query: ResourceId,
    /// Total matches along this probe's path, including this one
    pub hit_count: u32,
    /// Length of the path that produced the hit
    pub path_len: usize,
    /// The full path, originator first
    pub path: Vec<NodeId>,
}

/// Everything a protocol step asks its collaborators to do
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub disposition: Disposition,
    /// Present when this node's resource store matched the query
    pub hit: Option<HitReport>,
    /// Reinforcement to apply across the recorded path, in order
    pub reinforcement: Option<ReinforcementPlan>,
    /// Replicas for the transport, already TTL-adjusted and filtered
    pub forwards: Vec<Forward>,
}

impl StepOutcome {
    fn dropped() -> Self {
        Self {
            disposition: Disposition::LoopDropped,
            hit: None,
            reinforcement: None,
            forwards: Vec::new(),
        }
    }
}

/// The per-node pheromone routing protocol instance.
///
/// Owns the node's pheromone table and resource store exclusively; the
/// engine delivers one probe at a time, so steps for the same node are
/// never concurrent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PheromoneRouter {
    /// This node's identity
    pub id: NodeId,

    config: ProtocolConfig,
    table: PheromoneTable,
    store: ResourceStore,

    /// Node-local randomness for registration levels and greedy picks,
    /// seeded explicitly for reproducible runs
    #[serde(skip, default = "fallback_rng")]
    rng: StdRng,
}

fn fallback_rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

impl PheromoneRouter {
    /// Create a router, validating the configuration up front
    pub fn new(id: NodeId, config: ProtocolConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let table = PheromoneTable::new(config.q1, config.q2);
        Ok(Self {
            id,
            config,
            table,
            store: ResourceStore::new(),
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// The active configuration
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Read access to the pheromone table
    pub fn table(&self) -> &PheromoneTable {
        &self.table
    }

    /// Mutable access to the pheromone table, for directory-driven
    /// reinforcement
    pub fn table_mut(&mut self) -> &mut PheromoneTable {
        &mut self.table
    }

    /// Read access to the resource store
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Register a neighbor edge established by the topology
    pub fn register_neighbor(&mut self, neighbor: NodeId) -> bool {
        self.table.register_neighbor(neighbor, &mut self.rng)
    }

    /// Add a resource this node can answer for (setup only)
    pub fn add_resource(&mut self, resource: ResourceId) -> bool {
        self.store.insert(resource)
    }

    /// Does this node hold `resource`?
    pub fn has_resource(&self, resource: ResourceId) -> bool {
        self.store.has(resource)
    }

    /// Create a fresh probe for a search originating at this node
    pub fn originate(&self, query: ResourceId) -> Probe {
        Probe::builder(query)
            .source(self.id)
            .ttl(self.config.initial_ttl)
            .build()
    }

    /// Process one delivered probe.
    ///
    /// `neighbors` is the topology's stable neighbor view for this step.
    /// Order of operations: loop guard, visit recording, evaporation (before
    /// any reinforcement can touch a table), match check, forwarding
    /// decision.
    pub fn handle_probe(&mut self, mut probe: Probe, neighbors: &[NodeId]) -> StepOutcome {
        if probe.has_visited(self.id) {
            return StepOutcome::dropped();
        }

        probe.record_visit(self.id);

        self.table.evaporate(self.config.evaporation);

        let (hit, reinforcement) = if self.has_resource(probe.query) {
            probe.register_hit();
            let report = HitReport {
                search_id: probe.search_id,
                node: self.id,
                query: probe.query,
                hit_count: probe.hit_count,
                path_len: probe.hops(),
                path: probe.path().to_vec(),
            };
            (
                Some(report),
                Some(ReinforcementPlan::from_path(probe.path())),
            )
        } else {
            (None, None)
        };

        if probe.ttl > 0 {
            let forwards = routing::select_forwards(
                &probe,
                &self.table,
                neighbors,
                &self.config,
                &mut self.rng,
            );
            StepOutcome {
                disposition: Disposition::Forwarded,
                hit,
                reinforcement,
                forwards,
            }
        } else {
            StepOutcome {
                disposition: Disposition::TtlExpired,
                hit,
                reinforcement,
                forwards: Vec::new(),
            }
        }
    }
}
