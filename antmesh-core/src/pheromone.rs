//! Pheromone table - per-neighbor trail state
//!
//! One instance per node, owned exclusively by that node's router. Keeps a
//! pheromone level and a query-hit counter per neighbor; the two maps always
//! hold the same key set.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::NodeId;

/// Pheromone and query-hit state for one node's neighbors.
///
/// Levels form a probability distribution over neighbors after every
/// `normalize()`; evaporation alone deliberately leaves the sum below 1
/// until the next update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PheromoneTable {
    /// Reinforcement scale for trail updates
    q1: f64,
    /// Reinforcement exponent coefficient for trail updates
    q2: f64,
    /// Pheromone level per neighbor
    pheromone: HashMap<NodeId, f64>,
    /// Query hits observed through each neighbor, input to the update rule
    query_hits: HashMap<NodeId, u32>,
}

impl PheromoneTable {
    /// Create an empty table with the given update parameters
    pub fn new(q1: f64, q2: f64) -> Self {
        Self {
            q1,
            q2,
            pheromone: HashMap::new(),
            query_hits: HashMap::new(),
        }
    }

    /// Create a table with explicit trail levels and zero hit counts.
    ///
    /// Levels are taken as-is; call `normalize()` if a distribution is
    /// required.
    pub fn with_levels(q1: f64, q2: f64, levels: impl IntoIterator<Item = (NodeId, f64)>) -> Self {
        let pheromone: HashMap<NodeId, f64> = levels.into_iter().collect();
        let query_hits = pheromone.keys().map(|n| (*n, 0)).collect();
        Self {
            q1,
            q2,
            pheromone,
            query_hits,
        }
    }

    /// Register a new neighbor with a random positive trail level, then
    /// re-normalize so the table stays a distribution.
    ///
    /// Returns false if the neighbor was already registered.
    pub fn register_neighbor(&mut self, neighbor: NodeId, rng: &mut StdRng) -> bool {
        if self.pheromone.contains_key(&neighbor) {
            return false;
        }

        self.pheromone
            .insert(neighbor, rng.gen_range(f64::EPSILON..1.0));
        self.query_hits.insert(neighbor, 0);
        self.normalize();

        true
    }

    /// Is `neighbor` registered?
    pub fn contains(&self, neighbor: NodeId) -> bool {
        self.pheromone.contains_key(&neighbor)
    }

    /// Number of registered neighbors
    pub fn len(&self) -> usize {
        self.pheromone.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.pheromone.is_empty()
    }

    /// Pheromone level for a neighbor. Absent neighbors read as 0 and are
    /// never implicitly created.
    pub fn level(&self, neighbor: NodeId) -> f64 {
        self.pheromone.get(&neighbor).copied().unwrap_or(0.0)
    }

    /// Query hits recorded through a neighbor
    pub fn query_hits(&self, neighbor: NodeId) -> u32 {
        self.query_hits.get(&neighbor).copied().unwrap_or(0)
    }

    /// Sum of all trail levels
    pub fn total(&self) -> f64 {
        self.pheromone.values().sum()
    }

    /// Increment the query-hit counter for a neighbor.
    ///
    /// Returns false (and records nothing) if the node is not a registered
    /// neighbor; a reinforcement path may legitimately traverse edges this
    /// table has never seen.
    pub fn increment_query_hit(&mut self, neighbor: NodeId) -> bool {
        match self.query_hits.get_mut(&neighbor) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    /// Reinforce every trail after a successful query.
    ///
    /// `delta(n) = q1 * exp(q2 * query_hits(n))`, added to each level. Runs
    /// before normalization.
    pub fn update(&mut self) {
        for (neighbor, level) in self.pheromone.iter_mut() {
            let hits = self.query_hits.get(neighbor).copied().unwrap_or(0);
            let delta = self.q1 * (self.q2 * hits as f64).exp();
            *level += delta;
        }
    }

    /// Rescale the table into a probability distribution.
    ///
    /// A zero sum (empty table) leaves every entry unchanged; levels are
    /// never invented for neighbors that have earned none.
    pub fn normalize(&mut self) {
        let sum = self.total();
        if sum <= 0.0 {
            return;
        }
        for level in self.pheromone.values_mut() {
            *level /= sum;
        }
    }

    /// Decay every trail by the evaporation rate.
    ///
    /// Runs on every processed probe, hit or miss, and is not followed by a
    /// normalization of its own.
    pub fn evaporate(&mut self, rate: f64) {
        for level in self.pheromone.values_mut() {
            *level *= 1.0 - rate;
        }
    }

    /// Reinforce the edge toward `downstream` after a hit further along the
    /// path: bump its query-hit counter, then update and normalize the whole
    /// table.
    ///
    /// Returns false if `downstream` is not a registered neighbor, in which
    /// case the table is left untouched.
    pub fn reinforce_edge(&mut self, downstream: NodeId) -> bool {
        if !self.increment_query_hit(downstream) {
            return false;
        }
        self.update();
        self.normalize();
        true
    }

    /// Iterate over `(neighbor, level)` pairs in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.pheromone.iter().map(|(n, l)| (*n, *l))
    }
}
