//! Probe primitive - the search ant
//!
//! A probe carries a query through the overlay, recording every node it
//! visits. Probes are replicated, never mutated in place, when forwarded:
//! each hop produces a fresh value with its own copy of the path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resource::ResourceId;
use crate::NodeId;

/// A search probe ("ant") routed through the overlay.
///
/// Copy semantics on replication: `source`, `query`, `hit_count` and
/// `search_id` carry over unchanged, `path` is deep-copied, `id` is fresh
/// and `ttl` is adjusted by the routing decision. The path never contains a
/// duplicate node while the probe is live; a revisit drops the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// Unique identifier of this replica
    pub id: Uuid,

    /// Shared identifier of the originating search, common to all replicas
    pub search_id: Uuid,

    /// Identity of the originating node
    pub source: NodeId,

    /// The resource being searched for
    pub query: ResourceId,

    /// Remaining hop budget. Signed: high-confidence edges may push it above
    /// the starting value.
    pub ttl: i32,

    /// Number of nodes along the path that matched the query so far
    pub hit_count: u32,

    /// Nodes visited so far, in visitation order. The reverse of this
    /// sequence is the reinforcement path.
    path: Vec<NodeId>,
}

impl Probe {
    /// Create a new probe builder for the given query
    pub fn builder(query: ResourceId) -> ProbeBuilder {
        ProbeBuilder::new(query)
    }

    /// Has this probe already visited `node`?
    pub fn has_visited(&self, node: NodeId) -> bool {
        self.path.contains(&node)
    }

    /// Append `node` to the recorded path.
    ///
    /// Callers must check `has_visited` first; the path stays duplicate-free.
    pub fn record_visit(&mut self, node: NodeId) {
        debug_assert!(!self.has_visited(node));
        self.path.push(node);
    }

    /// The visited path, oldest first
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    /// Number of hops taken so far
    pub fn hops(&self) -> usize {
        self.path.len()
    }

    /// Record a query match at the current node
    pub fn register_hit(&mut self) {
        self.hit_count += 1;
    }

    /// Has any node along the path matched the query?
    pub fn is_hit(&self) -> bool {
        self.hit_count > 0
    }

    /// Replicate this probe for forwarding to another neighbor.
    ///
    /// The replica gets a fresh `id` and its own copy of the path; the TTL
    /// starts at the current value and is adjusted afterwards by the routing
    /// decision.
    pub fn replicate_for_forwarding(&self) -> Probe {
        Probe {
            id: Uuid::new_v4(),
            search_id: self.search_id,
            source: self.source,
            query: self.query,
            ttl: self.ttl,
            hit_count: self.hit_count,
            path: self.path.clone(),
        }
    }
}

/// Builder for creating probes
#[derive(Debug)]
pub struct ProbeBuilder {
    query: ResourceId,
    source: NodeId,
    ttl: i32,
}

impl ProbeBuilder {
    /// Create a new probe builder
    pub fn new(query: ResourceId) -> Self {
        Self {
            query,
            source: NodeId(0),
            ttl: crate::DEFAULT_INITIAL_TTL,
        }
    }

    /// Set the originating node
    pub fn source(mut self, source: NodeId) -> Self {
        self.source = source;
        self
    }

    /// Set the starting hop budget
    pub fn ttl(mut self, ttl: i32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Build the probe with an empty path
    pub fn build(self) -> Probe {
        Probe {
            id: Uuid::new_v4(),
            search_id: Uuid::new_v4(),
            source: self.source,
            query: self.query,
            ttl: self.ttl,
            hit_count: 0,
            path: Vec::new(),
        }
    }
}
