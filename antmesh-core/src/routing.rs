//! Routing decision engine - TTL-adaptive forwarding
//!
//! Every eligible neighbor (not yet visited, not the probe's
//! source) receives a replica whose TTL shrinks on weak trails and grows on
//! strong ones. The greedy variant instead picks a single neighbor,
//! exploiting the strongest trail or exploring uniformly below the `alpha`
//! threshold.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ForwardingPolicy, ProtocolConfig};
use crate::pheromone::PheromoneTable;
use crate::probe::Probe;
use crate::NodeId;

/// A probe handed to the transport collaborator, addressed to one neighbor.
///
/// The routing engine leaves `delay` at 0; the transport model stamps the
/// actual per-hop latency when the delivery is enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forward {
    pub probe: Probe,
    pub target: NodeId,
    pub delay: u64,
}

/// Adjust a replica's TTL from the trail level toward its target.
///
/// Levels strictly between the bounds leave the TTL unchanged.
pub fn adjust_ttl(ttl: i32, level: f64, low_bound: f64, high_bound: f64) -> i32 {
    if level < low_bound {
        ttl - 1
    } else if level > high_bound {
        ttl + 1
    } else {
        ttl
    }
}

/// Select the outgoing replicas for a probe at the current node.
///
/// `neighbors` is the stable, ordered neighbor view for this protocol step.
/// Replicas whose adjusted TTL is not positive are dropped here and never
/// reach the transport.
pub fn select_forwards(
    probe: &Probe,
    table: &PheromoneTable,
    neighbors: &[NodeId],
    config: &ProtocolConfig,
    rng: &mut StdRng,
) -> Vec<Forward> {
    let eligible: Vec<NodeId> = neighbors
        .iter()
        .copied()
        .filter(|n| !probe.has_visited(*n) && *n != probe.source)
        .collect();

    if eligible.is_empty() {
        return Vec::new();
    }

    match config.policy {
        ForwardingPolicy::Flood => eligible
            .iter()
            .filter_map(|m| forward_to(probe, table, *m, config))
            .collect(),
        ForwardingPolicy::Greedy => {
            let target = pick_greedy(table, &eligible, config.alpha, rng);
            forward_to(probe, table, target, config).into_iter().collect()
        }
    }
}

/// Replicate the probe toward one neighbor, TTL-adjusted. Returns None if
/// the replica would arrive dead.
fn forward_to(
    probe: &Probe,
    table: &PheromoneTable,
    target: NodeId,
    config: &ProtocolConfig,
) -> Option<Forward> {
    let mut replica = probe.replicate_for_forwarding();
    replica.ttl = adjust_ttl(
        replica.ttl,
        table.level(target),
        config.low_bound,
        config.high_bound,
    );

    if replica.ttl > 0 {
        Some(Forward {
            probe: replica,
            target,
            delay: 0,
        })
    } else {
        None
    }
}

/// Greedy selection: exploit the strongest trail when it clears the `alpha`
/// threshold, otherwise explore a uniformly random eligible neighbor.
/// Equal-strength trails are tie-broken through the injected RNG.
fn pick_greedy(
    table: &PheromoneTable,
    eligible: &[NodeId],
    alpha: f64,
    rng: &mut StdRng,
) -> NodeId {
    let best_level = eligible
        .iter()
        .map(|n| table.level(*n))
        .fold(f64::NEG_INFINITY, f64::max);

    if best_level < alpha {
        return eligible[rng.gen_range(0..eligible.len())];
    }

    let best: Vec<NodeId> = eligible
        .iter()
        .copied()
        .filter(|n| table.level(*n) == best_level)
        .collect();
    best[rng.gen_range(0..best.len())]
}
