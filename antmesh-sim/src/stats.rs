//! Search outcome accounting
//!
//! Collects per-run counters and per-hit path data, and defines the
//! fire-and-forget notifier interface external observers plug into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use antmesh_core::{HitReport, ResourceId};

/// Statistics/reporting sink for search outcomes.
///
/// Calls are fire-and-forget: the engine never reads anything back.
pub trait Notifier {
    /// A probe matched its query at some node
    fn on_hit(&mut self, report: &HitReport);

    /// Every probe of a search terminated without a single hit
    fn on_search_failed(&mut self, search_id: Uuid, query: ResourceId);
}

/// A notifier that records everything it is told, for tests and reports
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub hits: Vec<HitReport>,
    pub failures: Vec<(Uuid, ResourceId)>,
}

impl Notifier for RecordingNotifier {
    fn on_hit(&mut self, report: &HitReport) {
        self.hits.push(report.clone());
    }

    fn on_search_failed(&mut self, search_id: Uuid, query: ResourceId) {
        self.failures.push((search_id, query));
    }
}

/// Raw counters accumulated while the run executes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    /// Searches originated
    pub searches: u64,
    /// Query hits across all probes
    pub hits: u64,
    /// Searches that ended with no hit at all
    pub failed_searches: u64,
    /// Probe deliveries processed
    pub deliveries: u64,
    /// Replicas handed to the transport
    pub forwards: u64,
    /// Probes dropped by the loop guard
    pub loop_drops: u64,
    /// Probes that died of TTL exhaustion at a node
    pub ttl_drops: u64,
    /// Path lengths of every hit, in hit order
    pub hit_path_lengths: Vec<usize>,
}

impl SimStats {
    /// Record a hit's path length
    pub fn record_hit(&mut self, path_len: usize) {
        self.hits += 1;
        self.hit_path_lengths.push(path_len);
    }
}

/// The final report of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimReport {
    /// Nodes in the overlay
    pub nodes: usize,
    /// Undirected overlay edges
    pub edges: usize,
    /// Final virtual time
    pub virtual_time: u64,
    /// Raw counters
    pub stats: SimStats,
    /// Shortest hit path, if any search hit
    pub hit_path_min: Option<usize>,
    /// Mean hit path length
    pub hit_path_mean: Option<f64>,
    /// Longest hit path
    pub hit_path_max: Option<usize>,
    /// True when the run stopped at the delivery guard instead of draining
    pub truncated: bool,
    /// Wall-clock run boundaries
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SimReport {
    /// Assemble the report from raw counters
    pub fn from_stats(
        nodes: usize,
        edges: usize,
        virtual_time: u64,
        stats: SimStats,
        truncated: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        let lengths = &stats.hit_path_lengths;
        let hit_path_min = lengths.iter().min().copied();
        let hit_path_max = lengths.iter().max().copied();
        let hit_path_mean = if lengths.is_empty() {
            None
        } else {
            Some(lengths.iter().sum::<usize>() as f64 / lengths.len() as f64)
        };

        Self {
            nodes,
            edges,
            virtual_time,
            stats,
            hit_path_min,
            hit_path_mean,
            hit_path_max,
            truncated,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Fraction of searches that produced at least one hit
    pub fn success_rate(&self) -> f64 {
        if self.stats.searches == 0 {
            return 0.0;
        }
        (self.stats.searches - self.stats.failed_searches) as f64 / self.stats.searches as f64
    }
}

#[cfg(test)]
mod tests {
    use antmesh_core::NodeId;

    use super::*;

    #[test]
    fn test_path_length_aggregates() {
        let mut stats = SimStats::default();
        stats.searches = 3;
        stats.record_hit(2);
        stats.record_hit(5);
        stats.record_hit(2);
        stats.failed_searches = 1;

        let report = SimReport::from_stats(10, 20, 99, stats, false, Utc::now());

        assert_eq!(report.hit_path_min, Some(2));
        assert_eq!(report.hit_path_max, Some(5));
        assert!((report.hit_path_mean.unwrap() - 3.0).abs() < 1e-12);
        assert!((report.success_rate() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_hits_yields_no_path_stats() {
        let report = SimReport::from_stats(5, 4, 0, SimStats::default(), false, Utc::now());

        assert_eq!(report.hit_path_min, None);
        assert_eq!(report.hit_path_mean, None);
        assert_eq!(report.success_rate(), 0.0);
    }

    #[test]
    fn test_recording_notifier_keeps_everything() {
        let mut notifier = RecordingNotifier::default();

        let report = HitReport {
            search_id: Uuid::new_v4(),
            node: NodeId(3),
            query: ResourceId(1),
            hit_count: 1,
            path_len: 2,
            path: vec![NodeId(1), NodeId(3)],
        };
        notifier.on_hit(&report);
        notifier.on_search_failed(Uuid::new_v4(), ResourceId(9));

        assert_eq!(notifier.hits.len(), 1);
        assert_eq!(notifier.failures.len(), 1);
        assert_eq!(notifier.hits[0].node, NodeId(3));
    }
}
