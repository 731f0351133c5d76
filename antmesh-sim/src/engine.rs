//! Simulation engine - wiring routers, workload and accounting together
//!
//! The engine owns every node's protocol instance and delivers one probe at
//! a time in virtual-time order, so no two steps for the same node ever
//! overlap. Cross-node effects returned by a step (forwards, reinforcement,
//! hit reports) are applied here, through the collaborator interfaces the
//! core defines.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use antmesh_core::{
    AntmeshError, Disposition, NodeId, PheromoneRouter, PheromoneTable, ProtocolConfig,
    ResourceId, ResourceStore, TableDirectory,
};

use crate::scheduler::{Delivery, EventQueue};
use crate::stats::{Notifier, SimReport, SimStats};
use crate::topology::{Overlay, TopologyKind};
use crate::transport::DelayModel;
use crate::{Result, SimError};

/// Full configuration of one simulation run.
///
/// Fields missing from a deserialized config file fall back to defaults.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of overlay nodes
    pub nodes: usize,
    /// Overlay shape
    pub topology: TopologyKind,
    /// Protocol parameters shared by every router
    pub protocol: ProtocolConfig,
    /// Per-hop latency model
    pub delay: DelayModel,
    /// Resource identifiers are drawn from `[0, resource_universe)`
    pub resource_universe: u64,
    /// Upper bound on randomly assigned resources per node
    pub max_resources_per_node: usize,
    /// Searches scheduled by `schedule_workload`
    pub searches: u64,
    /// Virtual time between scheduled searches
    pub search_interval: u64,
    /// Master seed; determines the overlay, resource placement and workload
    pub seed: u64,
    /// Hard stop on processed deliveries, against runaway amplification
    pub max_deliveries: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes: 50,
            topology: TopologyKind::default(),
            protocol: ProtocolConfig::default(),
            delay: DelayModel::default(),
            resource_universe: 50,
            max_resources_per_node: 2,
            searches: 20,
            search_interval: 10,
            seed: 42,
            max_deliveries: 1_000_000,
        }
    }
}

/// What a node slot actually runs.
///
/// Inert nodes model mis-wired topologies: routing a probe into one, or
/// reinforcing through one, aborts the run.
#[derive(Debug)]
pub enum NodeInstance {
    Router(PheromoneRouter),
    Inert,
}

/// Events emitted while a run executes
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A search was originated
    SearchStarted {
        search_id: Uuid,
        origin: NodeId,
        query: ResourceId,
    },
    /// A probe matched its query
    Hit {
        search_id: Uuid,
        node: NodeId,
        path_len: usize,
        hit_count: u32,
    },
    /// Every probe of a search died without a hit
    SearchFailed { search_id: Uuid, query: ResourceId },
    /// The delivery queue drained or hit the guard
    RunCompleted {
        deliveries: u64,
        virtual_time: u64,
    },
}

/// Per-search liveness accounting
#[derive(Debug)]
struct SearchState {
    query: ResourceId,
    live_probes: u64,
    hits: u64,
}

/// Directory view over the node registry, used to apply reinforcement plans
struct NodeDirectory<'a>(&'a mut BTreeMap<NodeId, NodeInstance>);

impl TableDirectory for NodeDirectory<'_> {
    fn table_mut(&mut self, node: NodeId) -> antmesh_core::Result<&mut PheromoneTable> {
        match self.0.get_mut(&node) {
            Some(NodeInstance::Router(router)) => Ok(router.table_mut()),
            Some(NodeInstance::Inert) => Err(AntmeshError::NotRoutable(node)),
            None => Err(AntmeshError::NodeNotFound(node)),
        }
    }
}

/// The discrete-event simulation engine
pub struct SimEngine {
    config: SimConfig,
    overlay: Overlay,
    nodes: BTreeMap<NodeId, NodeInstance>,
    queue: EventQueue,
    rng: StdRng,
    stats: SimStats,
    in_flight: HashMap<Uuid, SearchState>,
    notifier: Option<Box<dyn Notifier + Send>>,
    event_tx: mpsc::Sender<EngineEvent>,
    event_rx: Option<mpsc::Receiver<EngineEvent>>,
    started_at: DateTime<Utc>,
}

impl SimEngine {
    /// Build an engine, constructing the overlay from the config
    pub fn new(config: SimConfig) -> Result<Self> {
        if config.nodes == 0 {
            return Err(SimError::Config("node count must be positive".into()));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let overlay = Overlay::build(config.topology, config.nodes, &mut rng);
        Self::with_overlay_and_rng(config, overlay, rng)
    }

    /// Build an engine over an explicit overlay
    pub fn with_overlay(config: SimConfig, overlay: Overlay) -> Result<Self> {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::with_overlay_and_rng(config, overlay, rng)
    }

    fn with_overlay_and_rng(
        config: SimConfig,
        overlay: Overlay,
        mut rng: StdRng,
    ) -> Result<Self> {
        // Invalid protocol parameters abort here, before any probe moves
        config.protocol.validate()?;

        let mut nodes = BTreeMap::new();
        for id in overlay.node_ids() {
            let mut router = PheromoneRouter::new(id, config.protocol.clone(), rng.gen())?;
            for neighbor in overlay.neighbors_of(id) {
                router.register_neighbor(*neighbor);
            }
            let resources = ResourceStore::assign_random(
                &mut rng,
                config.resource_universe,
                config.max_resources_per_node,
            );
            for resource in resources.iter() {
                router.add_resource(resource);
            }
            nodes.insert(id, NodeInstance::Router(router));
        }

        info!(
            nodes = overlay.node_count(),
            edges = overlay.edge_count(),
            "engine ready"
        );

        let (event_tx, event_rx) = mpsc::channel(1024);

        Ok(Self {
            config,
            overlay,
            nodes,
            queue: EventQueue::new(),
            rng,
            stats: SimStats::default(),
            in_flight: HashMap::new(),
            notifier: None,
            event_tx,
            event_rx: Some(event_rx),
            started_at: Utc::now(),
        })
    }

    /// Take the event receiver (can only be taken once)
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<EngineEvent>> {
        self.event_rx.take()
    }

    /// Install a notifier for hit/failure callbacks
    pub fn set_notifier(&mut self, notifier: Box<dyn Notifier + Send>) {
        self.notifier = Some(notifier);
    }

    /// The overlay being routed over
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Read a node's router, if the node runs one
    pub fn router(&self, id: NodeId) -> Option<&PheromoneRouter> {
        match self.nodes.get(&id) {
            Some(NodeInstance::Router(router)) => Some(router),
            _ => None,
        }
    }

    /// Mutable router access, for seeding resources in experiments
    pub fn router_mut(&mut self, id: NodeId) -> Option<&mut PheromoneRouter> {
        match self.nodes.get_mut(&id) {
            Some(NodeInstance::Router(router)) => Some(router),
            _ => None,
        }
    }

    /// Replace a node's protocol with an inert one (mis-wiring simulation)
    pub fn make_inert(&mut self, id: NodeId) -> Result<()> {
        match self.nodes.get_mut(&id) {
            Some(slot) => {
                *slot = NodeInstance::Inert;
                Ok(())
            }
            None => Err(AntmeshError::NodeNotFound(id).into()),
        }
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Current virtual time
    pub fn virtual_time(&self) -> u64 {
        self.queue.now()
    }

    /// Originate a search now
    pub fn start_search(&mut self, origin: NodeId, query: ResourceId) -> Result<Uuid> {
        self.start_search_at(origin, query, 0)
    }

    /// Originate a search `delay` virtual time units from now
    pub fn start_search_at(
        &mut self,
        origin: NodeId,
        query: ResourceId,
        delay: u64,
    ) -> Result<Uuid> {
        let probe = match self.nodes.get(&origin) {
            Some(NodeInstance::Router(router)) => router.originate(query),
            Some(NodeInstance::Inert) => return Err(AntmeshError::NotRoutable(origin).into()),
            None => return Err(AntmeshError::NodeNotFound(origin).into()),
        };

        let search_id = probe.search_id;
        self.in_flight.insert(
            search_id,
            SearchState {
                query,
                live_probes: 1,
                hits: 0,
            },
        );
        self.stats.searches += 1;
        self.queue.schedule(delay, probe, origin);

        debug!(%origin, %query, "search started");
        let _ = self.event_tx.try_send(EngineEvent::SearchStarted {
            search_id,
            origin,
            query,
        });

        Ok(search_id)
    }

    /// Schedule the configured workload: random origins querying random
    /// resources, one search per `search_interval`
    pub fn schedule_workload(&mut self) -> Result<()> {
        if self.config.searches > 0 && self.config.resource_universe == 0 {
            return Err(SimError::Config(
                "resource_universe must be positive to schedule searches".into(),
            ));
        }

        for i in 0..self.config.searches {
            let origin = NodeId(self.rng.gen_range(0..self.overlay.node_count() as u64));
            let query = ResourceId(self.rng.gen_range(0..self.config.resource_universe));
            self.start_search_at(origin, query, i * self.config.search_interval)?;
        }

        Ok(())
    }

    /// Process one delivery. Returns its virtual time, or None when the
    /// queue is drained.
    pub fn step(&mut self) -> Result<Option<u64>> {
        let Some(delivery) = self.queue.pop() else {
            return Ok(None);
        };
        let Delivery {
            time,
            probe,
            target,
            ..
        } = delivery;
        let search_id = probe.search_id;
        self.stats.deliveries += 1;

        let neighbors = self.overlay.neighbors_of(target).to_vec();
        let outcome = match self.nodes.get_mut(&target) {
            Some(NodeInstance::Router(router)) => router.handle_probe(probe, &neighbors),
            Some(NodeInstance::Inert) => return Err(AntmeshError::NotRoutable(target).into()),
            None => return Err(AntmeshError::NodeNotFound(target).into()),
        };

        // Path reinforcement walks other nodes' tables, strictly in plan
        // order; a non-routable node on the path aborts the run.
        if let Some(plan) = &outcome.reinforcement {
            plan.apply(&mut NodeDirectory(&mut self.nodes))?;
        }

        if let Some(hit) = &outcome.hit {
            self.stats.record_hit(hit.path_len);
            if let Some(state) = self.in_flight.get_mut(&search_id) {
                state.hits += 1;
            }
            if let Some(notifier) = self.notifier.as_mut() {
                notifier.on_hit(hit);
            }
            debug!(node = %hit.node, path_len = hit.path_len, "query hit");
            let _ = self.event_tx.try_send(EngineEvent::Hit {
                search_id,
                node: hit.node,
                path_len: hit.path_len,
                hit_count: hit.hit_count,
            });
        }

        match outcome.disposition {
            Disposition::LoopDropped => self.stats.loop_drops += 1,
            Disposition::TtlExpired => self.stats.ttl_drops += 1,
            Disposition::Forwarded => {}
        }

        let forwarded = outcome.forwards.len() as u64;
        for forward in outcome.forwards {
            let delay = self.config.delay.sample(&mut self.rng);
            self.queue.schedule(delay, forward.probe, forward.target);
        }
        self.stats.forwards += forwarded;

        // The consumed probe is gone; its replicas are now live
        let depleted = match self.in_flight.get_mut(&search_id) {
            Some(state) => {
                state.live_probes = state.live_probes + forwarded - 1;
                state.live_probes == 0
            }
            None => false,
        };
        let finished = if depleted {
            self.in_flight.remove(&search_id)
        } else {
            None
        };
        if let Some(state) = finished {
            if state.hits == 0 {
                self.stats.failed_searches += 1;
                if let Some(notifier) = self.notifier.as_mut() {
                    notifier.on_search_failed(search_id, state.query);
                }
                debug!(query = %state.query, "search failed");
                let _ = self.event_tx.try_send(EngineEvent::SearchFailed {
                    search_id,
                    query: state.query,
                });
            }
        }

        Ok(Some(time))
    }

    /// Drain the delivery queue synchronously
    pub fn run_to_completion(&mut self) -> Result<SimReport> {
        let mut truncated = false;
        while !self.queue.is_empty() {
            if self.stats.deliveries >= self.config.max_deliveries {
                warn!(
                    deliveries = self.stats.deliveries,
                    "delivery guard reached, stopping run"
                );
                truncated = true;
                break;
            }
            self.step()?;
        }
        Ok(self.finish(truncated))
    }

    /// Drain the delivery queue one delivery per wall-clock tick, for live
    /// observation through the event stream
    pub async fn run_paced(&mut self, tick: std::time::Duration) -> Result<SimReport> {
        let mut ticker = tokio::time::interval(tick);
        let mut truncated = false;
        loop {
            ticker.tick().await;
            if self.queue.is_empty() {
                break;
            }
            if self.stats.deliveries >= self.config.max_deliveries {
                truncated = true;
                break;
            }
            self.step()?;
        }
        Ok(self.finish(truncated))
    }

    fn finish(&self, truncated: bool) -> SimReport {
        let _ = self.event_tx.try_send(EngineEvent::RunCompleted {
            deliveries: self.stats.deliveries,
            virtual_time: self.queue.now(),
        });
        SimReport::from_stats(
            self.overlay.node_count(),
            self.overlay.edge_count(),
            self.queue.now(),
            self.stats.clone(),
            truncated,
            self.started_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use antmesh_core::ForwardingPolicy;

    use super::*;
    use crate::stats::RecordingNotifier;

    /// Config with no random resources, so tests control placement exactly
    fn bare_config() -> SimConfig {
        SimConfig {
            resource_universe: 0,
            max_resources_per_node: 0,
            searches: 0,
            ..Default::default()
        }
    }

    fn line_overlay() -> Overlay {
        let mut overlay = Overlay::new(3);
        overlay.connect(NodeId(0), NodeId(1));
        overlay.connect(NodeId(1), NodeId(2));
        overlay
    }

    #[test]
    fn test_line_search_hits_and_reinforces() {
        let mut engine = SimEngine::with_overlay(bare_config(), line_overlay()).unwrap();
        engine.router_mut(NodeId(2)).unwrap().add_resource(ResourceId(7));

        engine.start_search(NodeId(0), ResourceId(7)).unwrap();
        let report = engine.run_to_completion().unwrap();

        assert_eq!(report.stats.searches, 1);
        assert_eq!(report.stats.failed_searches, 0);
        assert!(report.stats.hits >= 1);

        // First hit travels 0 -> 1 -> 2
        assert_eq!(report.stats.hit_path_lengths[0], 3);

        // Both edges of the successful path were reinforced
        assert_eq!(
            engine.router(NodeId(0)).unwrap().table().query_hits(NodeId(1)),
            1
        );
        assert_eq!(
            engine.router(NodeId(1)).unwrap().table().query_hits(NodeId(2)),
            1
        );
        // The reverse direction was not
        assert_eq!(
            engine.router(NodeId(1)).unwrap().table().query_hits(NodeId(0)),
            0
        );
    }

    /// Notifier handle that stays readable after the engine takes ownership
    #[derive(Clone, Default)]
    struct SharedNotifier(std::sync::Arc<std::sync::Mutex<RecordingNotifier>>);

    impl Notifier for SharedNotifier {
        fn on_hit(&mut self, report: &antmesh_core::HitReport) {
            self.0.lock().unwrap().on_hit(report);
        }
        fn on_search_failed(&mut self, search_id: Uuid, query: ResourceId) {
            self.0.lock().unwrap().on_search_failed(search_id, query);
        }
    }

    #[test]
    fn test_search_with_no_holder_fails() {
        let mut engine = SimEngine::with_overlay(bare_config(), line_overlay()).unwrap();
        let shared = SharedNotifier::default();
        engine.set_notifier(Box::new(shared.clone()));

        engine.start_search(NodeId(0), ResourceId(9)).unwrap();
        let report = engine.run_to_completion().unwrap();

        assert_eq!(report.stats.failed_searches, 1);
        assert_eq!(report.stats.hits, 0);

        let recorded = shared.0.lock().unwrap();
        assert_eq!(recorded.failures.len(), 1);
        assert_eq!(recorded.failures[0].1, ResourceId(9));
        assert!(recorded.hits.is_empty());
    }

    #[test]
    fn test_full_runs_are_deterministic() {
        let config = SimConfig {
            nodes: 20,
            resource_universe: 20,
            searches: 10,
            seed: 7,
            ..Default::default()
        };

        let run = |config: SimConfig| {
            let mut engine = SimEngine::new(config).unwrap();
            engine.schedule_workload().unwrap();
            engine.run_to_completion().unwrap()
        };

        let a = run(config.clone());
        let b = run(config);

        assert_eq!(a.stats, b.stats);
        assert_eq!(a.virtual_time, b.virtual_time);
    }

    #[test]
    fn test_greedy_policy_runs_single_replicas() {
        let config = SimConfig {
            nodes: 15,
            resource_universe: 15,
            searches: 5,
            protocol: ProtocolConfig {
                policy: ForwardingPolicy::Greedy,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut engine = SimEngine::new(config).unwrap();
        engine.schedule_workload().unwrap();
        let report = engine.run_to_completion().unwrap();

        // Greedy never replicates a probe more than once per step
        assert!(report.stats.forwards <= report.stats.deliveries);
        assert_eq!(report.stats.searches, 5);
    }

    #[test]
    fn test_probe_into_inert_node_aborts() {
        let mut engine = SimEngine::with_overlay(bare_config(), line_overlay()).unwrap();
        engine.make_inert(NodeId(1)).unwrap();

        engine.start_search(NodeId(0), ResourceId(1)).unwrap();
        let result = engine.run_to_completion();

        assert!(matches!(
            result,
            Err(SimError::Core(AntmeshError::NotRoutable(NodeId(1))))
        ));
    }

    #[test]
    fn test_search_from_inert_node_rejected() {
        let mut engine = SimEngine::with_overlay(bare_config(), line_overlay()).unwrap();
        engine.make_inert(NodeId(0)).unwrap();

        assert!(engine.start_search(NodeId(0), ResourceId(1)).is_err());
        assert!(engine.start_search(NodeId(9), ResourceId(1)).is_err());
    }

    #[test]
    fn test_invalid_protocol_config_rejected_up_front() {
        let config = SimConfig {
            protocol: ProtocolConfig {
                evaporation: 1.5,
                ..Default::default()
            },
            ..bare_config()
        };
        assert!(SimEngine::new(config).is_err());
    }

    #[test]
    fn test_mesh_run_terminates() {
        // Cyclic overlay, no resources anywhere: every probe must still die
        let config = SimConfig {
            nodes: 6,
            topology: TopologyKind::FullMesh,
            resource_universe: 0,
            max_resources_per_node: 0,
            searches: 0,
            ..Default::default()
        };
        let mut engine = SimEngine::new(config).unwrap();
        engine.start_search(NodeId(0), ResourceId(3)).unwrap();

        let report = engine.run_to_completion().unwrap();

        assert!(!report.truncated);
        assert!(report.stats.deliveries > 0);
        assert_eq!(report.stats.failed_searches, 1);
    }

    #[tokio::test]
    async fn test_paced_run_emits_events() {
        let mut engine = SimEngine::with_overlay(bare_config(), line_overlay()).unwrap();
        engine.router_mut(NodeId(2)).unwrap().add_resource(ResourceId(4));
        let mut events = engine.take_events().unwrap();

        engine.start_search(NodeId(0), ResourceId(4)).unwrap();
        let report = engine
            .run_paced(std::time::Duration::from_millis(1))
            .await
            .unwrap();

        assert!(report.stats.hits >= 1);

        let mut saw_start = false;
        let mut saw_hit = false;
        let mut saw_completed = false;
        while let Ok(event) = events.try_recv() {
            match event {
                EngineEvent::SearchStarted { .. } => saw_start = true,
                EngineEvent::Hit { .. } => saw_hit = true,
                EngineEvent::RunCompleted { .. } => saw_completed = true,
                EngineEvent::SearchFailed { .. } => {}
            }
        }
        assert!(saw_start && saw_hit && saw_completed);
    }
}
