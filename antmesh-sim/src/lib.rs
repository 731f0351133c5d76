//! # Antmesh Sim
//!
//! Discrete-event simulation runtime for the antmesh protocol.
//!
//! Provides the collaborators the protocol core expects:
//! - Overlay topology construction (ring, grid, mesh, random, small-world,
//!   scale-free)
//! - Virtual-time scheduler delivering one probe to one node at a time
//! - Transport delay model for per-hop latency
//! - Simulation engine wiring routers, workload, reinforcement and stats
//!   together, with an event stream for observers

pub mod engine;
pub mod scheduler;
pub mod stats;
pub mod topology;
pub mod transport;

pub use engine::{EngineEvent, NodeInstance, SimConfig, SimEngine};
pub use scheduler::{Delivery, EventQueue};
pub use stats::{Notifier, RecordingNotifier, SimReport, SimStats};
pub use topology::{Overlay, TopologyKind};
pub use transport::DelayModel;

use thiserror::Error;

/// Result type alias using SimError
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised by the simulation runtime
#[derive(Error, Debug)]
pub enum SimError {
    /// A protocol-level error, always fatal for the run
    #[error(transparent)]
    Core(#[from] antmesh_core::AntmeshError),

    /// The simulation setup is unusable
    #[error("invalid simulation config: {0}")]
    Config(String),

    /// An unrecognized topology name was given
    #[error("unknown topology: {0}")]
    UnknownTopology(String),
}
