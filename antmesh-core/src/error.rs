//! Error types for antmesh core

use thiserror::Error;

use crate::NodeId;

/// Result type alias using AntmeshError
pub type Result<T> = std::result::Result<T, AntmeshError>;

/// Errors that can occur in antmesh core operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AntmeshError {
    /// A protocol parameter is outside its valid range
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Node not found in the overlay
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// A node along a search path does not run the pheromone routing
    /// protocol. This indicates broken topology wiring and is fatal.
    #[error("node {0} does not expose the pheromone routing capability")]
    NotRoutable(NodeId),
}
