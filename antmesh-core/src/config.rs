//! Protocol configuration
//!
//! All tunables are injected at construction and validated up front: an
//! out-of-range parameter aborts before any simulation step runs, it is
//! never silently defaulted.

use serde::{Deserialize, Serialize};

use crate::error::{AntmeshError, Result};
use crate::{
    DEFAULT_ALPHA, DEFAULT_EVAPORATION, DEFAULT_HIGH_BOUND, DEFAULT_INITIAL_TTL, DEFAULT_LOW_BOUND,
    DEFAULT_Q1, DEFAULT_Q2,
};

/// Which neighbors receive a forwarded probe.
///
/// Selected once at setup via configuration, never by inspecting node types
/// at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ForwardingPolicy {
    /// Replicate to every eligible neighbor, TTL-adjusted per neighbor
    #[default]
    Flood,
    /// Forward a single copy to the most promising neighbor
    Greedy,
}

/// Per-node protocol parameters.
///
/// Logically constant for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Reinforcement scale for trail updates (must be positive)
    pub q1: f64,
    /// Reinforcement exponent coefficient for trail updates. The sign is an
    /// exploration/exploitation knob: negative gives diminishing returns,
    /// positive amplifies already-successful neighbors.
    pub q2: f64,
    /// Multiplicative trail decay in [0, 1), applied on every processed probe
    pub evaporation: f64,
    /// Pheromone level below which a forwarded probe loses one TTL
    pub low_bound: f64,
    /// Pheromone level above which a forwarded probe gains one TTL
    pub high_bound: f64,
    /// Greedy-variant exploration threshold in [0, 1]
    pub alpha: f64,
    /// Starting probe lifetime in hops (must be positive)
    pub initial_ttl: i32,
    /// Forwarding variant
    pub policy: ForwardingPolicy,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            q1: DEFAULT_Q1,
            q2: DEFAULT_Q2,
            evaporation: DEFAULT_EVAPORATION,
            low_bound: DEFAULT_LOW_BOUND,
            high_bound: DEFAULT_HIGH_BOUND,
            alpha: DEFAULT_ALPHA,
            initial_ttl: DEFAULT_INITIAL_TTL,
            policy: ForwardingPolicy::default(),
        }
    }
}

impl ProtocolConfig {
    /// Check every parameter against its documented range.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        if !(self.q1 > 0.0) {
            return Err(AntmeshError::InvalidParameter {
                name: "q1",
                value: self.q1,
                reason: "must be positive",
            });
        }
        if !self.q2.is_finite() {
            return Err(AntmeshError::InvalidParameter {
                name: "q2",
                value: self.q2,
                reason: "must be finite",
            });
        }
        if !(0.0..1.0).contains(&self.evaporation) {
            return Err(AntmeshError::InvalidParameter {
                name: "evaporation",
                value: self.evaporation,
                reason: "must be in [0, 1)",
            });
        }
        if !(0.0..=1.0).contains(&self.low_bound) || self.low_bound >= self.high_bound {
            return Err(AntmeshError::InvalidParameter {
                name: "low_bound",
                value: self.low_bound,
                reason: "must satisfy 0 <= low < high",
            });
        }
        if self.high_bound > 1.0 {
            return Err(AntmeshError::InvalidParameter {
                name: "high_bound",
                value: self.high_bound,
                reason: "must satisfy low < high <= 1",
            });
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(AntmeshError::InvalidParameter {
                name: "alpha",
                value: self.alpha,
                reason: "must be in [0, 1]",
            });
        }
        if self.initial_ttl <= 0 {
            return Err(AntmeshError::InvalidParameter {
                name: "initial_ttl",
                value: self.initial_ttl as f64,
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ProtocolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_q1_rejected() {
        let config = ProtocolConfig {
            q1: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AntmeshError::InvalidParameter { name: "q1", .. })
        ));
    }

    #[test]
    fn test_evaporation_must_stay_below_one() {
        let config = ProtocolConfig {
            evaporation: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProtocolConfig {
            evaporation: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bounds_must_be_ordered() {
        let config = ProtocolConfig {
            low_bound: 0.8,
            high_bound: 0.4,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProtocolConfig {
            low_bound: 0.5,
            high_bound: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = ProtocolConfig {
            initial_ttl: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AntmeshError::InvalidParameter {
                name: "initial_ttl",
                ..
            })
        ));
    }
}
