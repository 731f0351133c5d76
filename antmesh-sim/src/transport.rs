//! Transport delay model
//!
//! Stamps per-hop latency onto forwarded probes as they are enqueued. The
//! routing engine itself never decides latency.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Per-hop delivery latency in virtual time units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DelayModel {
    /// Every hop takes the same time
    Fixed(u64),
    /// Uniform random latency in `[min, max]`
    Uniform { min: u64, max: u64 },
}

impl Default for DelayModel {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

impl DelayModel {
    /// Sample the latency for one hop
    pub fn sample(&self, rng: &mut StdRng) -> u64 {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Uniform { min, max } => {
                if min >= max {
                    min
                } else {
                    rng.gen_range(min..=max)
                }
            }
        }
    }
}
