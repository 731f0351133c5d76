//! Resource store - what a node can answer for
//!
//! Resources are abstracted as opaque identifiers. Stores are filled at
//! setup and read-only while probes are in flight.

use std::collections::HashSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Opaque identifier for a resource
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// The set of resources a node holds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStore {
    held: HashSet<ResourceId>,
}

impl ResourceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw up to `max_per_node` resources from a universe of
    /// `universe` identifiers. Duplicate draws collapse, so a node may end
    /// up with fewer resources than drawn.
    pub fn assign_random(rng: &mut StdRng, universe: u64, max_per_node: usize) -> Self {
        let mut store = Self::new();

        if universe == 0 {
            return store;
        }

        let count = rng.gen_range(0..=max_per_node);
        for _ in 0..count {
            store.insert(ResourceId(rng.gen_range(0..universe)));
        }

        store
    }

    /// Add a resource. Returns false if already held.
    pub fn insert(&mut self, resource: ResourceId) -> bool {
        self.held.insert(resource)
    }

    /// Can this store satisfy a query for `resource`?
    pub fn has(&self, resource: ResourceId) -> bool {
        self.held.contains(&resource)
    }

    /// Number of held resources
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Is the store empty?
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Iterate over held resources in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.held.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut store = ResourceStore::new();

        assert!(store.insert(ResourceId(3)));
        assert!(!store.insert(ResourceId(3)));

        assert!(store.has(ResourceId(3)));
        assert!(!store.has(ResourceId(4)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_random_assignment_stays_in_universe() {
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..50 {
            let store = ResourceStore::assign_random(&mut rng, 10, 3);
            assert!(store.len() <= 3);
            assert!(store.iter().all(|r| r.0 < 10));
        }
    }

    #[test]
    fn test_random_assignment_is_deterministic() {
        let a = ResourceStore::assign_random(&mut StdRng::seed_from_u64(5), 100, 3);
        let b = ResourceStore::assign_random(&mut StdRng::seed_from_u64(5), 100, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_universe_yields_empty_store() {
        let mut rng = StdRng::seed_from_u64(1);
        let store = ResourceStore::assign_random(&mut rng, 0, 3);
        assert!(store.is_empty());
    }
}
