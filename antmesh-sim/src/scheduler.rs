//! Virtual-time scheduler
//!
//! Orders probe deliveries by virtual time. Ties resolve by insertion
//! sequence, so identical runs replay identically.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use antmesh_core::{NodeId, Probe};

/// A probe due for delivery to a node at a virtual time
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Virtual delivery time
    pub time: u64,
    /// Insertion sequence, the tie-break for equal times
    pub seq: u64,
    /// The probe being delivered
    pub probe: Probe,
    /// The receiving node
    pub target: NodeId,
}

impl PartialEq for Delivery {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Delivery {}

impl Ord for Delivery {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap max-heap pops the earliest delivery
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Delivery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The pending-delivery queue advancing a virtual clock
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Delivery>,
    next_seq: u64,
    now: u64,
}

impl EventQueue {
    /// Create an empty queue at virtual time 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time (the time of the last popped delivery)
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Number of pending deliveries
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Is the queue drained?
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Queue a probe for delivery `delay` time units from now
    pub fn schedule(&mut self, delay: u64, probe: Probe, target: NodeId) {
        let delivery = Delivery {
            time: self.now + delay,
            seq: self.next_seq,
            probe,
            target,
        };
        self.next_seq += 1;
        self.heap.push(delivery);
    }

    /// Pop the next delivery, advancing the virtual clock to its time
    pub fn pop(&mut self) -> Option<Delivery> {
        let delivery = self.heap.pop()?;
        self.now = delivery.time;
        Some(delivery)
    }

    /// Virtual time of the next delivery, if any
    pub fn peek_time(&self) -> Option<u64> {
        self.heap.peek().map(|d| d.time)
    }
}

#[cfg(test)]
mod tests {
    use antmesh_core::ResourceId;

    use super::*;

    fn probe() -> Probe {
        Probe::builder(ResourceId(0)).source(NodeId(0)).build()
    }

    #[test]
    fn test_pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.schedule(5, probe(), NodeId(1));
        queue.schedule(1, probe(), NodeId(2));
        queue.schedule(3, probe(), NodeId(3));

        assert_eq!(queue.pop().unwrap().target, NodeId(2));
        assert_eq!(queue.pop().unwrap().target, NodeId(3));
        assert_eq!(queue.pop().unwrap().target, NodeId(1));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_equal_times_pop_in_insertion_order() {
        let mut queue = EventQueue::new();
        queue.schedule(2, probe(), NodeId(1));
        queue.schedule(2, probe(), NodeId(2));
        queue.schedule(2, probe(), NodeId(3));

        assert_eq!(queue.pop().unwrap().target, NodeId(1));
        assert_eq!(queue.pop().unwrap().target, NodeId(2));
        assert_eq!(queue.pop().unwrap().target, NodeId(3));
    }

    #[test]
    fn test_clock_advances_on_pop() {
        let mut queue = EventQueue::new();
        queue.schedule(4, probe(), NodeId(1));

        assert_eq!(queue.now(), 0);
        queue.pop();
        assert_eq!(queue.now(), 4);

        // Later schedules are relative to the advanced clock
        queue.schedule(2, probe(), NodeId(2));
        assert_eq!(queue.peek_time(), Some(6));
    }
}
