//! Order number generation.
//!
//! Format: `yyyyMMddHHmmss` (UTC) + 2-digit node id + 6-digit sequence, 22 digits
//! in total. The sequence starts at a random offset and wraps at one million, so
//! two numbers from one node only collide after a million orders in the same
//! second. A unique index on the durable side turns any residual collision into a
//! compensated persistence failure.

use chrono::{DateTime, Utc};
use flashsale_core::{OrderNumber, OrderNumberGenerator};
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};

const SEQUENCE_SPACE: u32 = 1_000_000;

/// Highest accepted node id.
pub const MAX_NODE_ID: u8 = 99;

/// Timestamp + node + sequence order numbers.
#[derive(Debug)]
pub struct SequencedOrderNumbers {
    node_id: u8,
    sequence: AtomicU32,
}

impl SequencedOrderNumbers {
    /// Create a generator for `node_id` (reduced modulo 100), starting at a random
    /// sequence offset.
    #[must_use]
    pub fn new(node_id: u8) -> Self {
        Self::starting_at(node_id, rand::thread_rng().gen_range(0..SEQUENCE_SPACE))
    }

    /// Create a generator with a fixed starting sequence.
    #[must_use]
    pub const fn starting_at(node_id: u8, sequence: u32) -> Self {
        Self {
            node_id: node_id % (MAX_NODE_ID + 1),
            sequence: AtomicU32::new(sequence % SEQUENCE_SPACE),
        }
    }
}

impl OrderNumberGenerator for SequencedOrderNumbers {
    fn next(&self, now: DateTime<Utc>) -> OrderNumber {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) % SEQUENCE_SPACE;
        OrderNumber::new(format!(
            "{}{:02}{:06}",
            now.format("%Y%m%d%H%M%S"),
            self.node_id,
            sequence
        ))
    }
}
