//! The `Update` record: the unit of replication for every CRDT in this
//! crate.
//!
//! An update is immutable once constructed and carries everything a peer
//! needs to replay it: which clock identity produced it, the logical
//! timestamp it was stamped with, and an operation payload whose shape
//! depends on the CRDT (`op` for the OR-set, a written value for a
//! register, and so on).

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// An immutable, replicated delta produced by a single CRDT operation.
///
/// Updates are totally ordered for merge purposes by `(timestamp,
/// clock_uuid)`; `Ord`/`PartialOrd` implement exactly that so a sequence of
/// updates can be sorted into replay order with `.sort()`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update<Op> {
    /// Identity of the clock that produced this update. A CRDT rejects any
    /// update whose `clock_uuid` doesn't match its own replica identity.
    pub clock_uuid: Uuid,
    /// Logical timestamp at which this update was stamped.
    pub timestamp: u64,
    /// The CRDT-specific operation payload.
    pub op: Op,
}

impl<Op> Update<Op> {
    pub fn new(clock_uuid: Uuid, timestamp: u64, op: Op) -> Self {
        Self {
            clock_uuid,
            timestamp,
            op,
        }
    }

    /// `(timestamp, clock_uuid)` key used for total-order merge comparisons.
    pub fn order_key(&self) -> (u64, Uuid) {
        (self.timestamp, self.clock_uuid)
    }
}

impl<Op: Serialize> Update<Op> {
    /// Deterministic byte encoding of this update. Two updates that are
    /// `PartialEq` always pack to the same bytes, and the packed bytes are
    /// the update's identity on the wire (fed into SHA-256 to form a merkle
    /// leaf id).
    pub fn pack(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Update encoding is infallible for owned data")
    }
}

impl<Op: DeserializeOwned> Update<Op> {
    pub fn unpack(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

impl<Op: PartialEq> PartialOrd for Update<Op> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<Op: Eq> Ord for Update<Op> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        let u = Update::new(Uuid::new_v4(), 3, "o".to_string());
        let bytes = u.pack();
        let back: Update<String> = Update::unpack(&bytes).unwrap();
        assert_eq!(u, back);
    }

    #[test]
    fn pack_is_deterministic() {
        let uuid = Uuid::new_v4();
        let u1 = Update::new(uuid, 1, vec![1u8, 2, 3]);
        let u2 = Update::new(uuid, 1, vec![1u8, 2, 3]);
        assert_eq!(u1.pack(), u2.pack());
    }

    #[test]
    fn pack_differs_on_different_payload() {
        let uuid = Uuid::new_v4();
        let u1 = Update::new(uuid, 1, vec![1u8]);
        let u2 = Update::new(uuid, 1, vec![2u8]);
        assert_ne!(u1.pack(), u2.pack());
    }

    #[test]
    fn order_key_breaks_ties_by_clock_uuid() {
        let low = Uuid::nil();
        let high = Uuid::max();
        let a = Update::new(low, 1, 0u8);
        let b = Update::new(high, 1, 0u8);
        assert!(a < b);
    }

    #[test]
    fn order_key_orders_by_timestamp_first() {
        let uuid = Uuid::new_v4();
        let a = Update::new(uuid, 1, 0u8);
        let b = Update::new(uuid, 2, 0u8);
        assert!(a < b);
    }
}
