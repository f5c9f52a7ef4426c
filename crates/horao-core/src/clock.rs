//! Lamport-style scalar clock.
//!
//! Each replica owns one clock: a monotonic counter plus a stable UUID
//! generated once at construction. Counters give a total order on a single
//! replica; the UUID breaks ties when comparing timestamps that originated
//! on different replicas.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// A monotonic logical timestamp paired with the replica that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarClock {
    counter: u64,
    replica_id: Uuid,
}

impl ScalarClock {
    /// Create a new clock for a fresh replica, starting the counter at 0.
    pub fn new() -> Self {
        Self {
            counter: 0,
            replica_id: Uuid::new_v4(),
        }
    }

    /// Create a clock with an explicit replica identity, used when a
    /// replica's identity must be stable across process restarts.
    pub fn with_replica_id(replica_id: Uuid) -> Self {
        Self {
            counter: 0,
            replica_id,
        }
    }

    /// This replica's stable identity.
    pub fn replica_id(&self) -> Uuid {
        self.replica_id
    }

    /// Current counter value. Non-mutating.
    pub fn read(&self) -> u64 {
        self.counter
    }

    /// Fold in an observed remote timestamp and return the new counter.
    ///
    /// `counter <- max(counter, t_remote) + 1`. Calling this with the same
    /// or a smaller `t_remote` repeatedly still advances the counter, so it
    /// is safe to call unconditionally before materializing a local update.
    pub fn update(&mut self, t_remote: u64) -> u64 {
        self.counter = self.counter.max(t_remote) + 1;
        self.counter
    }

    /// Bump the counter for a purely local event and return the new value.
    pub fn read_and_bump(&mut self) -> u64 {
        self.update(self.counter)
    }

    /// True when `a` causally follows `b` under this clock's tiebreak rule.
    /// The scalar clock has no concurrent pairs: counters are totally
    /// ordered, and a tie is broken by replica id.
    pub fn is_later(&self, a: (u64, Uuid), b: (u64, Uuid)) -> bool {
        self.compare(a, b) == 1
    }

    /// Scalar clocks admit no concurrency: every pair of timestamps compares
    /// strictly less, equal, or greater. This always returns `false`; it
    /// exists so higher layers (e.g. a wall-clock hybrid) can widen the
    /// concurrent band without changing call sites.
    pub fn are_concurrent(&self, _a: (u64, Uuid), _b: (u64, Uuid)) -> bool {
        false
    }

    /// `-1` if `a` precedes `b`, `0` if equal, `1` if `a` follows `b`.
    pub fn compare(&self, a: (u64, Uuid), b: (u64, Uuid)) -> i8 {
        match a.0.cmp(&b.0) {
            Ordering::Less => -1,
            Ordering::Greater => 1,
            Ordering::Equal => match a.1.cmp(&b.1) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            },
        }
    }
}

impl Default for ScalarClock {
    fn default() -> Self {
        Self::new()
    }
}
