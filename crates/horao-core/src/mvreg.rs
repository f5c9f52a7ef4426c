//! Multi-Value (MV) register.
//!
//! Like [`crate::lwwreg::LwwRegister`], but a write that ties the current
//! timestamp is kept alongside the incumbent value instead of being
//! resolved by a tiebreak — the register surfaces every value written at
//! the latest timestamp and lets the caller decide. A strictly later write
//! still clears prior values outright.

use crate::clock::ScalarClock;
use crate::crdt::{Checksum, Crdt, CrdtError, Listener, ListenerId, ListenerRegistry};
use crate::update::Update;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// The operation carried by an MV-register update: write a value under a
/// writer's id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWrite<T, W> {
    pub value: T,
    pub writer_id: W,
}

/// Sort owned values by their bincode-packed byte representation rather
/// than `T`'s native `Ord`, so the result is deterministic even when the
/// two orderings diverge.
fn sorted_by_packed_bytes<T: Clone + Serialize>(values: &BTreeSet<T>) -> Vec<T> {
    let mut items: Vec<T> = values.iter().cloned().collect();
    items.sort_by(|a, b| {
        let pa = bincode::serialize(a).expect("mv-register value encoding is infallible");
        let pb = bincode::serialize(b).expect("mv-register value encoding is infallible");
        pa.cmp(&pb)
    });
    items
}

pub struct MvRegister<T, W> {
    clock: ScalarClock,
    values: BTreeSet<T>,
    last_update_ts: u64,
    history: Vec<Update<RegisterWrite<T, W>>>,
    listeners: ListenerRegistry<RegisterWrite<T, W>>,
}

impl<T: Ord + Clone, W> MvRegister<T, W> {
    pub fn new() -> Self {
        Self {
            clock: ScalarClock::new(),
            values: BTreeSet::new(),
            last_update_ts: 0,
            history: Vec::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn with_clock(clock: ScalarClock) -> Self {
        Self {
            clock,
            values: BTreeSet::new(),
            last_update_ts: 0,
            history: Vec::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All values currently tied for the latest accepted timestamp, sorted
    /// by packed-byte order rather than `T`'s native `Ord` so the read is
    /// deterministic across replicas even when the two orderings diverge.
    pub fn values(&self) -> Vec<T>
    where
        T: Serialize,
    {
        sorted_by_packed_bytes(&self.values)
    }

    /// Locally write `value` under `writer_id`, returning the update so it
    /// can be propagated.
    pub fn write(&mut self, value: T, writer_id: W) -> Update<RegisterWrite<T, W>>
    where
        W: Clone,
    {
        let ts = self.clock.read_and_bump();
        let update = Update::new(
            self.clock.replica_id(),
            ts,
            RegisterWrite { value, writer_id },
        );
        self.apply(update.clone())
            .expect("locally generated update always matches our own clock identity");
        update
    }

    pub fn add_listener(&mut self, listener: Listener<RegisterWrite<T, W>>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

impl<T: Ord + Clone, W> Default for MvRegister<T, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone + Hash + Serialize, W: Clone> Crdt for MvRegister<T, W> {
    type Op = RegisterWrite<T, W>;
    type View = Vec<T>;

    fn clock_uuid(&self) -> Uuid {
        self.clock.replica_id()
    }

    fn read(&self) -> Vec<T> {
        sorted_by_packed_bytes(&self.values)
    }

    fn apply(&mut self, update: Update<RegisterWrite<T, W>>) -> Result<(), CrdtError> {
        if update.clock_uuid != self.clock.replica_id() {
            return Err(CrdtError::ClockMismatch);
        }
        self.listeners.invoke(&update);
        self.clock.update(update.timestamp);

        match update.timestamp.cmp(&self.last_update_ts) {
            std::cmp::Ordering::Greater => {
                self.values.clear();
                self.values.insert(update.op.value.clone());
                self.last_update_ts = update.timestamp;
            }
            std::cmp::Ordering::Equal => {
                self.values.insert(update.op.value.clone());
            }
            std::cmp::Ordering::Less => {}
        }

        self.history.push(update);
        Ok(())
    }

    fn history(
        &self,
        from_ts: Option<u64>,
        until_ts: Option<u64>,
    ) -> Vec<Update<RegisterWrite<T, W>>> {
        self.history
            .iter()
            .filter(|u| from_ts.map_or(true, |f| u.timestamp >= f))
            .filter(|u| until_ts.map_or(true, |t| u.timestamp < t))
            .cloned()
            .collect()
    }

    fn checksum(&self, from_ts: Option<u64>, until_ts: Option<u64>) -> Checksum {
        let mut hasher = DefaultHasher::new();
        for update in self.history(from_ts, until_ts) {
            update.timestamp.hash(&mut hasher);
            update.op.value.hash(&mut hasher);
        }
        hasher.finish()
    }
}
