//! Last-Writer-Wins (LWW) register.
//!
//! Holds a single value. A strictly later write replaces it; a write at the
//! same timestamp (concurrent, under this clock's total order that only
//! happens on an exact tie) is resolved by comparing writer ids, then by
//! byte-lexicographic order of the packed value.

use crate::clock::ScalarClock;
use crate::crdt::{Checksum, Crdt, CrdtError, Listener, ListenerId, ListenerRegistry};
use crate::update::Update;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// The operation carried by a register update: write a value under a
/// writer's id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWrite<T, W> {
    pub value: T,
    pub writer_id: W,
}

pub struct LwwRegister<T, W> {
    name: String,
    clock: ScalarClock,
    value: Option<T>,
    last_update_ts: u64,
    last_writer_id: Option<W>,
    history: Vec<Update<RegisterWrite<T, W>>>,
    listeners: ListenerRegistry<RegisterWrite<T, W>>,
}

impl<T: Clone + Serialize, W: Ord + Clone> LwwRegister<T, W> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clock: ScalarClock::new(),
            value: None,
            last_update_ts: 0,
            last_writer_id: None,
            history: Vec::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn with_clock(name: impl Into<String>, clock: ScalarClock) -> Self {
        Self {
            name: name.into(),
            clock,
            value: None,
            last_update_ts: 0,
            last_writer_id: None,
            history: Vec::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn last_update_ts(&self) -> u64 {
        self.last_update_ts
    }

    /// Locally write `value` under `writer_id`, returning the update so it
    /// can be propagated.
    pub fn write(&mut self, value: T, writer_id: W) -> Update<RegisterWrite<T, W>> {
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

    /// Byte-lexicographic comparison of two values' packed encoding, used
    /// to break writer-id ties deterministically.
    fn packed_value_wins(candidate: &T, incumbent: &T) -> bool {
        let candidate_bytes =
            bincode::serialize(candidate).expect("register value encoding is infallible");
        let incumbent_bytes =
            bincode::serialize(incumbent).expect("register value encoding is infallible");
        candidate_bytes > incumbent_bytes
    }
}

impl<T: Clone + Serialize, W: Ord + Clone> Crdt for LwwRegister<T, W> {
    type Op = RegisterWrite<T, W>;
    type View = Option<T>;

    fn clock_uuid(&self) -> Uuid {
        self.clock.replica_id()
    }

    fn read(&self) -> Option<T> {
        self.value.clone()
    }

    fn apply(&mut self, update: Update<RegisterWrite<T, W>>) -> Result<(), CrdtError> {
        if update.clock_uuid != self.clock.replica_id() {
            return Err(CrdtError::ClockMismatch);
        }
        self.listeners.invoke(&update);
        self.clock.update(update.timestamp);

        let accept = match update.timestamp.cmp(&self.last_update_ts) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => match &self.last_writer_id {
                None => true,
                Some(incumbent_writer) => match update.op.writer_id.cmp(incumbent_writer) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => self
                        .value
                        .as_ref()
                        .map(|incumbent| Self::packed_value_wins(&update.op.value, incumbent))
                        .unwrap_or(true),
                },
            },
        };

        if accept {
            self.last_update_ts = update.timestamp;
            self.last_writer_id = Some(update.op.writer_id.clone());
            self.value = Some(update.op.value.clone());
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
            bincode::serialize(&update.op.value)
                .expect("register value encoding is infallible")
                .hash(&mut hasher);
        }
        hasher.finish()
    }
}
