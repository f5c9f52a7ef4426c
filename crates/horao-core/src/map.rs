//! Last-Writer-Wins map: an add-wins key set paired with one LWW register
//! per key, sharing a single clock identity.
//!
//! `set` and `unset` each emit one composite update carrying both the key
//! membership change and the register write, so the two halves are always
//! applied together at the same logical timestamp (invariant: a key is
//! present in `registers` if and only if it reads as present in `names`).

use crate::clock::ScalarClock;
use crate::crdt::{Checksum, Crdt, CrdtError, Listener, ListenerId, ListenerRegistry};
use crate::update::Update;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// The operation half that targets a key's register.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapOp<V, W> {
    /// Observe `key` and write `value` to its register.
    Set { value: V, writer_id: W },
    /// Remove `key`. The register is dropped once the key reads absent.
    Unset { writer_id: W },
}

/// The composite update applied to both the key set and a key's register.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapUpdate<K, V, W> {
    pub key: K,
    pub op: MapOp<V, W>,
}

struct RegisterState<V, W> {
    value: V,
    last_update_ts: u64,
    last_writer_id: W,
}

pub struct LwwMap<K, V, W> {
    clock: ScalarClock,
    observed_names: BTreeMap<K, u64>,
    removed_names: BTreeMap<K, u64>,
    registers: BTreeMap<K, RegisterState<V, W>>,
    history: Vec<Update<MapUpdate<K, V, W>>>,
    listeners: ListenerRegistry<MapUpdate<K, V, W>>,
}

impl<K: Ord + Clone, V: Clone + Serialize, W: Ord + Clone> LwwMap<K, V, W> {
    pub fn new() -> Self {
        Self {
            clock: ScalarClock::new(),
            observed_names: BTreeMap::new(),
            removed_names: BTreeMap::new(),
            registers: BTreeMap::new(),
            history: Vec::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn with_clock(clock: ScalarClock) -> Self {
        Self {
            clock,
            observed_names: BTreeMap::new(),
            removed_names: BTreeMap::new(),
            registers: BTreeMap::new(),
            history: Vec::new(),
            listeners: ListenerRegistry::new(),
        }
    }

    fn name_present(&self, key: &K) -> bool {
        match (self.observed_names.get(key), self.removed_names.get(key)) {
            (Some(obs_ts), Some(rem_ts)) => obs_ts >= rem_ts,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        if self.name_present(key) {
            self.registers.get(key).map(|r| &r.value)
        } else {
            None
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.name_present(key)
    }

    /// Locally set `key` to `value`, returning the update for propagation.
    pub fn set(&mut self, key: K, value: V, writer_id: W) -> Update<MapUpdate<K, V, W>> {
        let ts = self.clock.read_and_bump();
        let update = Update::new(
            self.clock.replica_id(),
            ts,
            MapUpdate {
                key,
                op: MapOp::Set { value, writer_id },
            },
        );
        self.apply(update.clone())
            .expect("locally generated update always matches our own clock identity");
        update
    }

    /// Locally unset `key`, returning the update for propagation.
    pub fn unset(&mut self, key: K, writer_id: W) -> Update<MapUpdate<K, V, W>> {
        let ts = self.clock.read_and_bump();
        let update = Update::new(
            self.clock.replica_id(),
            ts,
            MapUpdate {
                key,
                op: MapOp::Unset { writer_id },
            },
        );
        self.apply(update.clone())
            .expect("locally generated update always matches our own clock identity");
        update
    }

    pub fn add_listener(&mut self, listener: Listener<MapUpdate<K, V, W>>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn apply_register_write(&mut self, key: &K, ts: u64, writer_id: W, value: V) {
        let accept = match self.registers.get(key) {
            None => true,
            Some(incumbent) => match ts.cmp(&incumbent.last_update_ts) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => match writer_id.cmp(&incumbent.last_writer_id) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => {
                        let candidate = bincode::serialize(&value)
                            .expect("map value encoding is infallible");
                        let incumbent_bytes = bincode::serialize(&incumbent.value)
                            .expect("map value encoding is infallible");
                        candidate > incumbent_bytes
                    }
                },
            },
        };
        if accept {
            self.registers.insert(
                key.clone(),
                RegisterState {
                    value,
                    last_update_ts: ts,
                    last_writer_id: writer_id,
                },
            );
        }
    }
}

impl<K: Ord + Clone, V: Clone + Serialize, W: Ord + Clone> Default for LwwMap<K, V, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone + Hash, V: Clone + Serialize + Hash, W: Ord + Clone> Crdt for LwwMap<K, V, W> {
    type Op = MapUpdate<K, V, W>;
    type View = BTreeMap<K, V>;

    fn clock_uuid(&self) -> Uuid {
        self.clock.replica_id()
    }

    fn read(&self) -> BTreeMap<K, V> {
        self.observed_names
            .keys()
            .filter(|k| self.name_present(k))
            .filter_map(|k| self.registers.get(k).map(|r| (k.clone(), r.value.clone())))
            .collect()
    }

    fn apply(&mut self, update: Update<MapUpdate<K, V, W>>) -> Result<(), CrdtError> {
        if update.clock_uuid != self.clock.replica_id() {
            return Err(CrdtError::ClockMismatch);
        }
        self.listeners.invoke(&update);
        self.clock.update(update.timestamp);

        let ts = update.timestamp;
        let key = update.op.key.clone();

        match update.op.op.clone() {
            MapOp::Set { value, writer_id } => {
                let dominates = self
                    .removed_names
                    .get(&key)
                    .map(|rem_ts| ts >= *rem_ts)
                    .unwrap_or(true);
                if dominates {
                    let entry = self.observed_names.entry(key.clone()).or_insert(0);
                    *entry = (*entry).max(ts);
                    self.removed_names.remove(&key);
                }
                self.apply_register_write(&key, ts, writer_id, value);
            }
            MapOp::Unset { writer_id: _ } => {
                let dominates = self
                    .observed_names
                    .get(&key)
                    .map(|obs_ts| ts > *obs_ts)
                    .unwrap_or(true);
                if dominates {
                    let entry = self.removed_names.entry(key.clone()).or_insert(0);
                    *entry = (*entry).max(ts);
                }
            }
        }

        // Invariant (a): a register only exists for keys that still read present.
        if !self.name_present(&key) {
            self.registers.remove(&key);
        }

        self.history.push(update);
        Ok(())
    }

    fn history(
        &self,
        from_ts: Option<u64>,
        until_ts: Option<u64>,
    ) -> Vec<Update<MapUpdate<K, V, W>>> {
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
            update.op.key.hash(&mut hasher);
            match &update.op.op {
                MapOp::Set { value, .. } => {
                    0u8.hash(&mut hasher);
                    value.hash(&mut hasher);
                }
                MapOp::Unset { .. } => {
                    1u8.hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let mut map: LwwMap<String, i32, Vec<u8>> = LwwMap::new();
        map.set("a".to_string(), 1, vec![1]);
        assert_eq!(map.get(&"a".to_string()), Some(&1));
    }

    #[test]
    fn unset_drops_key_and_register() {
        let mut map: LwwMap<String, i32, Vec<u8>> = LwwMap::new();
        map.set("a".to_string(), 1, vec![1]);
        map.unset("a".to_string(), vec![1]);
        assert!(!map.contains_key(&"a".to_string()));
        assert_eq!(map.get(&"a".to_string()), None);
        assert!(map.registers.get(&"a".to_string()).is_none());
    }

    #[test]
    fn scenario_s3_set_wins_over_concurrent_unset_by_writer_id() {
        let clock = ScalarClock::new();
        let mut a: LwwMap<String, i32, Vec<u8>> = LwwMap::with_clock(clock);
        let mut b: LwwMap<String, i32, Vec<u8>> = LwwMap::with_clock(clock);

        let set_update = Update::new(
            clock.replica_id(),
            1,
            MapUpdate {
                key: "a".to_string(),
                op: MapOp::Set {
                    value: 9,
                    writer_id: vec![2],
                },
            },
        );
        let unset_update = Update::new(
            clock.replica_id(),
            1,
            MapUpdate {
                key: "a".to_string(),
                op: MapOp::Unset {
                    writer_id: vec![1],
                },
            },
        );

        a.apply(set_update.clone()).unwrap();
        a.apply(unset_update.clone()).unwrap();
        b.apply(unset_update).unwrap();
        b.apply(set_update).unwrap();

        assert_eq!(a.get(&"a".to_string()), Some(&9));
        assert_eq!(b.get(&"a".to_string()), Some(&9));
    }

    #[test]
    fn idempotence() {
        let mut map: LwwMap<String, i32, Vec<u8>> = LwwMap::new();
        let update = map.set("a".to_string(), 1, vec![1]);
        let before = map.checksum(None, None);
        map.apply(update).unwrap();
        assert_eq!(map.get(&"a".to_string()), Some(&1));
        assert_eq!(map.checksum(None, None), before);
    }

    #[test]
    fn convergence_from_history() {
        let mut a: LwwMap<String, i32, Vec<u8>> = LwwMap::new();
        a.set("a".to_string(), 1, vec![1]);
        a.set("b".to_string(), 2, vec![1]);
        a.unset("a".to_string(), vec![1]);

        let mut b: LwwMap<String, i32, Vec<u8>> = LwwMap::with_clock(a.clock);
        for u in a.history(None, None) {
            b.apply(u).unwrap();
        }
        assert_eq!(a.read(), b.read());
        assert_eq!(a.checksum(None, None), b.checksum(None, None));
    }

    #[test]
    fn apply_rejects_mismatched_clock_uuid() {
        let mut map: LwwMap<String, i32, Vec<u8>> = LwwMap::new();
        let foreign = Update::new(
            Uuid::new_v4(),
            1,
            MapUpdate {
                key: "a".to_string(),
                op: MapOp::Set {
                    value: 1,
                    writer_id: vec![1],
                },
            },
        );
        assert_eq!(map.apply(foreign), Err(CrdtError::ClockMismatch));
    }
}
