//! CRDT list via fractional indexing over an [`LwwMap`].
//!
//! Each element is stored under a stable [`Uuid`] key mapping to a
//! `(fractional index, value)` pair. Reading sorts the live entries by
//! `(index, packed value)` and strips the identifiers. Insertion,
//! deletion, and moves are just `LwwMap::set`/`unset` calls against that
//! backing map, so the list inherits the map's convergence guarantees for
//! free.

use crate::clock::ScalarClock;
use crate::crdt::{Checksum, Crdt, CrdtError, Listener, ListenerId};
use crate::map::{LwwMap, MapUpdate};
use crate::update::Update;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A position in the list. Backed by `f64`; ties are broken by comparing
/// the packed bytes of the element's value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FractionalIndex(f64);

impl FractionalIndex {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    fn between(a: FractionalIndex, b: FractionalIndex) -> FractionalIndex {
        FractionalIndex((a.0 + b.0) / 2.0)
    }
}

impl Eq for FractionalIndex {}

impl Ord for FractionalIndex {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for FractionalIndex {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for FractionalIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// A step added past the current last index when appending. Small enough
/// that many appends can accumulate before `normalize` is needed.
const APPEND_STEP: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ListItem<V> {
    index: FractionalIndex,
    value: V,
}

impl<V: Hash> Hash for ListItem<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.value.hash(state);
    }
}

pub struct CrdtList<V, W> {
    positions: LwwMap<Uuid, ListItem<V>, W>,
}

impl<V: Clone + Serialize + Hash, W: Ord + Clone> CrdtList<V, W> {
    pub fn new() -> Self {
        Self {
            positions: LwwMap::new(),
        }
    }

    pub fn with_clock(clock: ScalarClock) -> Self {
        Self {
            positions: LwwMap::with_clock(clock),
        }
    }

    /// Live entries sorted by `(index, packed value)`, with identifiers.
    fn read_full(&self) -> Vec<(Uuid, FractionalIndex, V)> {
        let mut items: Vec<(Uuid, FractionalIndex, V)> = self
            .positions
            .read()
            .into_iter()
            .map(|(id, item)| (id, item.index, item.value))
            .collect();
        items.sort_by(|a, b| {
            a.1.cmp(&b.1).then_with(|| {
                let pa = bincode::serialize(&a.2).expect("list value encoding is infallible");
                let pb = bincode::serialize(&b.2).expect("list value encoding is infallible");
                pa.cmp(&pb)
            })
        });
        items
    }

    /// The eventually-consistent ordered view, tombstones stripped.
    pub fn read(&self) -> Vec<V> {
        self.read_full().into_iter().map(|(_, _, v)| v).collect()
    }

    /// Insert `value` at `index`, returning its stable id and the update.
    pub fn insert_at(
        &mut self,
        value: V,
        writer_id: W,
        index: FractionalIndex,
    ) -> (Uuid, Update<MapUpdate<Uuid, ListItem<V>, W>>) {
        let id = Uuid::new_v4();
        let update = self.positions.set(id, ListItem { index, value }, writer_id);
        (id, update)
    }

    pub fn put_first(
        &mut self,
        value: V,
        writer_id: W,
    ) -> (Uuid, Update<MapUpdate<Uuid, ListItem<V>, W>>) {
        let full = self.read_full();
        let index = match full.first() {
            Some((_, first_index, _)) => FractionalIndex::between(FractionalIndex::new(0.0), *first_index),
            None => FractionalIndex::new(0.5),
        };
        self.insert_at(value, writer_id, index)
    }

    pub fn put_last(
        &mut self,
        value: V,
        writer_id: W,
    ) -> (Uuid, Update<MapUpdate<Uuid, ListItem<V>, W>>) {
        let full = self.read_full();
        let index = match full.last() {
            Some((_, last_index, _)) => FractionalIndex::between(*last_index, FractionalIndex::new(1.0)),
            None => FractionalIndex::new(0.5),
        };
        self.insert_at(value, writer_id, index)
    }

    pub fn append(
        &mut self,
        value: V,
        writer_id: W,
    ) -> (Uuid, Update<MapUpdate<Uuid, ListItem<V>, W>>) {
        let full = self.read_full();
        let index = match full.last() {
            Some((_, last_index, _)) => FractionalIndex::new(last_index.value() + APPEND_STEP),
            None => FractionalIndex::new(APPEND_STEP),
        };
        self.insert_at(value, writer_id, index)
    }

    pub fn put_before(
        &mut self,
        value: V,
        writer_id: W,
        other: Uuid,
    ) -> Option<(Uuid, Update<MapUpdate<Uuid, ListItem<V>, W>>)> {
        let full = self.read_full();
        let position = full.iter().position(|(id, _, _)| *id == other)?;
        let before_index = full[position].1;
        let prior_index = if position > 0 {
            full[position - 1].1
        } else {
            FractionalIndex::new(0.0)
        };
        let index = FractionalIndex::between(prior_index, before_index);
        Some(self.insert_at(value, writer_id, index))
    }

    pub fn put_after(
        &mut self,
        value: V,
        writer_id: W,
        other: Uuid,
    ) -> Option<(Uuid, Update<MapUpdate<Uuid, ListItem<V>, W>>)> {
        let full = self.read_full();
        let position = full.iter().position(|(id, _, _)| *id == other)?;
        let after_index = full[position].1;
        let next_index = if position + 1 < full.len() {
            full[position + 1].1
        } else {
            FractionalIndex::new(1.0)
        };
        let index = FractionalIndex::between(after_index, next_index);
        Some(self.insert_at(value, writer_id, index))
    }

    /// Move an existing element to `new_index`, keeping its identity and
    /// value. Returns `None` if `id` is no longer present.
    pub fn move_item(
        &mut self,
        id: Uuid,
        writer_id: W,
        new_index: FractionalIndex,
    ) -> Option<Update<MapUpdate<Uuid, ListItem<V>, W>>> {
        let value = self.positions.get(&id)?.value.clone();
        Some(
            self.positions
                .set(id, ListItem { index: new_index, value }, writer_id),
        )
    }

    pub fn delete(
        &mut self,
        id: Uuid,
        writer_id: W,
    ) -> Update<MapUpdate<Uuid, ListItem<V>, W>> {
        self.positions.unset(id, writer_id)
    }

    /// Evenly redistribute every element's index across `[0, max_index]`,
    /// issuing one move per element. Local maintenance; each move
    /// propagates through sync like any other update.
    pub fn normalize(
        &mut self,
        writer_id: W,
        max_index: f64,
    ) -> Vec<Update<MapUpdate<Uuid, ListItem<V>, W>>>
    where
        W: Clone,
    {
        let full = self.read_full();
        let n = full.len();
        let mut updates = Vec::with_capacity(n);
        for (i, (id, _, _)) in full.into_iter().enumerate() {
            let spaced = max_index * (i as f64 + 1.0) / (n as f64 + 1.0);
            if let Some(update) = self.move_item(id, writer_id.clone(), FractionalIndex::new(spaced)) {
                updates.push(update);
            }
        }
        updates
    }

    pub fn add_listener(
        &mut self,
        listener: Listener<MapUpdate<Uuid, ListItem<V>, W>>,
    ) -> ListenerId {
        self.positions.add_listener(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.positions.remove_listener(id);
    }
}

impl<V: Clone + Serialize + Hash, W: Ord + Clone> Default for CrdtList<V, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Serialize + Hash, W: Ord + Clone> Crdt for CrdtList<V, W> {
    type Op = MapUpdate<Uuid, ListItem<V>, W>;
    type View = Vec<V>;

    fn clock_uuid(&self) -> Uuid {
        self.positions.clock_uuid()
    }

    fn read(&self) -> Vec<V> {
        CrdtList::read(self)
    }

    fn apply(&mut self, update: Update<Self::Op>) -> Result<(), CrdtError> {
        self.positions.apply(update)
    }

    fn history(&self, from_ts: Option<u64>, until_ts: Option<u64>) -> Vec<Update<Self::Op>> {
        self.positions.history(from_ts, until_ts)
    }

    fn checksum(&self, from_ts: Option<u64>, until_ts: Option<u64>) -> Checksum {
        self.positions.checksum(from_ts, until_ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut list: CrdtList<i32, Vec<u8>> = CrdtList::new();
        list.append(1, vec![1]);
        list.append(2, vec![1]);
        list.append(3, vec![1]);
        assert_eq!(list.read(), vec![1, 2, 3]);
    }

    #[test]
    fn put_first_and_put_last() {
        let mut list: CrdtList<i32, Vec<u8>> = CrdtList::new();
        list.put_first(2, vec![1]);
        list.put_first(1, vec![1]);
        list.put_last(3, vec![1]);
        assert_eq!(list.read(), vec![1, 2, 3]);
    }

    #[test]
    fn put_before_and_put_after() {
        let mut list: CrdtList<i32, Vec<u8>> = CrdtList::new();
        let (middle_id, _) = list.append(2, vec![1]);
        list.put_before(1, vec![1], middle_id);
        list.put_after(3, vec![1], middle_id);
        assert_eq!(list.read(), vec![1, 2, 3]);
    }

    #[test]
    fn move_item_repositions_element() {
        let mut list: CrdtList<i32, Vec<u8>> = CrdtList::new();
        let (first_id, _) = list.append(1, vec![1]);
        list.append(2, vec![1]);
        list.append(3, vec![1]);
        list.move_item(first_id, vec![1], FractionalIndex::new(10.0));
        assert_eq!(list.read(), vec![2, 3, 1]);
    }

    #[test]
    fn delete_removes_element() {
        let mut list: CrdtList<i32, Vec<u8>> = CrdtList::new();
        let (id, _) = list.append(1, vec![1]);
        list.append(2, vec![1]);
        list.delete(id, vec![1]);
        assert_eq!(list.read(), vec![2]);
    }

    #[test]
    fn normalize_preserves_order() {
        let mut list: CrdtList<i32, Vec<u8>> = CrdtList::new();
        list.append(1, vec![1]);
        list.append(2, vec![1]);
        list.append(3, vec![1]);
        list.normalize(vec![1], 1.0);
        assert_eq!(list.read(), vec![1, 2, 3]);
    }

    #[test]
    fn convergence_from_history() {
        let mut a: CrdtList<i32, Vec<u8>> = CrdtList::new();
        a.append(1, vec![1]);
        a.append(2, vec![1]);

        let mut b: CrdtList<i32, Vec<u8>> =
            CrdtList::with_clock(ScalarClock::with_replica_id(a.clock_uuid()));
        for u in a.history(None, None) {
            b.apply(u).unwrap();
        }
        assert_eq!(a.read(), b.read());
        assert_eq!(a.checksum(None, None), b.checksum(None, None));
    }
}
