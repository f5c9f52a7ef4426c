//! Observed-Removed Set (OR-Set), add-wins bias.
//!
//! Two maps track the latest timestamp a member was observed or removed
//! under. A member reads as present when its observed timestamp strictly
//! dominates its removed timestamp — on a tie, the add wins.

use crate::clock::ScalarClock;
use crate::crdt::{Checksum, Crdt, CrdtError, Listener, ListenerId, ListenerRegistry};
use crate::update::Update;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// The operation carried by an OR-set update: observe or remove a member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOp<T> {
    Observe(T),
    Remove(T),
}

#[derive(Clone, Debug)]
struct CachedRead<T: Ord> {
    at_counter: u64,
    members: BTreeSet<T>,
}

/// Add-wins observed-removed set over members of type `T`.
pub struct ORSet<T: Ord + Clone> {
    clock: ScalarClock,
    observed: BTreeMap<T, u64>,
    removed: BTreeMap<T, u64>,
    history: Vec<Update<SetOp<T>>>,
    cache: Option<CachedRead<T>>,
    #[allow(clippy::type_complexity)]
    listeners: ListenerRegistry<SetOp<T>>,
}

impl<T: Ord + Clone> ORSet<T> {
    pub fn new() -> Self {
        Self {
            clock: ScalarClock::new(),
            observed: BTreeMap::new(),
            removed: BTreeMap::new(),
            history: Vec::new(),
            cache: None,
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn with_clock(clock: ScalarClock) -> Self {
        Self {
            clock,
            observed: BTreeMap::new(),
            removed: BTreeMap::new(),
            history: Vec::new(),
            cache: None,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Locally observe `member`: bumps the clock, applies, and returns the
    /// update so it can be propagated.
    pub fn observe(&mut self, member: T) -> Update<SetOp<T>> {
        let ts = self.clock.read_and_bump();
        let update = Update::new(self.clock.replica_id(), ts, SetOp::Observe(member));
        self.apply(update.clone())
            .expect("locally generated update always matches our own clock identity");
        update
    }

    /// Locally remove `member`. Symmetric to `observe`.
    pub fn remove(&mut self, member: T) -> Update<SetOp<T>> {
        let ts = self.clock.read_and_bump();
        let update = Update::new(self.clock.replica_id(), ts, SetOp::Remove(member));
        self.apply(update.clone())
            .expect("locally generated update always matches our own clock identity");
        update
    }

    pub fn contains(&self, member: &T) -> bool {
        match (self.observed.get(member), self.removed.get(member)) {
            (Some(obs_ts), Some(rem_ts)) => obs_ts >= rem_ts,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn add_listener(&mut self, listener: Listener<SetOp<T>>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn invalidate_cache(&mut self) {
        self.cache = None;
    }
}

impl<T: Ord + Clone> Default for ORSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone + Hash> Crdt for ORSet<T> {
    type Op = SetOp<T>;
    type View = BTreeSet<T>;

    fn clock_uuid(&self) -> Uuid {
        self.clock.replica_id()
    }

    fn read(&self) -> BTreeSet<T> {
        if let Some(cached) = &self.cache {
            if cached.at_counter == self.clock.read() {
                return cached.members.clone();
            }
        }
        self.observed
            .iter()
            .filter(|(member, obs_ts)| match self.removed.get(*member) {
                Some(rem_ts) => *obs_ts >= rem_ts,
                None => true,
            })
            .map(|(member, _)| member.clone())
            .collect()
    }

    fn apply(&mut self, update: Update<SetOp<T>>) -> Result<(), CrdtError> {
        if update.clock_uuid != self.clock.replica_id() {
            return Err(CrdtError::ClockMismatch);
        }
        self.listeners.invoke(&update);
        self.clock.update(update.timestamp);

        match &update.op {
            SetOp::Observe(member) => {
                let dominates = self
                    .removed
                    .get(member)
                    .map(|rem_ts| update.timestamp >= *rem_ts)
                    .unwrap_or(true);
                if dominates {
                    let entry = self.observed.entry(member.clone()).or_insert(0);
                    *entry = (*entry).max(update.timestamp);
                    self.removed.remove(member);
                }
            }
            SetOp::Remove(member) => {
                let dominates = self
                    .observed
                    .get(member)
                    .map(|obs_ts| update.timestamp > *obs_ts)
                    .unwrap_or(true);
                if dominates {
                    let entry = self.removed.entry(member.clone()).or_insert(0);
                    *entry = (*entry).max(update.timestamp);
                }
            }
        }

        self.history.push(update);
        self.invalidate_cache();
        Ok(())
    }

    fn history(&self, from_ts: Option<u64>, until_ts: Option<u64>) -> Vec<Update<SetOp<T>>> {
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
            match &update.op {
                SetOp::Observe(m) => {
                    0u8.hash(&mut hasher);
                    m.hash(&mut hasher);
                }
                SetOp::Remove(m) => {
                    1u8.hash(&mut hasher);
                    m.hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn new_pair() -> (ORSet<i32>, ORSet<i32>) {
        let clock = ScalarClock::new();
        (ORSet::with_clock(clock), ORSet::with_clock(clock))
    }

    #[test]
    fn observe_then_read() {
        let mut set = ORSet::<i32>::new();
        set.observe(1);
        set.observe(2);
        assert_eq!(set.read(), BTreeSet::from([1, 2]));
    }

    #[test]
    fn remove_takes_effect() {
        let mut set = ORSet::<i32>::new();
        set.observe(1);
        set.remove(1);
        assert!(set.read().is_empty());
    }

    #[test]
    fn add_wins_on_concurrent_tie() {
        let (mut a, mut b) = new_pair();
        let observe = a.observe(1);
        let remove = Update::new(observe.clock_uuid, observe.timestamp, SetOp::Remove(1));
        b.apply(remove).unwrap();
        b.apply(observe).unwrap();
        assert!(b.contains(&1));
    }

    #[test]
    fn apply_rejects_mismatched_clock_uuid() {
        let mut a = ORSet::<i32>::new();
        let foreign = Update::new(Uuid::new_v4(), 1, SetOp::Observe(1));
        assert_eq!(a.apply(foreign), Err(CrdtError::ClockMismatch));
    }

    #[test]
    fn idempotence() {
        let mut set = ORSet::<i32>::new();
        let update = set.observe(1);
        let before = set.checksum(None, None);
        set.apply(update).unwrap();
        assert_eq!(set.read(), BTreeSet::from([1]));
        assert_eq!(set.checksum(None, None), before);
    }

    #[test]
    fn commutativity() {
        let (mut a, mut b) = new_pair();
        let u1 = a.observe(1);
        let u2 = a.observe(2);

        b.apply(u2.clone()).unwrap();
        b.apply(u1.clone()).unwrap();

        let mut c = ORSet::with_clock(a.clock);
        c.apply(u1).unwrap();
        c.apply(u2).unwrap();

        assert_eq!(b.read(), c.read());
        assert_eq!(b.checksum(None, None), c.checksum(None, None));
    }

    #[test]
    fn convergence_from_history() {
        let mut a = ORSet::<i32>::new();
        a.observe(1);
        a.observe(2);
        a.remove(1);

        let mut b = ORSet::with_clock(a.clock);
        for u in a.history(None, None) {
            b.apply(u).unwrap();
        }
        assert_eq!(a.read(), b.read());
        assert_eq!(a.checksum(None, None), b.checksum(None, None));
    }

    #[test]
    fn scenario_s1_or_set_convergence_reverse_order() {
        let mut a = ORSet::<i32>::new();
        a.observe(1);
        a.observe(2);
        a.remove(1);

        let mut b = ORSet::with_clock(a.clock);
        let mut history = a.history(None, None);
        history.reverse();
        for u in history {
            b.apply(u).unwrap();
        }
        assert_eq!(a.read(), BTreeSet::from([2]));
        assert_eq!(b.read(), BTreeSet::from([2]));
    }

    #[test]
    fn checksum_sensitivity() {
        let mut set = ORSet::<i32>::new();
        let before = set.checksum(None, None);
        set.observe(1);
        assert_ne!(before, set.checksum(None, None));
    }

    #[test]
    fn listener_observes_before_read_reflects_mutation() {
        use std::sync::{Arc, Mutex};
        let mut set = ORSet::<i32>::new();
        let seen_empty = Arc::new(Mutex::new(false));
        let seen_empty_clone = Arc::clone(&seen_empty);
        set.add_listener(Box::new(move |_u| {
            // Invoked before the mutation is visible.
            *seen_empty_clone.lock().unwrap() = true;
        }));
        set.observe(1);
        assert!(*seen_empty.lock().unwrap());
        assert_eq!(set.read(), BTreeSet::from([1]));
    }

    proptest! {
        #[test]
        fn arbitrary_observe_sequences_converge_regardless_of_replay_order(
            members in prop::collection::vec(0i32..50, 0..20),
        ) {
            let clock = ScalarClock::new();
            let mut forward = ORSet::<i32>::with_clock(clock);
            let updates: Vec<_> = members.iter().map(|m| forward.observe(*m)).collect();

            let mut reversed = ORSet::<i32>::with_clock(clock);
            for update in updates.iter().rev() {
                reversed.apply(update.clone()).unwrap();
            }

            prop_assert_eq!(forward.read(), reversed.read());
        }

        #[test]
        fn reapplying_any_single_update_does_not_change_the_read(
            members in prop::collection::vec(0i32..50, 1..20),
            replay_index in 0usize..20,
        ) {
            let mut set = ORSet::<i32>::new();
            let updates: Vec<_> = members.iter().map(|m| set.observe(*m)).collect();
            let before = set.read();
            if let Some(update) = updates.get(replay_index % updates.len()) {
                let _ = set.apply(update.clone());
            }
            prop_assert_eq!(set.read(), before);
        }
    }
}
