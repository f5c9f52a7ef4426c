//! The common, operation-based CRDT contract.
//!
//! Every CRDT in this crate (OR-set, LWW/MV register, LWW map, CRDT list)
//! implements [`Crdt`]. Unlike a join-semilattice CRDT, merge here happens
//! one [`Update`] at a time through `apply`: a replica's state is entirely
//! determined by the sequence of updates it has accepted, and any two
//! replicas that have accepted the same *set* of updates (in any order)
//! converge to the same `read()` and `checksum()` — that's what
//! idempotence, commutativity, and associativity buy us here.

use crate::update::Update;
use uuid::Uuid;

/// A listener observes every update a CRDT accepts, in apply order, before
/// the mutation becomes visible to readers. Listeners must not call back
/// into the CRDT they're attached to (reentrancy would break the timestamp
/// invariant); they exist to enqueue work for a later tick (e.g. the peer
/// synchronizer's change counter).
pub type Listener<Op> = Box<dyn Fn(&Update<Op>) + Send + Sync>;

/// Handle returned by `add_listener`, used to unregister it later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Errors common to every CRDT's `apply` path. All variants are fatal to the
/// calling operation: an update is never partially applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CrdtError {
    /// The update's `clock_uuid` does not match this replica's identity.
    #[error("update clock identity does not match this replica")]
    ClockMismatch,
    /// The op tag was not one of the CRDT's known variants.
    #[error("malformed operation tag")]
    MalformedOp,
    /// The payload didn't match what the op tag implied.
    #[error("update payload type does not match its operation")]
    PayloadTypeMismatch,
    /// An update variant this replica doesn't know how to apply. Rejected
    /// rather than ignored, so divergence stays detectable.
    #[error("unknown update variant")]
    UnknownUpdateVariant,
}

/// A minimal, deterministic fingerprint over a window of a CRDT's history.
/// Two replicas with the same accepted updates in `[from_ts, until_ts)`
/// always produce the same checksum; any accepted update inside the window
/// changes it.
pub type Checksum = u64;

/// Shared add/remove/invoke bookkeeping for listener lists, so each CRDT
/// doesn't reimplement it. A listener panicking during `invoke` is caught
/// and logged rather than allowed to abort the apply in progress — an
/// update is always applied regardless of listener behavior.
pub struct ListenerRegistry<Op> {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener<Op>)>,
}

impl<Op> ListenerRegistry<Op> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    pub fn add(&mut self, listener: Listener<Op>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }

    pub fn invoke(&self, update: &Update<Op>) {
        for (_, listener) in &self.listeners {
            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(update)
            })) {
                tracing::warn!(?panic, "CRDT listener panicked; update still applied");
            }
        }
    }
}

impl<Op> Default for ListenerRegistry<Op> {
    fn default() -> Self {
        Self::new()
    }
}

/// The operations every CRDT in this crate supports, parameterized by its
/// operation payload type `Op` and its materialized view type `View`.
pub trait Crdt {
    type Op;
    type View;

    /// This CRDT's clock identity; updates from any other identity are
    /// rejected by `apply`.
    fn clock_uuid(&self) -> Uuid;

    /// Deterministic function of internal state. Non-mutating.
    fn read(&self) -> Self::View;

    /// Idempotent, commutative, associative merge of a single update.
    fn apply(&mut self, update: Update<Self::Op>) -> Result<(), CrdtError>;

    /// A minimal replay set: applying it in order to a freshly initialized
    /// CRDT sharing this clock identity reproduces an equivalent state.
    fn history(&self, from_ts: Option<u64>, until_ts: Option<u64>) -> Vec<Update<Self::Op>>;

    /// Cheap fingerprint over the same window as `history`.
    fn checksum(&self, from_ts: Option<u64>, until_ts: Option<u64>) -> Checksum;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crdt_error_messages_are_stable() {
        assert_eq!(
            CrdtError::ClockMismatch.to_string(),
            "update clock identity does not match this replica"
        );
        assert_eq!(CrdtError::MalformedOp.to_string(), "malformed operation tag");
    }

    #[test]
    fn listener_registry_invokes_in_registration_order() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry: ListenerRegistry<u8> = ListenerRegistry::new();
        for i in 0..3u8 {
            let seen = Arc::clone(&seen);
            registry.add(Box::new(move |_u| seen.lock().unwrap().push(i)));
        }
        let update = Update::new(Uuid::new_v4(), 1, 0u8);
        registry.invoke(&update);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn listener_registry_remove_stops_invocation() {
        use std::sync::{Arc, Mutex};
        let called = Arc::new(Mutex::new(false));
        let mut registry: ListenerRegistry<u8> = ListenerRegistry::new();
        let called_clone = Arc::clone(&called);
        let id = registry.add(Box::new(move |_u| *called_clone.lock().unwrap() = true));
        registry.remove(id);
        registry.invoke(&Update::new(Uuid::new_v4(), 1, 0u8));
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn listener_panic_does_not_propagate() {
        let mut registry: ListenerRegistry<u8> = ListenerRegistry::new();
        registry.add(Box::new(|_u| panic!("boom")));
        registry.invoke(&Update::new(Uuid::new_v4(), 1, 0u8));
    }
}
