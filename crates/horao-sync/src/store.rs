//! Opaque key/value persistence for replica state that must survive a
//! restart: `last_sync` and one blob per top-level replica object.
//!
//! The core depends only on get/set/compare-and-swap semantics; any
//! backend (in-memory map, Redis, a file) satisfies [`Store`]. An
//! in-memory implementation ships here so the synchronizer is exercisable
//! without an external dependency — the out-of-scope durable codec is
//! left to whoever wires a real backend behind the same trait.

use std::collections::HashMap;

/// Opaque key → JSON blob store.
pub trait Store: Send {
    /// Fetch the current value for `key`, if any.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Overwrite the value for `key` unconditionally.
    fn set(&mut self, key: &str, value: serde_json::Value);

    /// Replace `key`'s value only if its current value equals `expected`
    /// (or the key is absent and `expected` is `None`). Returns whether
    /// the swap happened.
    fn compare_and_swap(
        &mut self,
        key: &str,
        expected: Option<&serde_json::Value>,
        new: serde_json::Value,
    ) -> bool;
}

/// In-memory [`Store`] backed by a `HashMap`. Not durable across process
/// restarts; suitable for tests and for a replica that tolerates losing
/// `last_sync` on crash (the next tick just re-syncs unconditionally).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, serde_json::Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: serde_json::Value) {
        self.entries.insert(key.to_string(), value);
    }

    fn compare_and_swap(
        &mut self,
        key: &str,
        expected: Option<&serde_json::Value>,
        new: serde_json::Value,
    ) -> bool {
        if self.entries.get(key) != expected {
            return false;
        }
        self.entries.insert(key.to_string(), new);
        true
    }
}
