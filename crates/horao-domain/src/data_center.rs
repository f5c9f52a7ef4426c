//! A data center: cabinets arranged by row number, replicated as an LWW
//! map so two peers can converge on independent row edits.

use crate::composite::Cabinet;
use horao_core::map::{LwwMap, MapUpdate};
use horao_core::crdt::{Listener, ListenerId};
use horao_core::{Crdt, ScalarClock, Update};
use std::collections::BTreeMap;

/// Writer identity used to break concurrent-write ties on a data
/// center's rows.
pub type Writer = String;

pub struct DataCenter {
    pub name: String,
    rows: LwwMap<u32, Vec<Cabinet>, Writer>,
}

impl DataCenter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: LwwMap::new(),
        }
    }

    pub fn with_clock(name: impl Into<String>, clock: ScalarClock) -> Self {
        Self {
            name: name.into(),
            rows: LwwMap::with_clock(clock),
        }
    }

    pub fn set_row(
        &mut self,
        row: u32,
        cabinets: Vec<Cabinet>,
        writer: Writer,
    ) -> Update<MapUpdate<u32, Vec<Cabinet>, Writer>> {
        self.rows.set(row, cabinets, writer)
    }

    pub fn remove_row(
        &mut self,
        row: u32,
        writer: Writer,
    ) -> Update<MapUpdate<u32, Vec<Cabinet>, Writer>> {
        self.rows.unset(row, writer)
    }

    pub fn row(&self, row: u32) -> Option<&Vec<Cabinet>> {
        self.rows.get(&row)
    }

    pub fn rows(&self) -> BTreeMap<u32, Vec<Cabinet>> {
        self.rows.read()
    }

    pub fn apply(
        &mut self,
        update: Update<MapUpdate<u32, Vec<Cabinet>, Writer>>,
    ) -> Result<(), horao_core::CrdtError> {
        self.rows.apply(update)
    }

    pub fn all_cabinets(&self) -> Vec<Cabinet> {
        self.rows().into_values().flatten().collect()
    }

    /// Full update history for this data center's rows, in apply order.
    /// This is what the peer synchronizer ships on the wire: replaying it
    /// through `apply` on the receiving side reproduces this replica's
    /// state via ordinary LWW merge, rather than forging fresh timestamps
    /// for a materialized snapshot.
    pub fn history(&self) -> Vec<Update<MapUpdate<u32, Vec<Cabinet>, Writer>>> {
        self.rows.history(None, None)
    }

    /// Register a listener invoked on every accepted row update, in apply
    /// order, before it becomes visible to readers. Used by the peer
    /// synchronizer to track the change count since the last sync round.
    pub fn add_listener(
        &mut self,
        listener: Listener<MapUpdate<u32, Vec<Cabinet>, Writer>>,
    ) -> ListenerId {
        self.rows.add_listener(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.rows.remove_listener(id)
    }

    /// Merkle root over this data center's row history, used by the peer
    /// synchronizer to detect divergence without a full-state diff.
    pub fn merkle_root(&self) -> horao_merkle::Hash {
        use horao_merkle::MerkleSummarize;
        self.rows.merkle_summary().root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::Hardware;

    fn cabinet(serial: &str) -> Cabinet {
        Cabinet {
            hardware: Hardware::new(serial, "RACK-X", 0),
            servers: vec![],
            chassis: vec![],
            switches: vec![],
        }
    }

    #[test]
    fn set_row_then_read() {
        let mut dc = DataCenter::new("dc-1");
        dc.set_row(0, vec![cabinet("C1")], "admin".to_string());
        assert_eq!(dc.row(0).map(Vec::len), Some(1));
    }

    #[test]
    fn remove_row_clears_it() {
        let mut dc = DataCenter::new("dc-1");
        dc.set_row(0, vec![cabinet("C1")], "admin".to_string());
        dc.remove_row(0, "admin".to_string());
        assert_eq!(dc.row(0), None);
    }

    #[test]
    fn all_cabinets_flattens_every_row() {
        let mut dc = DataCenter::new("dc-1");
        dc.set_row(0, vec![cabinet("C1")], "admin".to_string());
        dc.set_row(1, vec![cabinet("C2"), cabinet("C3")], "admin".to_string());
        assert_eq!(dc.all_cabinets().len(), 3);
    }

    #[test]
    fn replicas_converging_on_history_share_a_merkle_root() {
        let clock = ScalarClock::new();
        let mut a = DataCenter::with_clock("dc-1", clock);
        a.set_row(0, vec![cabinet("C1")], "admin".to_string());

        let mut b = DataCenter::with_clock("dc-1", ScalarClock::with_replica_id(clock.replica_id()));
        for u in a.rows.history(None, None) {
            b.apply(u).unwrap();
        }

        assert_eq!(a.merkle_root(), b.merkle_root());
    }
}
