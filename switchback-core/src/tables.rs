//! The four shared, hash-keyed stores of the data plane.
//!
//! Each table holds flat `Copy` records behind one lock, which gives every
//! individual lookup, insert and delete per-key atomicity: no caller ever
//! observes a torn entry. Multi-key sequences (teardown, handoff) are *not*
//! transactional; the engine orders its side effects so a concurrent
//! observer never sees a stale slot held by a freed route, nor a new route
//! without its reverse.
//!
//! Capacities are fixed at construction; inserting a new key into a full
//! table fails, mirroring a pinned-size map in a restricted datapath.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

use ahash::RandomState;
use switchback_common::{limits, Availability, Connection, Endpoint, Numbers, Reroute, TxnPhase};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{0} is full")]
pub struct TableFull(pub &'static str);

pub struct BoundedTable<K, V> {
    name: &'static str,
    capacity: usize,
    entries: RwLock<HashMap<K, V, RandomState>>,
}

impl<K, V> BoundedTable<K, V>
where
    K: Eq + Hash + Copy,
    V: Copy,
{
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            entries: RwLock::new(HashMap::with_capacity_and_hasher(capacity, RandomState::new())),
        }
    }

    /// Copy out the entry for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).get(key).copied()
    }

    /// Insert or replace the entry for `key`. Fails only when `key` is new
    /// and the table is at capacity.
    pub fn insert(&self, key: K, value: V) -> Result<(), TableFull> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity && !entries.contains_key(&key) {
            return Err(TableFull(self.name));
        }
        entries.insert(key, value);
        Ok(())
    }

    /// Delete and return the entry for `key`, if any.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Route table: observed 4-tuple → directional reroute record.
pub type ConnTable = BoundedTable<Connection, Reroute>;

/// Per-direction sequence state, owned by the bookkeeper.
pub type NumbersTable = BoundedTable<Connection, Numbers>;

/// Backend endpoint → binding slot vector.
pub type AvailabilityTable = BoundedTable<Endpoint, Availability>;

/// Client endpoint → transactional phase.
pub type StateTable = BoundedTable<Endpoint, TxnPhase>;

pub fn conn_table() -> ConnTable {
    BoundedTable::new("conn_map", limits::CONN_MAP_ENTRIES)
}

pub fn numbers_table() -> NumbersTable {
    BoundedTable::new("numbers_map", limits::NUMBERS_MAP_ENTRIES)
}

pub fn availability_table() -> AvailabilityTable {
    BoundedTable::new("available_map", limits::AVAILABLE_MAP_ENTRIES)
}

pub fn state_table() -> StateTable {
    BoundedTable::new("state_map", limits::STATE_MAP_ENTRIES)
}
