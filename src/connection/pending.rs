//! Keyed tables of outstanding requests.
//!
//! One table per operation kind (read, write, notify).  Each table has its
//! own lock, independent of the connection's state lock, so a long chunked
//! write never blocks reads or notifications on the same device.

use std::collections::HashMap;
use std::sync::Mutex;

use log::warn;

use crate::device::OperationKey;
use crate::lock;

pub(crate) struct PendingTable<C> {
    kind: &'static str,
    entries: Mutex<HashMap<OperationKey, C>>,
}

impl<C> PendingTable<C> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register `callback` for `key`.  An earlier entry for the same key is
    /// dropped without notification; returns `true` when that happened.
    pub(crate) fn insert(&self, key: OperationKey, callback: C) -> bool {
        let replaced = lock(&self.entries).insert(key, callback).is_some();
        if replaced {
            warn!("pending {}: replaced outstanding request for {}", self.kind, key);
        }
        replaced
    }

    pub(crate) fn take(&self, key: &OperationKey) -> Option<C> {
        lock(&self.entries).remove(key)
    }

    /// Mutate the entry for `key` in place.
    pub(crate) fn update<R>(&self, key: &OperationKey, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        lock(&self.entries).get_mut(key).map(f)
    }

    pub(crate) fn clear(&self) -> usize {
        let mut entries = lock(&self.entries);
        let n = entries.len();
        entries.clear();
        n
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).len()
    }
}

impl<C: Clone> PendingTable<C> {
    /// Look up without removing (registrations that outlive one event).
    pub(crate) fn get(&self, key: &OperationKey) -> Option<C> {
        lock(&self.entries).get(key).cloned()
    }
}
