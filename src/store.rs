//! # State Store
//! The single shared table behind the engine: latest value per source key, the
//! dirty flag, and the last derived result. One mutex guards all three as a
//! unit; every operation observes and mutates them atomically.
//!
//! The lock is only ever held for map-copy durations. Fetches and derivation
//! runs happen outside it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value::Value;

/// Point-in-time copy of all current per-source values.
pub type Snapshot = HashMap<String, Value>;

/// Result of one successful derivation run.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedValue {
    pub value: serde_json::Value,
    pub computed_at: DateTime<Utc>,
}

/// Consumer-facing read: exported payloads keyed by source, plus the computed
/// result (`null` until the first derivation).
#[derive(Debug, Clone, Serialize)]
pub struct LatestView {
    #[serde(flatten)]
    pub sources: BTreeMap<String, serde_json::Value>,
    pub computed: Option<DerivedValue>,
}

#[derive(Debug, Default)]
struct Inner {
    latest: HashMap<String, Value>,
    dirty: bool,
    computed: Option<DerivedValue>,
}

#[derive(Debug, Default)]
pub struct StateStore {
    inner: Mutex<Inner>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare-and-replace for one source slot. Replaces the stored value and
    /// sets the dirty flag iff `value` differs from what is stored (absence
    /// counts as changed). Returns whether it changed. The single point of
    /// truth for "did this source meaningfully change".
    pub fn commit(&self, key: &str, value: Value) -> bool {
        let mut inner = self.inner.lock().expect("state store mutex poisoned");
        if value.changed_from(inner.latest.get(key)) {
            inner.latest.insert(key.to_string(), value);
            inner.dirty = true;
            true
        } else {
            false
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let inner = self.inner.lock().expect("state store mutex poisoned");
        inner.latest.get(key).cloned()
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock().expect("state store mutex poisoned");
        inner.latest.clone()
    }

    /// Check-dirty, copy-all, clear-dirty as one critical section. A commit
    /// serializes either before this window (and is part of the snapshot) or
    /// after it (and re-sets the flag), so no change is ever lost between a
    /// separate check and clear.
    pub fn take_snapshot_if_dirty(&self) -> Option<Snapshot> {
        let mut inner = self.inner.lock().expect("state store mutex poisoned");
        if !inner.dirty {
            return None;
        }
        inner.dirty = false;
        Some(inner.latest.clone())
    }

    pub fn is_dirty(&self) -> bool {
        let inner = self.inner.lock().expect("state store mutex poisoned");
        inner.dirty
    }

    /// Re-arm the dirty flag. Used by the compute worker when a derivation
    /// failed after the flag was already consumed, so the pending changes are
    /// retried on the next tick.
    pub fn mark_dirty(&self) {
        let mut inner = self.inner.lock().expect("state store mutex poisoned");
        inner.dirty = true;
    }

    pub fn set_computed(&self, derived: DerivedValue) {
        let mut inner = self.inner.lock().expect("state store mutex poisoned");
        inner.computed = Some(derived);
    }

    pub fn computed(&self) -> Option<DerivedValue> {
        let inner = self.inner.lock().expect("state store mutex poisoned");
        inner.computed.clone()
    }

    pub fn latest_view(&self) -> LatestView {
        let inner = self.inner.lock().expect("state store mutex poisoned");
        LatestView {
            sources: inner
                .latest
                .iter()
                .map(|(k, v)| (k.clone(), v.export().clone()))
                .collect(),
            computed: inner.computed.clone(),
        }
    }
}
