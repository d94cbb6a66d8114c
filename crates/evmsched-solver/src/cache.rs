//! Content-addressed schedule memoization.
//!
//! Cache keys are SHA-256 fingerprints over the scheduling-relevant slice of
//! the network: the program, each activity's (id, duration, constraint), and
//! each dependency's (endpoints, type, lag). A read only ever returns a value
//! whose key matches the *current* fingerprint, so stale entries are
//! unreachable rather than invalidated.
//!
//! Concurrent misses for the same fingerprint converge on one computation:
//! the first caller marks the key in flight and computes; the rest block on a
//! condvar and receive the broadcast result.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, PoisonError};

use evmsched_core::ProgramId;
use sha2::{Digest, Sha256};

use crate::network::ActivityNetwork;

/// Fingerprint of everything CPM depends on.
pub fn network_fingerprint(program_id: ProgramId, network: &ActivityNetwork) -> String {
    let mut hasher = Sha256::new();
    hasher.update(program_id.to_string().as_bytes());

    // Nodes and edges iterate in ID order, so the digest is canonical.
    for node in network.nodes() {
        hasher.update(
            format!(
                "|a:{}:{}:{:?}:{}",
                node.id,
                node.duration_days,
                node.constraint,
                node.constraint_day.map_or(String::new(), |d| d.to_string()),
            )
            .as_bytes(),
        );
    }
    for id in network.activity_ids() {
        for edge in network.successors(id) {
            hasher.update(
                format!(
                    "|d:{}:{}:{}:{}",
                    edge.predecessor,
                    edge.successor,
                    edge.kind.as_str(),
                    edge.lag_days
                )
                .as_bytes(),
            );
        }
    }
    hex::encode(hasher.finalize())
}

enum Slot<V> {
    InFlight,
    Ready(V),
}

/// Compute-or-wait memoization map, shared by all workers.
///
/// `V` is cloned out on every hit; CPM and Monte Carlo results are stored
/// directly (wrap them in `Arc` at the call site if cloning ever shows up in
/// a profile).
pub struct ComputeCache<V> {
    slots: Mutex<HashMap<String, Slot<V>>>,
    ready: Condvar,
}

impl<V: Clone> ComputeCache<V> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
        }
    }

    /// Look up `key`, or run `compute` while holding the in-flight marker.
    ///
    /// With `force_recalculate` the read is skipped but the single-writer
    /// guarantee still holds: a forced caller waits for any in-flight
    /// computation before overwriting.
    pub fn get_or_compute<E>(
        &self,
        key: &str,
        force_recalculate: bool,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        let mut slots = self.lock();
        loop {
            match slots.get(key) {
                Some(Slot::Ready(value)) if !force_recalculate => return Ok(value.clone()),
                Some(Slot::InFlight) => {
                    slots = self
                        .ready
                        .wait(slots)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                _ => break,
            }
        }
        slots.insert(key.to_owned(), Slot::InFlight);
        drop(slots);

        let result = compute();

        let mut slots = self.lock();
        match result {
            Ok(value) => {
                slots.insert(key.to_owned(), Slot::Ready(value.clone()));
                self.ready.notify_all();
                Ok(value)
            }
            Err(error) => {
                slots.remove(key);
                self.ready.notify_all();
                Err(error)
            }
        }
    }

    /// Read without computing. In-flight entries read as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.lock().get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
        self.ready.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for ComputeCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
