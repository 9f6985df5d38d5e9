// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rate-limited deduplicating work queue.
//!
//! Keys added while queued are collapsed; keys re-added while a worker is
//! processing them are deferred until the worker calls [`WorkQueue::done`],
//! so reconciles for a single key are strictly serialised. Failed keys come
//! back through [`WorkQueue::add_rate_limited`] with exponential backoff and
//! ±10% jitter; [`WorkQueue::forget`] resets the backoff after a success.

use crate::constants::{QUEUE_BASE_DELAY_MILLIS, QUEUE_JITTER_FACTOR, QUEUE_MAX_DELAY_MILLIS};
use crate::metrics;
use rand::Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// The resource kind a queue key refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A `CoreDNSEntry`.
    Entry,
    /// A `HostedZone`.
    Zone,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Entry => f.write_str("entry"),
            Kind::Zone => f.write_str("zone"),
        }
    }
}

/// A `(kind, namespace, name)` work item.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// The resource kind.
    pub kind: Kind,
    /// Object namespace.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

impl RequestKey {
    /// Build a request key.
    #[must_use]
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        RequestKey {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<RequestKey>,
    dirty: HashSet<RequestKey>,
    processing: HashSet<RequestKey>,
    failures: HashMap<RequestKey, u32>,
    shutdown: bool,
}

/// A deduplicating FIFO of [`RequestKey`]s with per-key backoff.
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        WorkQueue {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Add a key. No-op if the key is already queued; deferred until `done`
    /// if the key is currently being processed.
    pub fn add(&self, key: RequestKey) {
        {
            let mut state = self.state.lock().expect("queue lock poisoned");
            if state.shutdown || state.dirty.contains(&key) {
                return;
            }
            state.dirty.insert(key.clone());
            if state.processing.contains(&key) {
                return;
            }
            state.queue.push_back(key);
            metrics::set_queue_depth(state.queue.len());
        }
        self.notify.notify_one();
    }

    /// Re-add a key after a failure, delayed by the per-key backoff.
    pub fn add_rate_limited(self: &Arc<Self>, key: RequestKey) {
        let delay = {
            let mut state = self.state.lock().expect("queue lock poisoned");
            if state.shutdown {
                return;
            }
            let failures = state.failures.entry(key.clone()).or_insert(0);
            let delay = backoff_delay(*failures);
            *failures = failures.saturating_add(1);
            delay
        };
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Clear the backoff state of a key after a successful reconcile.
    pub fn forget(&self, key: &RequestKey) {
        self.state
            .lock()
            .expect("queue lock poisoned")
            .failures
            .remove(key);
    }

    /// Mark a key as no longer being processed, moving a deferred re-add
    /// back onto the queue.
    pub fn done(&self, key: &RequestKey) {
        let readd = {
            let mut state = self.state.lock().expect("queue lock poisoned");
            state.processing.remove(key);
            if state.dirty.contains(key) && !state.shutdown {
                state.queue.push_back(key.clone());
                metrics::set_queue_depth(state.queue.len());
                true
            } else {
                false
            }
        };
        if readd {
            self.notify.notify_one();
        }
    }

    /// Wait for the next key. Returns `None` once the queue has been shut
    /// down and drained.
    pub async fn get(&self) -> Option<RequestKey> {
        loop {
            {
                let mut state = self.state.lock().expect("queue lock poisoned");
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    metrics::set_queue_depth(state.queue.len());
                    return Some(key);
                }
                if state.shutdown {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Shut the queue down: pending keys are dropped and waiting workers
    /// are released.
    pub fn shut_down(&self) {
        {
            let mut state = self.state.lock().expect("queue lock poisoned");
            state.shutdown = true;
            state.queue.clear();
            state.dirty.clear();
            metrics::set_queue_depth(0);
        }
        self.notify.notify_waiters();
    }

    /// Number of keys waiting in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("queue lock poisoned").queue.len()
    }

    /// Whether no keys are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exponential backoff with jitter: `base * 2^failures`, capped.
fn backoff_delay(failures: u32) -> Duration {
    let exp = failures.min(16);
    let millis = QUEUE_BASE_DELAY_MILLIS.saturating_mul(1u64 << exp).min(QUEUE_MAX_DELAY_MILLIS);
    let jitter = millis as f64 * QUEUE_JITTER_FACTOR;
    let low = (millis as f64 - jitter).max(0.0);
    let high = millis as f64 + jitter;
    let jittered = rand::thread_rng().gen_range(low..=high);
    Duration::from_millis(jittered as u64)
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
