// Single-flight coordinator — at most one run per key at a time.
//
// The first caller for a key becomes the leader and executes the work;
// callers that arrive while it runs subscribe to the leader's broadcast
// channel and receive the same outcome. The in-flight entry is removed by a
// guard on every exit path: success, error, cancellation, or panic. When a
// leader is dropped before finishing, its channel closes and every joined
// caller gets an "abandoned" error instead of waiting forever.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

/// Error shared between the leader and every joined caller.
pub type SharedError = Arc<anyhow::Error>;

type Outcome<V> = Result<V, SharedError>;

struct InFlight<V> {
    /// Distinguishes this run from a later run for the same key
    id: u64,
    tx: broadcast::Sender<Outcome<V>>,
}

pub struct SingleFlight<K, V> {
    in_flight: Mutex<HashMap<K, InFlight<V>>>,
    next_id: AtomicU64,
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

enum Role<V> {
    Leader(u64),
    Follower(broadcast::Receiver<Outcome<V>>),
}

impl<K, V> SingleFlight<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `work` for `key` unless a run for `key` is already in flight, in
    /// which case wait for that run and return its outcome.
    pub async fn run_exclusive<F, Fut>(&self, key: K, work: F) -> Outcome<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        // Check-and-insert under a single lock acquisition
        let role = {
            let mut map = self.lock();
            match map.get(&key) {
                Some(entry) => Role::Follower(entry.tx.subscribe()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (tx, _) = broadcast::channel(1);
                    map.insert(key.clone(), InFlight { id, tx });
                    Role::Leader(id)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => {
                debug!("Joined in-flight run");
                match rx.recv().await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Arc::new(anyhow::anyhow!(
                        "in-flight run abandoned before it finished"
                    ))),
                }
            }
            Role::Leader(id) => {
                let guard = FlightGuard {
                    flight: self,
                    key: Some(key),
                    id,
                };
                let outcome = work().await.map_err(Arc::new);
                guard.finish(outcome.clone());
                outcome
            }
        }
    }

    /// Number of keys with a run currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.lock().len()
    }

    /// Remove this run's entry, if it's still the registered one.
    fn take_entry(&self, key: &K, id: u64) -> Option<InFlight<V>> {
        let mut map = self.lock();
        match map.get(key) {
            Some(entry) if entry.id == id => map.remove(key),
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, InFlight<V>>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Removes the leader's in-flight entry when the leader finishes or is dropped.
struct FlightGuard<'a, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    flight: &'a SingleFlight<K, V>,
    key: Option<K>,
    id: u64,
}

impl<K, V> FlightGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn finish(mut self, outcome: Outcome<V>) {
        if let Some(key) = self.key.take() {
            if let Some(entry) = self.flight.take_entry(&key, self.id) {
                // No receivers just means nobody joined
                let _ = entry.tx.send(outcome);
            }
        }
    }
}

impl<K, V> Drop for FlightGuard<'_, K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // Dropping the sender closes the channel for joined callers
            drop(self.flight.take_entry(&key, self.id));
        }
    }
}
