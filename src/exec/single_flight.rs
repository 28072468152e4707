// src/exec/single_flight.rs

//! Coalescing of concurrent build requests for the same target.
//!
//! Builds mutate shared artifacts named by the target, so two attempts for
//! one name must never overlap. The first caller for a key runs the work;
//! callers arriving while it is in flight wait for and reuse its result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::debug;

type Slot<T> = watch::Receiver<Option<T>>;

#[derive(Debug)]
pub struct SingleFlight<T> {
    inflight: Arc<Mutex<HashMap<String, Slot<T>>>>,
}

impl<T> Clone for SingleFlight<T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

enum Role<T> {
    Leader(watch::Sender<Option<T>>),
    Follower(Slot<T>),
}

/// Removes the key when the leader finishes or is dropped mid-flight.
struct LeaderGuard<'a, T> {
    inflight: &'a Mutex<HashMap<String, Slot<T>>>,
    key: &'a str,
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a flight for `key` is currently running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Run `work` for `key` unless a run is already in flight, in which case
    /// wait for it and return its result.
    ///
    /// `abandoned` is returned to followers if the leader is dropped before
    /// producing a result.
    pub async fn run<F, Fut>(&self, key: &str, abandoned: T, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let role = {
            let mut map = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            match map.get(key) {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    map.insert(key.to_string(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let guard = LeaderGuard {
                    inflight: &self.inflight,
                    key,
                };
                let result = work().await;
                drop(guard);
                let _ = tx.send(Some(result.clone()));
                result
            }
            Role::Follower(mut rx) => {
                debug!(key = %key, "request already in flight; waiting for its result");
                match rx.wait_for(Option::is_some).await {
                    Ok(value) => value.clone().unwrap_or(abandoned),
                    Err(_) => abandoned,
                }
            }
        }
    }
}
