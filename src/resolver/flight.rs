// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duplicate call suppression.
//!
//! [`SingleFlight`] guarantees at most one running load per key. Callers that
//! arrive while a load is running block until it finishes and receive a clone
//! of the same result, error included.

use crate::domain::{ConfigError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

enum State<V> {
    Pending,
    Done(Result<V>),
}

struct Call<V> {
    state: Mutex<State<V>>,
    done: Condvar,
}

impl<V> Call<V> {
    fn new() -> Self {
        Call {
            state: Mutex::new(State::Pending),
            done: Condvar::new(),
        }
    }
}

/// Keyed single-flight group.
///
/// # Examples
///
/// ```
/// use scopecfg::resolver::SingleFlight;
///
/// let flight: SingleFlight<u32, String> = SingleFlight::new();
/// let value = flight.run(7, || Ok("loaded".to_string())).unwrap();
/// assert_eq!(value, "loaded");
/// assert_eq!(flight.in_flight(), 0);
/// ```
pub struct SingleFlight<K, V> {
    calls: Mutex<HashMap<K, Arc<Call<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        SingleFlight {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> fmt::Debug for SingleFlight<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

// Completes the call with `Fatal` if the leader never reports a result,
// e.g. because the load panicked.
struct Leader<'a, K: Eq + Hash, V: Clone> {
    flight: &'a SingleFlight<K, V>,
    key: Option<K>,
    call: Arc<Call<V>>,
}

impl<K: Eq + Hash, V: Clone> Leader<'_, K, V> {
    fn finish(mut self, result: Result<V>) {
        self.complete(result);
    }

    fn complete(&mut self, result: Result<V>) {
        let Some(key) = self.key.take() else {
            return;
        };
        {
            let mut calls = self.flight.calls.lock();
            if calls
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &self.call))
            {
                calls.remove(&key);
            }
        }
        *self.call.state.lock() = State::Done(result);
        self.call.done.notify_all();
    }
}

impl<K: Eq + Hash, V: Clone> Drop for Leader<'_, K, V> {
    fn drop(&mut self) {
        if self.key.is_some() {
            self.complete(Err(ConfigError::fatal("single flight load was abandoned")));
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SingleFlight<K, V> {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `load` for `key` unless a load for the same key is already
    /// running, in which case it waits for that load's result instead.
    pub fn run<F>(&self, key: K, load: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let (call, leader) = {
            let mut calls = self.calls.lock();
            match calls.get(&key) {
                Some(call) => (Arc::clone(call), false),
                None => {
                    let call = Arc::new(Call::new());
                    calls.insert(key.clone(), Arc::clone(&call));
                    (call, true)
                }
            }
        };

        if !leader {
            let mut state = call.state.lock();
            loop {
                if let State::Done(result) = &*state {
                    return result.clone();
                }
                call.done.wait(&mut state);
            }
        }

        let guard = Leader {
            flight: self,
            key: Some(key),
            call,
        };
        let result = load();
        guard.finish(result.clone());
        result
    }

    /// Number of loads currently running.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}
