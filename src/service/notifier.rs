// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pub/sub notifier.
//!
//! After a committed write, every subscriber registered on an ancestor of the
//! written path's trie key is told about it. Delivery happens on one dispatch
//! thread per write so a slow subscriber never blocks the writer. A subscriber
//! that returns an error or panics is logged and evicted; the failure never
//! reaches the writer. Calls to one subscriber are serialized across dispatch
//! threads and each call first checks the subscriber is still registered, so
//! an evicted subscriber is never called again.

use crate::domain::{ConfigError, Path, Result};
use crate::ports::Subscriber;
use crate::trie::{HookRegistry, SubscriberId};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

#[derive(Default)]
struct Dispatch {
    closed: bool,
    handles: Vec<JoinHandle<()>>,
}

/// One lock per subscriber, held for the duration of a call.
#[derive(Default)]
pub(crate) struct Gates {
    gates: Mutex<HashMap<SubscriberId, Arc<Mutex<()>>>>,
}

impl Gates {
    fn gate(&self, id: SubscriberId) -> Arc<Mutex<()>> {
        Arc::clone(self.gates.lock().entry(id).or_default())
    }

    fn forget(&self, id: SubscriberId) {
        self.gates.lock().remove(&id);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.gates.lock().len()
    }
}

/// Spawns and tracks dispatch threads.
pub struct Notifier {
    registry: Arc<HookRegistry>,
    gates: Arc<Gates>,
    dispatch: Mutex<Dispatch>,
}

impl Notifier {
    /// Creates a notifier delivering to the subscribers of `registry`.
    pub fn new(registry: Arc<HookRegistry>) -> Self {
        Notifier {
            registry,
            gates: Arc::new(Gates::default()),
            dispatch: Mutex::new(Dispatch::default()),
        }
    }

    /// Dispatches a change of `path` to its subscribers.
    ///
    /// Returns `Ok(false)` if nobody is subscribed, in which case no thread is
    /// spawned. Fails with `AlreadyClosed` after [`Notifier::close`].
    pub fn notify(&self, path: &Path) -> Result<bool> {
        let mut dispatch = self.dispatch.lock();
        if dispatch.closed {
            return Err(ConfigError::AlreadyClosed {
                operation: "notify".to_string(),
            });
        }

        let subscribers = self.registry.subscribers(&path.trie_key());
        if subscribers.is_empty() {
            return Ok(false);
        }

        dispatch.handles.retain(|handle| !handle.is_finished());

        let registry = Arc::clone(&self.registry);
        let gates = Arc::clone(&self.gates);
        let path = path.clone();
        let handle = thread::Builder::new()
            .name("scopecfg-notify".to_string())
            .spawn(move || deliver(&registry, &gates, &path, subscribers))
            .map_err(|e| ConfigError::Fatal {
                message: format!("Failed to spawn dispatch thread: {}", e),
            })?;
        dispatch.handles.push(handle);
        Ok(true)
    }

    /// Rejects further dispatches and waits for the running ones.
    ///
    /// Returns the number of threads joined. Calling it again is a no-op.
    pub fn close(&self) -> usize {
        let handles = {
            let mut dispatch = self.dispatch.lock();
            dispatch.closed = true;
            std::mem::take(&mut dispatch.handles)
        };

        let joined = handles.len();
        for handle in handles {
            // panics are caught inside deliver
            let _ = handle.join();
        }
        joined
    }

    /// Returns true after [`Notifier::close`].
    pub fn is_closed(&self) -> bool {
        self.dispatch.lock().closed
    }

    /// Number of dispatch threads not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.dispatch
            .lock()
            .handles
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dispatch = self.dispatch.lock();
        f.debug_struct("Notifier")
            .field("closed", &dispatch.closed)
            .field("handles", &dispatch.handles.len())
            .finish()
    }
}

/// Calls each subscriber in order, evicting the ones that fail.
pub(crate) fn deliver(
    registry: &HookRegistry,
    gates: &Gates,
    path: &Path,
    subscribers: Vec<(SubscriberId, Arc<dyn Subscriber>)>,
) {
    for (id, subscriber) in subscribers {
        let gate = gates.gate(id);
        let _turn = gate.lock();
        // the list was taken before an earlier dispatch may have evicted it
        if !registry.has_subscriber(id) {
            gates.forget(id);
            continue;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| subscriber.message_config(path)));
        let failure = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };

        error!(
            "Subscriber {} failed in message_config for {}: {}",
            id, path, failure
        );
        if registry.remove_subscriber(id) {
            debug!("Evicted subscriber {}", id);
        }
        gates.forget(id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
