// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hook registry.
//!
//! Each trie node carries a [`Hooks`] payload: the observers per event kind,
//! the subscribers, and an optional [`FieldMeta`]. The registry guards the
//! trie with a single read/write lock. Dispatch takes the read lock only long
//! enough to clone the matching handles, so hooks always run unlocked and may
//! register or remove other hooks.

use crate::domain::{EventKind, FieldMeta};
use crate::ports::{Observer, Subscriber};
use crate::trie::PathTrie;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifier handed out by [`HookRegistry::add_subscriber`].
pub type SubscriberId = u64;

/// The payload of a trie node.
#[derive(Default)]
pub struct Hooks {
    observers: [Vec<Arc<dyn Observer>>; EventKind::COUNT],
    subscribers: Vec<(SubscriberId, Arc<dyn Subscriber>)>,
    meta: Option<FieldMeta>,
}

impl Hooks {
    /// Returns true if the payload holds nothing.
    pub fn is_empty(&self) -> bool {
        self.observers.iter().all(Vec::is_empty)
            && self.subscribers.is_empty()
            && self.meta.is_none()
    }

    /// Number of observers registered for `kind`.
    pub fn observer_count(&self, kind: EventKind) -> usize {
        self.observers[kind.index()].len()
    }

    /// Number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// The field meta, if any.
    pub fn meta(&self) -> Option<&FieldMeta> {
        self.meta.as_ref()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let observers: Vec<usize> = self.observers.iter().map(Vec::len).collect();
        f.debug_struct("Hooks")
            .field("observers", &observers)
            .field("subscribers", &self.subscribers.len())
            .field("meta", &self.meta)
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    trie: PathTrie<Hooks>,
    subscriber_keys: HashMap<SubscriberId, String>,
    next_id: SubscriberId,
}

impl Inner {
    fn prune_if_empty(&mut self, key: &str) {
        if self.trie.get(key).is_some_and(Hooks::is_empty) {
            self.trie.delete(key);
        }
    }
}

/// Thread-safe registry of observers, subscribers and field metas.
///
/// All methods take trie keys as produced by
/// [`Path::trie_key`](crate::domain::Path::trie_key) or
/// [`trie_key_for`](crate::domain::trie_key_for).
///
/// # Examples
///
/// ```
/// use scopecfg::domain::{EventKind, Path, Result};
/// use scopecfg::trie::HookRegistry;
/// use std::sync::Arc;
///
/// let registry = HookRegistry::new();
/// registry.put_event(
///     EventKind::AfterGet,
///     "/carrier",
///     Arc::new(|_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> { Ok(raw) }),
/// );
///
/// let path = Path::new("carrier/dhl/username").unwrap().bind_store(2);
/// assert_eq!(registry.observers(EventKind::AfterGet, &path.trie_key()).len(), 1);
/// assert!(registry.observers(EventKind::BeforeGet, &path.trie_key()).is_empty());
/// ```
#[derive(Default)]
pub struct HookRegistry {
    inner: RwLock<Inner>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer for `kind` at `key`.
    ///
    /// Returns true if the node had no payload before.
    pub fn put_event(&self, kind: EventKind, key: &str, observer: Arc<dyn Observer>) -> bool {
        let mut inner = self.inner.write();
        let (hooks, created) = inner.trie.get_or_insert_with(key, Hooks::default);
        hooks.observers[kind.index()].push(observer);
        created
    }

    /// Removes every observer for `kind` at exactly `key`.
    ///
    /// Returns true if any observer was removed.
    pub fn remove_observers(&self, kind: EventKind, key: &str) -> bool {
        let mut inner = self.inner.write();
        let removed = match inner.trie.get_mut(key) {
            Some(hooks) => {
                let list = &mut hooks.observers[kind.index()];
                let had = !list.is_empty();
                list.clear();
                had
            }
            None => false,
        };
        inner.prune_if_empty(key);
        removed
    }

    /// Sets the field meta at `key`, replacing a previous one.
    ///
    /// Returns true if the node had no payload before.
    pub fn put_meta(&self, key: &str, meta: FieldMeta) -> bool {
        let mut inner = self.inner.write();
        let (hooks, created) = inner.trie.get_or_insert_with(key, Hooks::default);
        hooks.meta = Some(meta);
        created
    }

    /// Registers a subscriber at `key` and returns its id.
    pub fn add_subscriber(&self, key: &str, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = inner.next_id;
        let (hooks, _) = inner.trie.get_or_insert_with(key, Hooks::default);
        hooks.subscribers.push((id, subscriber));
        inner.subscriber_keys.insert(id, key.to_string());
        id
    }

    /// Removes a subscriber by id, pruning its node if nothing else remains.
    ///
    /// Returns false if the id is unknown, e.g. already evicted.
    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.write();
        let Some(key) = inner.subscriber_keys.remove(&id) else {
            return false;
        };
        let removed = match inner.trie.get_mut(&key) {
            Some(hooks) => {
                let before = hooks.subscribers.len();
                hooks.subscribers.retain(|(sid, _)| *sid != id);
                hooks.subscribers.len() < before
            }
            None => false,
        };
        inner.prune_if_empty(&key);
        removed
    }

    /// Clears the whole payload at `key` and prunes empty nodes.
    ///
    /// Returns false if `key` holds no payload.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        let ids: Vec<SubscriberId> = inner
            .trie
            .get(key)
            .map(|hooks| hooks.subscribers.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default();
        for id in ids {
            inner.subscriber_keys.remove(&id);
        }
        inner.trie.delete(key)
    }

    /// Observers for `kind` along the ancestor walk of `key`, root first,
    /// registration order within a node.
    pub fn observers(&self, kind: EventKind, key: &str) -> Vec<Arc<dyn Observer>> {
        let inner = self.inner.read();
        inner
            .trie
            .ancestors(key)
            .into_iter()
            .flat_map(|hooks| hooks.observers[kind.index()].iter().cloned())
            .collect()
    }

    /// Subscribers along the ancestor walk of `key`, root first.
    pub fn subscribers(&self, key: &str) -> Vec<(SubscriberId, Arc<dyn Subscriber>)> {
        let inner = self.inner.read();
        inner
            .trie
            .ancestors(key)
            .into_iter()
            .flat_map(|hooks| hooks.subscribers.iter().cloned())
            .collect()
    }

    /// The most specific field meta along the ancestor walk of `key`.
    pub fn meta_for(&self, key: &str) -> Option<FieldMeta> {
        let inner = self.inner.read();
        inner
            .trie
            .ancestors(key)
            .into_iter()
            .rev()
            .find_map(|hooks| hooks.meta.clone())
    }

    /// Returns true if a node exists for exactly `key`.
    pub fn contains_node(&self, key: &str) -> bool {
        self.inner.read().trie.contains_node(key)
    }

    /// Returns true while subscriber `id` is registered.
    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.inner.read().subscriber_keys.contains_key(&id)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscriber_keys.len()
    }

    /// Visits every payload under the read lock.
    pub fn walk<F>(&self, f: F) -> crate::domain::Result<()>
    where
        F: FnMut(&str, &Hooks) -> crate::domain::Result<()>,
    {
        self.inner.read().trie.walk(f)
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("nodes", &self.inner.read().trie.len())
            .finish()
    }
}
