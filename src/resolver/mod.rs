// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scope fallback resolution.
//!
//! A value requested for a store falls back to the store's website and then to
//! the default scope. [`ScopeCache`] memoizes where each scope's value comes
//! from: a scope either owns a value or inherits from a less specific scope.
//! Inheritance is stored as a link, not a copy, so a later change on the
//! website is visible to every store that inherits from it. Own values may
//! carry an expiry; an expired value is dropped with the links pointing to it
//! and the scope is loaded again.

pub mod flight;

pub use flight::SingleFlight;

use crate::domain::{ConfigError, Result, ScopeId, ScopeKind, DEFAULT_SCOPE};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Slow-path loader consulted on a cache miss. `Ok(None)` means the scope has
/// no own value.
pub type Loader<T> = Box<dyn Fn(ScopeId) -> Result<Option<T>> + Send + Sync>;

/// Loader that also reports when the loaded value expires.
pub type ExpiringLoader<T> =
    Box<dyn Fn(ScopeId) -> Result<Option<(T, Option<SystemTime>)>> + Send + Sync>;

/// A cache entry.
#[derive(Debug)]
pub enum Entry<T> {
    /// The scope owns this value.
    Own(Arc<T>),
    /// The scope has no own value and resolves through the given scope.
    Inherit(ScopeId),
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        match self {
            Entry::Own(value) => Entry::Own(Arc::clone(value)),
            Entry::Inherit(scope) => Entry::Inherit(*scope),
        }
    }
}

/// Builds the fallback chain for a website/store pair, most specific first.
///
/// A default `store` means a website-only lookup; a default `website` with a
/// default `store` resolves the default scope alone. Any other combination
/// that does not form a parent/child pair is `NotValid`.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::{ScopeId, DEFAULT_SCOPE};
/// use scopecfg::resolver::fallback_chain;
///
/// let chain = fallback_chain(ScopeId::website(1), ScopeId::store(2)).unwrap();
/// assert_eq!(chain, vec![ScopeId::store(2), ScopeId::website(1), DEFAULT_SCOPE]);
///
/// assert!(fallback_chain(ScopeId::store(2), ScopeId::website(1)).is_err());
/// ```
pub fn fallback_chain(website: ScopeId, store: ScopeId) -> Result<Vec<ScopeId>> {
    match (website.kind(), store.kind()) {
        (ScopeKind::Default, ScopeKind::Default) => Ok(vec![DEFAULT_SCOPE]),
        (ScopeKind::Website, ScopeKind::Default) => Ok(vec![website, DEFAULT_SCOPE]),
        _ => {
            website.validate_parent(DEFAULT_SCOPE)?;
            store.validate_parent(website)?;
            Ok(vec![store, website, DEFAULT_SCOPE])
        }
    }
}

/// Per-scope memo of resolved values.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::{ScopeId, DEFAULT_SCOPE};
/// use scopecfg::resolver::ScopeCache;
///
/// let cache = ScopeCache::new();
/// cache.insert(DEFAULT_SCOPE, "global".to_string());
/// cache.insert(ScopeId::website(1), "site".to_string());
///
/// let value = cache.resolve(ScopeId::website(1), ScopeId::store(5)).unwrap();
/// assert_eq!(value.as_str(), "site");
///
/// // the store now links to its website; updating the website is visible
/// cache.update(ScopeId::website(1), "site v2".to_string());
/// let value = cache.resolve(ScopeId::website(1), ScopeId::store(5)).unwrap();
/// assert_eq!(value.as_str(), "site v2");
/// ```
pub struct ScopeCache<T> {
    entries: RwLock<HashMap<ScopeId, Slot<T>>>,
    loader: Option<ExpiringLoader<T>>,
    flight: SingleFlight<ScopeId, Option<(Arc<T>, Option<SystemTime>)>>,
}

struct Slot<T> {
    entry: Entry<T>,
    expires: Option<SystemTime>,
}

impl<T> Slot<T> {
    fn own(value: Arc<T>, expires: Option<SystemTime>) -> Self {
        Slot {
            entry: Entry::Own(value),
            expires,
        }
    }

    fn inherit(scope: ScopeId) -> Self {
        Slot {
            entry: Entry::Inherit(scope),
            expires: None,
        }
    }

    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }
}

fn drop_scope<T>(entries: &mut HashMap<ScopeId, Slot<T>>, scope: ScopeId) -> bool {
    entries.retain(|_, slot| !matches!(slot.entry, Entry::Inherit(target) if target == scope));
    entries.remove(&scope).is_some()
}

impl<T> Default for ScopeCache<T> {
    fn default() -> Self {
        ScopeCache {
            entries: RwLock::new(HashMap::new()),
            loader: None,
            flight: SingleFlight::default(),
        }
    }
}

impl<T> fmt::Debug for ScopeCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeCache")
            .field("entries", &self.entries.read().len())
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

impl<T> ScopeCache<T> {
    /// Creates an empty cache without slow-path loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache that consults `loader` on misses.
    pub fn with_loader(loader: Loader<T>) -> Self
    where
        T: 'static,
    {
        Self::with_expiring_loader(Box::new(
            move |scope: ScopeId| -> Result<Option<(T, Option<SystemTime>)>> {
                Ok(loader(scope)?.map(|value| (value, None)))
            },
        ))
    }

    /// Creates an empty cache whose loader reports expiries.
    pub fn with_expiring_loader(loader: ExpiringLoader<T>) -> Self {
        ScopeCache {
            loader: Some(loader),
            ..Self::default()
        }
    }

    /// Sets the own value of `scope`.
    pub fn insert(&self, scope: ScopeId, value: T) {
        self.insert_until(scope, value, None);
    }

    /// Sets the own value of `scope`, served until `expires`.
    pub fn insert_until(&self, scope: ScopeId, value: T, expires: Option<SystemTime>) {
        self.entries
            .write()
            .insert(scope, Slot::own(Arc::new(value), expires));
    }

    /// Sets the own value of `scope` and drops inheritance links that point
    /// to any other scope, since they may now resolve differently.
    pub fn update(&self, scope: ScopeId, value: T) {
        self.update_until(scope, value, None);
    }

    /// Like [`ScopeCache::update`], with the value served until `expires`.
    pub fn update_until(&self, scope: ScopeId, value: T, expires: Option<SystemTime>) {
        let mut entries = self.entries.write();
        entries.retain(|_, slot| match slot.entry {
            Entry::Inherit(target) => target == scope,
            Entry::Own(_) => true,
        });
        entries.insert(scope, Slot::own(Arc::new(value), expires));
    }

    /// Removes the entry of `scope` and every link pointing to it.
    pub fn remove(&self, scope: ScopeId) -> bool {
        drop_scope(&mut self.entries.write(), scope)
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// The entry stored for exactly `scope`. Expired values are not reported.
    pub fn entry(&self, scope: ScopeId) -> Option<Entry<T>> {
        let entries = self.entries.read();
        let slot = entries.get(&scope)?;
        (!slot.is_expired(SystemTime::now())).then(|| slot.entry.clone())
    }

    /// Number of entries, links included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Resolves the value for a website/store pair.
    pub fn resolve(&self, website: ScopeId, store: ScopeId) -> Result<Arc<T>> {
        let chain = fallback_chain(website, store)?;
        self.resolve_chain(&chain)
    }

    /// Resolves the value for `child`, falling back to `parent` and then to
    /// the default scope.
    pub fn resolve_pair(&self, parent: ScopeId, child: ScopeId) -> Result<Arc<T>> {
        child.validate_parent(parent)?;
        let mut chain = vec![child, parent];
        if parent != DEFAULT_SCOPE {
            chain.push(DEFAULT_SCOPE);
        }
        self.resolve_chain(&chain)
    }

    /// Resolves along an explicit chain, most specific scope first.
    ///
    /// Scopes before the one that supplied the value are linked to it.
    pub fn resolve_chain(&self, chain: &[ScopeId]) -> Result<Arc<T>> {
        self.locate_chain(chain).map(|(_, value)| value)
    }

    /// Like [`ScopeCache::resolve_chain`], also returning the scope that
    /// supplied the value.
    pub fn locate_chain(&self, chain: &[ScopeId]) -> Result<(ScopeId, Arc<T>)> {
        let first = chain.first().copied().ok_or_else(|| ConfigError::Empty {
            what: "fallback chain".to_string(),
        })?;

        for (idx, scope) in chain.iter().copied().enumerate() {
            let found = match self.entry(scope) {
                Some(Entry::Own(value)) => {
                    debug!("Scope cache hit for {}", scope);
                    Some(value)
                }
                Some(Entry::Inherit(_)) => None,
                None => {
                    self.evict_expired(scope);
                    self.load(scope)?
                }
            };

            if let Some(value) = found {
                if idx > 0 {
                    let mut entries = self.entries.write();
                    for more_specific in &chain[..idx] {
                        entries
                            .entry(*more_specific)
                            .or_insert_with(|| Slot::inherit(scope));
                    }
                }
                return Ok((scope, value));
            }
        }

        Err(ConfigError::not_found(first.to_string()))
    }

    fn evict_expired(&self, scope: ScopeId) {
        let mut entries = self.entries.write();
        if entries
            .get(&scope)
            .is_some_and(|slot| slot.is_expired(SystemTime::now()))
        {
            debug!("Scope cache entry for {} expired", scope);
            drop_scope(&mut entries, scope);
        }
    }

    fn load(&self, scope: ScopeId) -> Result<Option<Arc<T>>> {
        let Some(loader) = &self.loader else {
            return Ok(None);
        };
        let loaded = self.flight.run(scope, || {
            Ok(loader(scope)?.map(|(value, expires)| (Arc::new(value), expires)))
        })?;
        let Some((value, expires)) = loaded else {
            return Ok(None);
        };
        if expires.is_some_and(|at| at <= SystemTime::now()) {
            return Ok(None);
        }
        debug!("Scope cache loaded {}", scope);
        self.entries
            .write()
            .entry(scope)
            .or_insert_with(|| Slot::own(Arc::clone(&value), expires));
        Ok(Some(value))
    }
}
