// SPDX-License-Identifier: MIT OR Apache-2.0

//! The configuration service.
//!
//! [`Service`] ties the hook registry, the layered storage, the per-route scope
//! caches and the notifier together. It is cheap to clone; clones share state.
//! [`ServiceBuilder`] wires storage backends, configuration sources and field
//! metas before the first value is loaded.

use crate::adapters::{LayeredStorage, LruStorage, MapStorage};
use crate::domain::{
    trie_key_for, ConfigError, EventKind, FieldMeta, Getter, Path, Result, ScopeId, Value,
    DEFAULT_SCOPE,
};
use crate::ports::{ConfigSource, ConfigWatcher, Observer, Storager, Subscriber};
use crate::resolver::ScopeCache;
use crate::service::notifier::Notifier;
use crate::service::pipeline;
use crate::service::scoped::Scoped;
use crate::trie::{HookRegistry, SubscriberId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Weak};
use std::time::SystemTime;
use tracing::{debug, info, warn};

struct Inner {
    registry: Arc<HookRegistry>,
    storage: Arc<LayeredStorage>,
    notifier: Notifier,
    /// Scope caches for scoped reads, keyed by route
    caches: Mutex<HashMap<String, Arc<ScopeCache<Vec<u8>>>>>,
    /// Serializes storage writes with the matching cache update
    write_lock: Mutex<()>,
    sources: Mutex<Vec<Box<dyn ConfigSource>>>,
    metas: Mutex<Vec<FieldMeta>>,
    meta_rx: Mutex<Option<Receiver<FieldMeta>>>,
    watchers: Mutex<Vec<Box<dyn ConfigWatcher>>>,
    closed: AtomicBool,
}

/// The scoped configuration service.
///
/// # Examples
///
/// ```rust
/// use scopecfg::prelude::*;
///
/// # fn main() -> Result<()> {
/// let service = Service::builder()
///     .with_field_meta(
///         FieldMeta::new(Path::new("carrier/dhl/timeout")?).with_default("3600s"),
///     )
///     .build()?;
///
/// let username = Path::new("carrier/dhl/username")?;
/// service.set(&username, b"alice")?;
/// service.set(&username.bind_website(1), b"bob")?;
///
/// let store = service.scoped(1, 7)?;
/// assert_eq!(store.get("carrier/dhl/username")?.as_str()?, "bob");
/// assert_eq!(store.get("carrier/dhl/timeout")?.as_duration()?.as_secs(), 3600);
///
/// service.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

impl Service {
    /// Creates a service backed by a single in-memory map, without sources.
    pub fn new() -> Self {
        Self::from_parts(
            LayeredStorage::new(Box::new(MapStorage::new())),
            Vec::new(),
            None,
        )
    }

    /// Creates a new service builder.
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    /// Creates a service with the default sources.
    ///
    /// This reads environment variables and, if it exists, the YAML file at
    /// the OS-appropriate configuration location of the application.
    ///
    /// ```rust,no_run
    /// use scopecfg::service::Service;
    ///
    /// # fn main() -> scopecfg::domain::Result<()> {
    /// let service = Service::with_defaults("shop", "com.example")?;
    /// # Ok(())
    /// # }
    /// ```
    #[allow(unused_variables, unused_mut)]
    pub fn with_defaults(app_name: &str, qualifier: &str) -> Result<Self> {
        let mut builder = Self::builder();

        #[cfg(feature = "env")]
        {
            builder = builder.with_env_vars();
        }

        #[cfg(feature = "yaml")]
        {
            use crate::adapters::YamlFileAdapter;
            if let Ok(adapter) = YamlFileAdapter::from_default_location(app_name, qualifier) {
                builder = builder.with_source(Box::new(adapter));
            }
        }

        builder.build()
    }

    fn from_parts(
        storage: LayeredStorage,
        sources: Vec<Box<dyn ConfigSource>>,
        meta_rx: Option<Receiver<FieldMeta>>,
    ) -> Self {
        let registry = Arc::new(HookRegistry::new());
        Service {
            inner: Arc::new(Inner {
                notifier: Notifier::new(Arc::clone(&registry)),
                registry,
                storage: Arc::new(storage),
                caches: Mutex::new(HashMap::new()),
                write_lock: Mutex::new(()),
                sources: Mutex::new(sources),
                metas: Mutex::new(Vec::new()),
                meta_rx: Mutex::new(meta_rx),
                watchers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.is_closed() {
            return Err(ConfigError::AlreadyClosed {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Returns true after [`Service::close`].
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Reads the value stored at exactly `path`.
    ///
    /// `BeforeGet` observers run first; a value they return replaces the
    /// storage lookup. Otherwise storage is consulted and, on a miss, the
    /// route's field meta default. `AfterGet` observers see the result. A
    /// value missing everywhere is returned as not found, not as an error.
    pub fn get(&self, path: &Path) -> Result<Value> {
        path.validate()?;
        let registry = &self.inner.registry;

        let raw = match pipeline::run(registry, EventKind::BeforeGet, path, None)? {
            Some(raw) => Some(raw),
            None => self.inner.storage.get(path)?,
        };
        let raw = match raw {
            Some(raw) => Some(raw),
            None => self.default_for(path),
        };
        let raw = pipeline::run(registry, EventKind::AfterGet, path, raw)?;
        Ok(Value::from_option(path.clone(), raw))
    }

    /// Returns the value as a string or `default` if it is absent or unreadable.
    pub fn get_or_default(&self, path: &Path, default: &str) -> String {
        Getter::get_or_default(self, path, default)
    }

    /// Returns true if a value or default exists at `path`.
    pub fn has(&self, path: &Path) -> bool {
        Getter::has(self, path)
    }

    /// Writes `value` at `path`.
    ///
    /// The write is checked against the route's write permission, passed
    /// through the `BeforeSet` observers, committed to storage and the scope
    /// cache, passed to the `AfterSet` observers and finally announced to
    /// subscribers on a dispatch thread. If a `BeforeSet` observer reports the
    /// value as absent, an empty value is stored.
    pub fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        self.ensure_open("set")?;
        path.validate()?;
        let registry = &self.inner.registry;

        if let Some(meta) = registry.meta_for(&path.trie_key()) {
            meta.check_write(path)?;
        }

        let raw = pipeline::run(registry, EventKind::BeforeSet, path, Some(value.to_vec()))?
            .unwrap_or_default();

        {
            let _guard = self.inner.write_lock.lock();
            self.inner.storage.set(path, &raw)?;
            if path.env_suffix().is_none() {
                let cache = self.inner.caches.lock().get(path.route().as_str()).cloned();
                if let Some(cache) = cache {
                    cache.update_until(path.scope(), raw.clone(), path.expires());
                }
            }
        }
        debug!("Stored {}", path);

        pipeline::run(registry, EventKind::AfterSet, path, Some(raw))?;

        match self.inner.notifier.notify(path) {
            Ok(_) => Ok(()),
            // close() won the race after the write was committed
            Err(e) if e.is_already_closed() => {
                debug!("Skipping notification for {}: service closed", path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Returns a view bound to a website and store.
    ///
    /// Id 0 means "not set": `scoped(0, 0)` reads the default scope,
    /// `scoped(w, 0)` is a website-only view. A store without a website is
    /// `NotValid`.
    pub fn scoped(&self, website: u32, store: u32) -> Result<Scoped> {
        let website = if website == 0 {
            DEFAULT_SCOPE
        } else {
            ScopeId::website(website)
        };
        let store = if store == 0 {
            DEFAULT_SCOPE
        } else {
            ScopeId::store(store)
        };
        Scoped::new(self.clone(), website, store)
    }

    /// Subscribes to writes at or below `key`.
    ///
    /// `key` is a partial route (`carrier/dhl`), a route, or a fully
    /// qualified path to listen to a single scope. A subscription on a
    /// default-scope key also sees writes to every scope of that route.
    pub fn subscribe(&self, key: &str, subscriber: Arc<dyn Subscriber>) -> Result<SubscriberId> {
        self.ensure_open("subscribe")?;
        let trie_key = trie_key_for(key)?;
        let id = self.inner.registry.add_subscriber(&trie_key, subscriber);
        debug!("Subscriber {} registered at {}", id, trie_key);
        Ok(id)
    }

    /// Removes a subscriber. Fails with `NotFound` if the id is unknown or
    /// the subscriber was evicted.
    pub fn unsubscribe(&self, id: SubscriberId) -> Result<()> {
        if self.inner.registry.remove_subscriber(id) {
            Ok(())
        } else {
            Err(ConfigError::not_found(format!("subscriber {}", id)))
        }
    }

    /// Registers an observer for `kind` at `key`.
    pub fn register_observer(
        &self,
        kind: EventKind,
        key: &str,
        observer: Arc<dyn Observer>,
    ) -> Result<()> {
        self.ensure_open("register observer")?;
        let trie_key = trie_key_for(key)?;
        self.inner.registry.put_event(kind, &trie_key, observer);
        debug!("Observer for {} registered at {}", kind, trie_key);
        Ok(())
    }

    /// Removes every `kind` observer registered at exactly `key`.
    ///
    /// Returns false if there was none.
    pub fn deregister_observer(&self, kind: EventKind, key: &str) -> Result<bool> {
        let trie_key = trie_key_for(key)?;
        Ok(self.inner.registry.remove_observers(kind, &trie_key))
    }

    /// Registers the default value and write permission of a route.
    ///
    /// The meta is kept and re-applied on every reload.
    pub fn register_field_meta(&self, meta: FieldMeta) -> Result<()> {
        meta.path().validate()?;
        let key = meta.path().trie_key();
        self.inner.registry.put_meta(&key, meta.clone());

        let mut metas = self.inner.metas.lock();
        metas.retain(|known| known.path().trie_key() != key);
        metas.push(meta);
        Ok(())
    }

    /// Re-reads field metas and sources without losing subscriptions,
    /// observers or stored values.
    ///
    /// Pending metas are drained from the channel, all known metas are
    /// re-applied, every source is reloaded and re-applied lowest priority
    /// first, and the scope caches are cleared. Failing sources are logged
    /// and skipped.
    pub fn reload(&self) -> Result<()> {
        self.ensure_open("reload")?;
        info!("Reloading configuration");

        self.drain_field_metas()?;
        let metas = self.inner.metas.lock().clone();
        for meta in metas {
            self.inner.registry.put_meta(&meta.path().trie_key(), meta);
        }

        let applied = self.load_sources(true)?;
        self.inner.caches.lock().clear();

        info!("Configuration reloaded, {} entries applied", applied);
        Ok(())
    }

    /// Starts `watcher` and reloads the service each time it fires.
    ///
    /// The watcher is stopped by [`Service::close`].
    pub fn register_watcher(&self, mut watcher: Box<dyn ConfigWatcher>) -> Result<()> {
        self.ensure_open("register watcher")?;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        watcher.watch(Arc::new(move |trigger: &str| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let service = Service { inner };
            if service.is_closed() {
                return;
            }
            debug!("Reload triggered by {}", trigger);
            if let Err(e) = service.reload() {
                warn!("Reload triggered by {} failed: {}", trigger, e);
            }
        }))?;
        self.inner.watchers.lock().push(watcher);
        Ok(())
    }

    /// Shuts the service down.
    ///
    /// Watchers are stopped, further writes are rejected and all in-flight
    /// notifications are delivered before this returns. Reads keep working.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Err(ConfigError::AlreadyClosed {
                operation: "close".to_string(),
            });
        }

        let watchers = std::mem::take(&mut *self.inner.watchers.lock());
        for mut watcher in watchers {
            if let Err(e) = watcher.stop() {
                warn!("Failed to stop watcher: {}", e);
            }
        }

        let joined = self.inner.notifier.close();
        info!(
            "Configuration service closed, {} dispatch threads joined",
            joined
        );
        Ok(())
    }

    /// The hook registry.
    pub fn registry(&self) -> &HookRegistry {
        &self.inner.registry
    }

    /// The storage.
    pub fn storage(&self) -> &LayeredStorage {
        &self.inner.storage
    }

    pub(crate) fn default_for(&self, path: &Path) -> Option<Vec<u8>> {
        self.inner
            .registry
            .meta_for(&path.trie_key())
            .and_then(|meta| meta.default_value().map(<[u8]>::to_vec))
    }

    /// The scope cache of the route of `path`, created on first use.
    pub(crate) fn cache_for(&self, path: &Path) -> Arc<ScopeCache<Vec<u8>>> {
        let mut caches = self.inner.caches.lock();
        let cache = caches
            .entry(path.route().as_str().to_string())
            .or_insert_with(|| {
                let storage = Arc::clone(&self.inner.storage);
                let base = path.bind(DEFAULT_SCOPE);
                Arc::new(ScopeCache::with_expiring_loader(Box::new(
                    move |scope: ScopeId| -> Result<Option<(Vec<u8>, Option<SystemTime>)>> {
                        Ok(storage
                            .get_entry(&base.bind(scope))?
                            .map(|stored| (stored.data, stored.expires)))
                    },
                )))
            });
        Arc::clone(cache)
    }

    fn drain_field_metas(&self) -> Result<usize> {
        let pending: Vec<FieldMeta> = match self.inner.meta_rx.lock().as_ref() {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        };
        let count = pending.len();
        for meta in pending {
            self.register_field_meta(meta)?;
        }
        if count > 0 {
            debug!("Registered {} field metas from channel", count);
        }
        Ok(count)
    }

    /// Writes the entries of every source, lowest priority first.
    ///
    /// During a reload failing sources are skipped; at build time they abort.
    fn load_sources(&self, reloading: bool) -> Result<usize> {
        let mut sources = self.inner.sources.lock();
        sources.sort_by_key(|source| source.priority());

        let mut applied = 0;
        for source in sources.iter_mut() {
            let entries = if reloading {
                if let Err(e) = source.reload() {
                    warn!("Failed to reload source '{}': {}", source.name(), e);
                    continue;
                }
                match source.entries() {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!("Failed to read source '{}': {}", source.name(), e);
                        continue;
                    }
                }
            } else {
                source.entries()?
            };

            debug!(
                "Applying {} entries from source '{}'",
                entries.len(),
                source.name()
            );
            for (path, value) in entries {
                match self.set(&path, &value) {
                    Ok(()) => applied += 1,
                    Err(e) if !reloading && !e.is_not_allowed() => return Err(e),
                    Err(e) => warn!(
                        "Skipping {} from source '{}': {}",
                        path,
                        source.name(),
                        e
                    ),
                }
            }
        }
        Ok(applied)
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

impl Getter for Service {
    fn get(&self, path: &Path) -> Result<Value> {
        Service::get(self, path)
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("registry", &self.inner.registry)
            .field("storage", &self.inner.storage)
            .field("notifier", &self.inner.notifier)
            .field("sources", &self.inner.sources.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for constructing a [`Service`].
///
/// # Examples
///
/// ```rust
/// use scopecfg::domain::Path;
/// use scopecfg::service::ServiceBuilder;
///
/// # fn main() -> scopecfg::domain::Result<()> {
/// let service = ServiceBuilder::new()
///     .with_level1_lru(256)
///     .with_cli_args(vec!["--websites/2/carrier/dhl/username=bob"])
///     .build()?;
///
/// let path = Path::parse("websites/2/carrier/dhl/username")?;
/// assert_eq!(service.get(&path)?.as_str()?, "bob");
/// # Ok(())
/// # }
/// ```
pub struct ServiceBuilder {
    level1: Option<Box<dyn Storager>>,
    level2: Option<Box<dyn Storager>>,
    sources: Vec<Box<dyn ConfigSource>>,
    metas: Vec<FieldMeta>,
    meta_rx: Option<Receiver<FieldMeta>>,
}

impl ServiceBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            level1: None,
            level2: None,
            sources: Vec::new(),
            metas: Vec::new(),
            meta_rx: None,
        }
    }

    /// Puts a bounded LRU cache in front of Level2.
    pub fn with_level1_lru(self, capacity: usize) -> Self {
        self.with_level1(Box::new(LruStorage::new(capacity)))
    }

    /// Puts `storage` in front of Level2.
    pub fn with_level1(mut self, storage: Box<dyn Storager>) -> Self {
        self.level1 = Some(storage);
        self
    }

    /// Replaces the default in-memory Level2.
    pub fn with_level2(mut self, storage: Box<dyn Storager>) -> Self {
        self.level2 = Some(storage);
        self
    }

    /// Adds a configuration source.
    ///
    /// ```rust
    /// use scopecfg::service::ServiceBuilder;
    /// use scopecfg::adapters::EnvVarAdapter;
    ///
    /// # fn main() -> scopecfg::domain::Result<()> {
    /// let service = ServiceBuilder::new()
    ///     .with_source(Box::new(EnvVarAdapter::with_prefix("DOCTEST_NONE_")))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Adds `SCOPECFG_` environment variables as a source.
    #[cfg(feature = "env")]
    pub fn with_env_vars(self) -> Self {
        use crate::adapters::EnvVarAdapter;
        self.with_source(Box::new(EnvVarAdapter::new()))
    }

    /// Adds environment variables with a prefix as a source.
    #[cfg(feature = "env")]
    pub fn with_env_prefix(self, prefix: impl Into<String>) -> Self {
        use crate::adapters::EnvVarAdapter;
        self.with_source(Box::new(EnvVarAdapter::with_prefix(prefix)))
    }

    /// Adds command-line arguments as a source.
    #[cfg(feature = "cli")]
    pub fn with_cli_args<S: AsRef<str>>(self, args: Vec<S>) -> Self {
        use crate::adapters::CommandLineAdapter;
        self.with_source(Box::new(CommandLineAdapter::from_args(args)))
    }

    /// Adds a YAML file as a source.
    ///
    /// ```rust,no_run
    /// use scopecfg::service::ServiceBuilder;
    ///
    /// # fn main() -> scopecfg::domain::Result<()> {
    /// let service = ServiceBuilder::new()
    ///     .with_yaml_file("/etc/shop/config.yaml")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg(feature = "yaml")]
    pub fn with_yaml_file(self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        use crate::adapters::YamlFileAdapter;
        let adapter = YamlFileAdapter::from_file(path)?;
        Ok(self.with_source(Box::new(adapter)))
    }

    /// Adds a field meta.
    pub fn with_field_meta(mut self, meta: FieldMeta) -> Self {
        self.metas.push(meta);
        self
    }

    /// Adds several field metas.
    pub fn with_field_metas(mut self, metas: impl IntoIterator<Item = FieldMeta>) -> Self {
        self.metas.extend(metas);
        self
    }

    /// Reads field metas from a channel at build time and on every reload.
    pub fn with_field_meta_receiver(mut self, rx: Receiver<FieldMeta>) -> Self {
        self.meta_rx = Some(rx);
        self
    }

    /// Builds the service and loads every source.
    ///
    /// Field metas are registered before the sources are applied, so source
    /// entries are subject to write permissions. Entries that violate one are
    /// skipped; any other source failure aborts the build.
    pub fn build(self) -> Result<Service> {
        let level2 = self
            .level2
            .unwrap_or_else(|| Box::new(MapStorage::new()) as Box<dyn Storager>);
        let mut storage = LayeredStorage::new(level2);
        if let Some(level1) = self.level1 {
            storage = storage.with_level1(level1);
        }

        let service = Service::from_parts(storage, self.sources, self.meta_rx);
        for meta in self.metas {
            service.register_field_meta(meta)?;
        }
        service.drain_field_metas()?;

        let applied = service.load_sources(false)?;
        debug!("Service built, {} source entries applied", applied);
        Ok(service)
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
