// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped read views.
//!
//! A [`Scoped`] view is bound to one website/store pair. Reads start at the
//! most specific bound scope and fall back to the website and the default
//! scope through the route's [`ScopeCache`](crate::resolver::ScopeCache).

use crate::domain::{
    ConfigError, EventKind, Path, Result, ScopeId, ScopeKind, ScopedGetter, Value,
};
use crate::resolver::fallback_chain;
use crate::service::config_service::Service;
use crate::service::pipeline;
use std::fmt;

/// A read view bound to a website/store pair.
///
/// Created by [`Service::scoped`].
#[derive(Clone)]
pub struct Scoped {
    service: Service,
    website: ScopeId,
    store: ScopeId,
    chain: Vec<ScopeId>,
}

impl Scoped {
    pub(crate) fn new(service: Service, website: ScopeId, store: ScopeId) -> Result<Self> {
        let chain = fallback_chain(website, store)?;
        Ok(Scoped {
            service,
            website,
            store,
            chain,
        })
    }

    /// The fallback chain, most specific scope first.
    pub fn chain(&self) -> &[ScopeId] {
        &self.chain
    }

    fn resolve(&self, start: ScopeKind, route: &str) -> Result<Value> {
        let base = Path::new(route)?;
        base.validate()?;

        // values cannot exist above the route's write permission
        let ceiling = self
            .service
            .registry()
            .meta_for(&base.trie_key())
            .map(|meta| meta.write_scope())
            .unwrap_or(ScopeKind::Store)
            .min(start);
        let chain: Vec<ScopeId> = self
            .chain
            .iter()
            .copied()
            .filter(|scope| scope.kind() <= ceiling)
            .collect();
        let first = chain.first().copied().ok_or_else(|| {
            ConfigError::not_valid(format!("no scope at or below {} to read {}", start, route))
        })?;

        let registry = self.service.registry();
        let requested = base.bind(first);

        let (path, raw) = match pipeline::run(registry, EventKind::BeforeGet, &requested, None)? {
            Some(raw) => (requested, Some(raw)),
            None => match self.service.cache_for(&base).locate_chain(&chain) {
                Ok((scope, raw)) => (base.bind(scope), Some((*raw).clone())),
                Err(e) if e.is_not_found() => match self.service.default_for(&base) {
                    Some(default) => (base, Some(default)),
                    None => (requested, None),
                },
                Err(e) => return Err(e),
            },
        };

        let raw = pipeline::run(registry, EventKind::AfterGet, &path, raw)?;
        Ok(Value::from_option(path, raw))
    }
}

impl ScopedGetter for Scoped {
    fn website(&self) -> ScopeId {
        self.website
    }

    fn store(&self) -> ScopeId {
        self.store
    }

    fn get(&self, route: &str) -> Result<Value> {
        self.resolve(ScopeKind::Store, route)
    }

    fn get_at(&self, start: ScopeKind, route: &str) -> Result<Value> {
        self.resolve(start, route)
    }
}

impl fmt::Debug for Scoped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("website", &self.website)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldMeta, DEFAULT_SCOPE};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const ROUTE: &str = "carrier/dhl/username";

    fn path() -> Path {
        Path::new(ROUTE).unwrap()
    }

    #[test]
    fn test_store_falls_back_to_website_then_default() {
        let service = Service::new();
        service.set(&path(), b"global").unwrap();

        let view = service.scoped(1, 5).unwrap();
        assert_eq!(view.chain().len(), 3);
        let value = view.get(ROUTE).unwrap();
        assert_eq!(value.as_str().unwrap(), "global");
        assert_eq!(value.path().scope(), DEFAULT_SCOPE);

        service.set(&path().bind_website(1), b"site").unwrap();
        let value = view.get(ROUTE).unwrap();
        assert_eq!(value.as_str().unwrap(), "site");
        assert_eq!(value.path().scope(), ScopeId::website(1));

        service.set(&path().bind_store(5), b"store").unwrap();
        assert_eq!(view.get(ROUTE).unwrap().as_str().unwrap(), "store");

        // other stores of the website still inherit
        let sibling = service.scoped(1, 6).unwrap();
        assert_eq!(sibling.get(ROUTE).unwrap().as_str().unwrap(), "site");
    }

    #[test]
    fn test_get_at_trims_the_chain() {
        let service = Service::new();
        service.set(&path(), b"global").unwrap();
        service.set(&path().bind_website(1), b"site").unwrap();
        service.set(&path().bind_store(5), b"store").unwrap();

        let view = service.scoped(1, 5).unwrap();
        assert_eq!(
            view.get_at(ScopeKind::Website, ROUTE).unwrap().as_str().unwrap(),
            "site"
        );
        assert_eq!(
            view.get_at(ScopeKind::Default, ROUTE).unwrap().as_str().unwrap(),
            "global"
        );
        assert!(view
            .get_at(ScopeKind::Absent, ROUTE)
            .unwrap_err()
            .is_not_valid());
    }

    #[test]
    fn test_default_only_meta_skips_to_default() {
        let service = Service::builder()
            .with_field_meta(FieldMeta::new(path()).with_write_scope(ScopeKind::Default))
            .build()
            .unwrap();
        service.set(&path(), b"global").unwrap();

        let view = service.scoped(1, 5).unwrap();
        let value = view.get(ROUTE).unwrap();
        assert_eq!(value.as_str().unwrap(), "global");
        assert!(service.cache_for(&path()).entry(ScopeId::store(5)).is_none());
    }

    #[test]
    fn test_missing_value_uses_meta_default() {
        let service = Service::builder()
            .with_field_meta(FieldMeta::new(path()).with_default("alice"))
            .build()
            .unwrap();
        let view = service.scoped(2, 0).unwrap();
        assert_eq!(view.website(), ScopeId::website(2));
        assert_eq!(view.store(), DEFAULT_SCOPE);
        assert_eq!(view.get(ROUTE).unwrap().as_str().unwrap(), "alice");
    }

    #[test]
    fn test_missing_value_without_default() {
        let service = Service::new();
        let view = service.scoped(2, 3).unwrap();
        let value = view.get(ROUTE).unwrap();
        assert!(!value.is_found());
        assert_eq!(value.path().scope(), ScopeId::store(3));
        assert!(value.as_str().unwrap_err().is_not_found());
    }

    #[test]
    fn test_store_links_to_website_after_first_read() {
        let service = Service::new();
        service.set(&path().bind_website(1), b"site").unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        service
            .register_observer(
                EventKind::AfterGet,
                ROUTE,
                Arc::new(
                    move |_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(raw)
                    },
                ),
            )
            .unwrap();

        let view = service.scoped(1, 5).unwrap();
        view.get(ROUTE).unwrap();
        view.get(ROUTE).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // the store links to its website after the first read
        assert!(matches!(
            service.cache_for(&path()).entry(ScopeId::store(5)),
            Some(crate::resolver::Entry::Inherit(scope)) if scope == ScopeId::website(1)
        ));
    }
}
