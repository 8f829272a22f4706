// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for scoped reads and their fallback.

use scopecfg::prelude::*;
use scopecfg::resolver::{fallback_chain, ScopeCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

const USERNAME: &str = "carrier/dhl/username";

fn path(route: &str) -> Path {
    Path::new(route).unwrap()
}

#[test]
fn test_website_fallback_end_to_end() {
    let service = Service::builder()
        .with_cli_args(vec![
            "--carrier/dhl/username=global",
            "--websites/1/carrier/dhl/username=site_one",
        ])
        .build()
        .unwrap();

    let first = service.scoped(1, 10).unwrap();
    let second = service.scoped(2, 20).unwrap();
    assert_eq!(first.get(USERNAME).unwrap().as_str().unwrap(), "site_one");
    assert_eq!(second.get(USERNAME).unwrap().as_str().unwrap(), "global");

    let value = first.get(USERNAME).unwrap();
    assert_eq!(value.path().fq(), "websites/1/carrier/dhl/username");

    // a later website write reaches stores that already resolved
    service
        .set(&path(USERNAME).bind_website(2), b"site_two")
        .unwrap();
    assert_eq!(second.get(USERNAME).unwrap().as_str().unwrap(), "site_two");

    // and a store override hides it again
    service.set(&path(USERNAME).bind_store(20), b"store").unwrap();
    assert_eq!(second.get(USERNAME).unwrap().as_str().unwrap(), "store");
}

#[test]
fn test_get_at_starts_higher_up() {
    let service = Service::new();
    service.set(&path(USERNAME), b"global").unwrap();
    service.set(&path(USERNAME).bind_store(3), b"store").unwrap();

    let view = service.scoped(1, 3).unwrap();
    assert_eq!(view.get(USERNAME).unwrap().as_str().unwrap(), "store");
    let site = view.get_at(ScopeKind::Website, USERNAME).unwrap();
    assert_eq!(site.as_str().unwrap(), "global");
    assert_eq!(site.path().scope(), DEFAULT_SCOPE);
}

#[test]
fn test_default_only_route() {
    let route = path("general/locale/code");
    let service = Service::builder()
        .with_field_meta(
            FieldMeta::new(route.clone())
                .with_default("en_US")
                .with_write_scope(ScopeKind::Default),
        )
        .build()
        .unwrap();

    let view = service.scoped(4, 9).unwrap();
    assert_eq!(view.get("general/locale/code").unwrap().as_str().unwrap(), "en_US");

    assert!(service
        .set(&route.bind_website(4), b"de_DE")
        .unwrap_err()
        .is_not_allowed());
    service.set(&route, b"fr_FR").unwrap();
    assert_eq!(view.get("general/locale/code").unwrap().as_str().unwrap(), "fr_FR");
}

#[test]
fn test_meta_binds_a_single_route() {
    let service = Service::builder()
        .with_field_meta(
            FieldMeta::new(path("payment/card/secret")).with_write_scope(ScopeKind::Website),
        )
        .build()
        .unwrap();

    assert!(service
        .set(&path("payment/card/secret").bind_store(1), b"x")
        .unwrap_err()
        .is_not_allowed());
    // metas bind a whole route, not its siblings
    service
        .set(&path("payment/card/public").bind_store(1), b"x")
        .unwrap();
}

#[test]
fn test_invalid_scope_pairs() {
    let service = Service::new();
    assert!(service.scoped(0, 5).unwrap_err().is_not_valid());

    let default = service.scoped(0, 0).unwrap();
    assert_eq!(default.chain(), &[DEFAULT_SCOPE]);
    let website = service.scoped(3, 0).unwrap();
    assert_eq!(website.chain(), &[ScopeId::website(3), DEFAULT_SCOPE]);

    assert!(fallback_chain(ScopeId::store(1), ScopeId::store(2)).is_err());
}

#[test]
fn test_before_get_substitutes_scoped_lookup() {
    let service = Service::new();
    service.set(&path(USERNAME), b"stored").unwrap();
    service
        .register_observer(
            EventKind::BeforeGet,
            "stores/7/carrier/dhl/username",
            Arc::new(
                |_: &Path, _: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> {
                    Ok(Some(b"injected".to_vec()))
                },
            ),
        )
        .unwrap();

    let injected = service.scoped(1, 7).unwrap();
    assert_eq!(injected.get(USERNAME).unwrap().as_str().unwrap(), "injected");
    let plain = service.scoped(1, 8).unwrap();
    assert_eq!(plain.get(USERNAME).unwrap().as_str().unwrap(), "stored");
}

#[test]
fn test_scope_cache_single_flight() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let cache: Arc<ScopeCache<String>> =
        Arc::new(ScopeCache::with_loader(Box::new(move |scope: ScopeId| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            Ok((scope == DEFAULT_SCOPE).then(|| "root".to_string()))
        })));

    let start = Arc::new(Barrier::new(8));
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                cache.resolve(ScopeId::website(1), ScopeId::store(2))
            })
        })
        .collect();
    for reader in readers {
        assert_eq!(*reader.join().unwrap().unwrap(), "root");
    }

    // one load per scope of the chain, no matter how many readers
    assert_eq!(loads.load(Ordering::SeqCst), 3);
}

#[test]
fn test_expired_scoped_value_falls_back() {
    let service = Service::new();
    service.set(&path(USERNAME), b"global").unwrap();
    service
        .set(
            &path(USERNAME)
                .bind_website(1)
                .with_ttl(Duration::from_millis(200)),
            b"promo",
        )
        .unwrap();

    let view = service.scoped(1, 5).unwrap();
    assert_eq!(view.get(USERNAME).unwrap().as_str().unwrap(), "promo");

    thread::sleep(Duration::from_millis(300));
    assert!(!service.has(&path(USERNAME).bind_website(1)));
    assert_eq!(view.get(USERNAME).unwrap().as_str().unwrap(), "global");
}

#[test]
fn test_expired_level1_refill_is_not_served() {
    let service = Service::builder().with_level1_lru(1).build().unwrap();
    let short = path("aa/bb/short");
    service
        .set(&short.with_ttl(Duration::from_millis(200)), b"short")
        .unwrap();
    // evict from Level1, then refill it from Level2
    service.set(&path("aa/bb/other"), b"x").unwrap();
    assert_eq!(service.get(&short).unwrap().as_str().unwrap(), "short");

    thread::sleep(Duration::from_millis(300));
    assert!(!service.has(&short));
    assert!(service.storage().level2().get(&short).unwrap().is_none());
}
