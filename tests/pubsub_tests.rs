// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for change notifications.

mod common;

use common::{init_tracing, wait_until};
use parking_lot::Mutex;
use scopecfg::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ROUTE: &str = "carrier/dhl/username";

fn path() -> Path {
    Path::new(ROUTE).unwrap()
}

fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<dyn Subscriber>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscriber: Arc<dyn Subscriber> = Arc::new(move |path: &Path| -> Result<()> {
        sink.lock().push(path.fq());
        Ok(())
    });
    (seen, subscriber)
}

#[test]
fn test_ancestors_are_notified() {
    init_tracing();
    let service = Service::new();
    let (group, group_sub) = recorder();
    let (exact, exact_sub) = recorder();
    service.subscribe("carrier", group_sub).unwrap();
    service.subscribe(ROUTE, exact_sub).unwrap();

    service.set(&path().bind_website(1), b"site").unwrap();

    assert!(wait_until(|| group.lock().len() == 1 && exact.lock().len() == 1));
    assert_eq!(group.lock()[0], "websites/1/carrier/dhl/username");
    assert_eq!(exact.lock()[0], "websites/1/carrier/dhl/username");
    service.close().unwrap();
}

#[test]
fn test_scoped_subscription_only_sees_its_scope() {
    let service = Service::new();
    let (seen, subscriber) = recorder();
    service
        .subscribe("stores/2/carrier/dhl/username", subscriber)
        .unwrap();

    service.set(&path(), b"global").unwrap();
    service.set(&path().bind_store(3), b"other").unwrap();
    service.set(&path().bind_store(2), b"mine").unwrap();

    // close joins every dispatch thread
    service.close().unwrap();
    assert_eq!(*seen.lock(), vec!["stores/2/carrier/dhl/username".to_string()]);
}

#[test]
fn test_partial_segment_does_not_match() {
    let service = Service::new();
    let (seen, subscriber) = recorder();
    service.subscribe("carrier/dh", subscriber).unwrap();

    service.set(&path(), b"alice").unwrap();
    service.close().unwrap();
    assert!(seen.lock().is_empty());
}

#[test]
fn test_panicking_subscriber_is_evicted() {
    init_tracing();
    let service = Service::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let bad = service
        .subscribe(
            "carrier/dhl",
            Arc::new(move |_: &Path| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("subscriber blew up");
            }),
        )
        .unwrap();
    let (seen, good) = recorder();
    service.subscribe("carrier/dhl", good).unwrap();
    assert_eq!(service.registry().subscriber_count(), 2);

    service.set(&path(), b"one").unwrap();
    assert!(wait_until(|| service.registry().subscriber_count() == 1));
    assert!(wait_until(|| seen.lock().len() == 1));

    service.set(&path(), b"two").unwrap();
    assert!(wait_until(|| seen.lock().len() == 2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(service.unsubscribe(bad).unwrap_err().is_not_found());
    service.close().unwrap();
}

#[test]
fn test_slow_panicking_subscriber_runs_once_across_overlapping_sets() {
    init_tracing();
    let service = Service::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    service
        .subscribe(
            ROUTE,
            Arc::new(move |_: &Path| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(100));
                panic!("slow subscriber blew up");
            }),
        )
        .unwrap();
    let (seen, good) = recorder();
    service.subscribe(ROUTE, good).unwrap();

    service.set(&path(), b"one").unwrap();
    thread::sleep(Duration::from_millis(20));
    service.set(&path(), b"two").unwrap();
    service.close().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(seen.lock().len(), 2);
    assert_eq!(service.registry().subscriber_count(), 1);
}

#[test]
fn test_failing_subscriber_is_evicted() {
    let service = Service::new();
    service
        .subscribe(
            ROUTE,
            Arc::new(|_: &Path| -> Result<()> { Err(ConfigError::fatal("unreachable")) }),
        )
        .unwrap();

    service.set(&path(), b"one").unwrap();
    service.close().unwrap();
    assert_eq!(service.registry().subscriber_count(), 0);
}

#[test]
fn test_close_waits_for_dispatch() {
    let service = Service::new();
    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    service
        .subscribe(
            ROUTE,
            Arc::new(move |_: &Path| -> Result<()> {
                thread::sleep(Duration::from_millis(100));
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

    service.set(&path(), b"slow").unwrap();
    service.close().unwrap();
    assert!(done.load(Ordering::SeqCst));
}

#[test]
fn test_closed_service_rejects_writes() {
    let service = Service::new();
    service.set(&path(), b"before").unwrap();
    service.close().unwrap();

    assert!(service.is_closed());
    assert!(service.close().unwrap_err().is_already_closed());
    assert!(service.set(&path(), b"after").unwrap_err().is_already_closed());
    assert!(service
        .subscribe(ROUTE, recorder().1)
        .unwrap_err()
        .is_already_closed());
    assert!(service
        .register_observer(
            EventKind::AfterGet,
            ROUTE,
            Arc::new(|_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> { Ok(raw) }),
        )
        .unwrap_err()
        .is_already_closed());
    assert!(service.reload().unwrap_err().is_already_closed());

    // reads keep working
    assert_eq!(service.get(&path()).unwrap().as_str().unwrap(), "before");
}

#[test]
fn test_unsubscribe_prunes_the_trie() {
    let service = Service::new();
    let (seen, subscriber) = recorder();
    let id = service.subscribe(ROUTE, subscriber).unwrap();
    assert!(service.registry().contains_node("/carrier/dhl/username"));

    service.unsubscribe(id).unwrap();
    assert!(!service.registry().contains_node("/carrier/dhl/username"));
    assert!(!service.registry().contains_node("/carrier"));

    service.set(&path(), b"nobody").unwrap();
    service.close().unwrap();
    assert!(seen.lock().is_empty());
}

#[test]
fn test_subscriber_may_read_the_service() {
    let service = Service::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let reader = service.clone();
    service
        .subscribe(
            ROUTE,
            Arc::new(move |path: &Path| -> Result<()> {
                let value = reader.get(path)?.as_string()?;
                sink.lock().push(value);
                Ok(())
            }),
        )
        .unwrap();

    service.set(&path(), b"fresh").unwrap();
    service.close().unwrap();
    assert_eq!(*seen.lock(), vec!["fresh".to_string()]);
}

#[test]
fn test_writes_from_many_threads_are_all_delivered() {
    let service = Service::new();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    service
        .subscribe(
            "carrier",
            Arc::new(move |_: &Path| -> Result<()> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

    let writers: Vec<_> = (1..=4u32)
        .map(|id| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    service.set(&path().bind_store(id), b"x").unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    service.close().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 40);
}
