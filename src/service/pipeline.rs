// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observer pipeline.
//!
//! Observers registered on any ancestor of a path's trie key run in
//! registration order on the caller's thread. Each one receives the output of
//! the previous one. The first error stops the pipeline and is returned
//! wrapped with the path and the event kind.

use crate::domain::{ConfigError, EventKind, Path, Result};
use crate::trie::HookRegistry;
use tracing::debug;

/// Runs the `kind` observers for `path` over `raw`.
///
/// # Examples
///
/// ```rust
/// use scopecfg::domain::{EventKind, Path, Result};
/// use scopecfg::service::pipeline::run;
/// use scopecfg::trie::HookRegistry;
/// use std::sync::Arc;
///
/// let registry = HookRegistry::new();
/// registry.put_event(
///     EventKind::AfterGet,
///     "/aa/bb",
///     Arc::new(|_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> {
///         Ok(raw.map(|mut b| { b.push(b'!'); b }))
///     }),
/// );
///
/// let path = Path::new("aa/bb/cc").unwrap();
/// let out = run(&registry, EventKind::AfterGet, &path, Some(b"hi".to_vec())).unwrap();
/// assert_eq!(out, Some(b"hi!".to_vec()));
/// ```
pub fn run(
    registry: &HookRegistry,
    kind: EventKind,
    path: &Path,
    raw: Option<Vec<u8>>,
) -> Result<Option<Vec<u8>>> {
    let observers = registry.observers(kind, &path.trie_key());
    if observers.is_empty() {
        return Ok(raw);
    }

    debug!("Running {} {} observers for {}", observers.len(), kind, path);

    let mut current = raw;
    for observer in observers {
        current = observer
            .observe(path, current)
            .map_err(|source| ConfigError::ObserverError {
                path: path.fq(),
                event: kind.name().to_string(),
                source: Box::new(source),
            })?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Observer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn appender(tag: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn Observer> {
        Arc::new(
            move |_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> {
                log.lock().unwrap().push(tag);
                let mut data = raw.unwrap_or_default();
                data.extend_from_slice(tag.as_bytes());
                Ok(Some(data))
            },
        )
    }

    #[test]
    fn test_no_observers_passes_through() {
        let registry = HookRegistry::new();
        let path = Path::new("aa/bb/cc").unwrap();
        let out = run(&registry, EventKind::BeforeSet, &path, Some(b"x".to_vec())).unwrap();
        assert_eq!(out, Some(b"x".to_vec()));
    }

    #[test]
    fn test_order_is_root_to_leaf_then_insertion() {
        let registry = HookRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.put_event(EventKind::AfterGet, "/aa/bb/cc", appender("c", log.clone()));
        registry.put_event(EventKind::AfterGet, "/aa", appender("a1", log.clone()));
        registry.put_event(EventKind::AfterGet, "/aa", appender("a2", log.clone()));
        registry.put_event(EventKind::BeforeGet, "/aa", appender("skip", log.clone()));

        let path = Path::new("aa/bb/cc").unwrap();
        let out = run(&registry, EventKind::AfterGet, &path, None).unwrap();

        assert_eq!(out, Some(b"a1a2c".to_vec()));
        assert_eq!(*log.lock().unwrap(), vec!["a1", "a2", "c"]);
    }

    #[test]
    fn test_scoped_path_sees_default_observers() {
        let registry = HookRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.put_event(EventKind::AfterGet, "/aa/bb/cc", appender("d", log.clone()));

        let path = Path::new("aa/bb/cc").unwrap().bind_store(4);
        let out = run(&registry, EventKind::AfterGet, &path, None).unwrap();
        assert_eq!(out, Some(b"d".to_vec()));
    }

    #[test]
    fn test_first_error_aborts() {
        let registry = HookRegistry::new();
        let later = Arc::new(AtomicUsize::new(0));
        let later_clone = Arc::clone(&later);

        registry.put_event(
            EventKind::BeforeSet,
            "/aa",
            Arc::new(|_: &Path, _: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> {
                Err(ConfigError::not_valid("rejected"))
            }),
        );
        registry.put_event(
            EventKind::BeforeSet,
            "/aa/bb",
            Arc::new(
                move |_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> {
                    later_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(raw)
                },
            ),
        );

        let path = Path::new("aa/bb/cc").unwrap().bind_website(2);
        let err = run(&registry, EventKind::BeforeSet, &path, Some(vec![1])).unwrap_err();

        match err {
            ConfigError::ObserverError {
                path,
                event,
                source,
            } => {
                assert_eq!(path, "websites/2/aa/bb/cc");
                assert_eq!(event, "before_set");
                assert!(source.is_not_valid());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }
}
