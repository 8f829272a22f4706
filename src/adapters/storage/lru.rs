// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded LRU storage, typically used as Level1 in front of a slower backend.

use crate::domain::{Path, Result};
use crate::ports::{Storager, StoredValue};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::SystemTime;

/// Default number of entries kept by [`LruStorage::default`].
pub const DEFAULT_LRU_CAPACITY: usize = 1024;

/// Least-recently-used bounded backend.
///
/// # Examples
///
/// ```rust
/// use scopecfg::adapters::LruStorage;
/// use scopecfg::domain::Path;
/// use scopecfg::ports::Storager;
///
/// let storage = LruStorage::new(1);
/// let a = Path::new("aa/bb/cc").unwrap();
/// let b = Path::new("aa/bb/dd").unwrap();
/// storage.set(&a, b"1").unwrap();
/// storage.set(&b, b"2").unwrap();
///
/// assert_eq!(storage.get(&a).unwrap(), None);
/// assert_eq!(storage.get(&b).unwrap(), Some(b"2".to_vec()));
/// ```
pub struct LruStorage {
    entries: Mutex<LruCache<String, StoredValue>>,
}

impl LruStorage {
    /// Creates a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        LruStorage {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl Default for LruStorage {
    fn default() -> Self {
        Self::new(DEFAULT_LRU_CAPACITY)
    }
}

impl std::fmt::Debug for LruStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("LruStorage")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}

impl Storager for LruStorage {
    fn name(&self) -> &str {
        "lru"
    }

    fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .put(path.fq(), StoredValue::new(path, value));
        Ok(())
    }

    fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.get_entry(path)?.map(|stored| stored.data))
    }

    fn get_entry(&self, path: &Path) -> Result<Option<StoredValue>> {
        let key = path.fq();
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            None => return Ok(None),
            Some(stored) if !stored.is_expired(SystemTime::now()) => {
                return Ok(Some(stored.clone()))
            }
            Some(_) => {}
        }
        entries.pop(&key);
        Ok(None)
    }

    fn flush(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}
