// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory map storage.
//!
//! The default Level2 backend. Entries are keyed by the fully qualified path
//! string and carry the path's advisory expiry, which is checked on read.

use crate::domain::{Path, Result};
use crate::ports::{Storager, StoredValue};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::SystemTime;
use tracing::debug;

/// Unbounded thread-safe map backend.
///
/// # Examples
///
/// ```rust
/// use scopecfg::adapters::MapStorage;
/// use scopecfg::domain::Path;
/// use scopecfg::ports::Storager;
///
/// let storage = MapStorage::new();
/// let path = Path::new("carrier/dhl/username").unwrap().bind_store(2);
/// storage.set(&path, b"alice").unwrap();
///
/// assert_eq!(storage.get(&path).unwrap(), Some(b"alice".to_vec()));
/// assert_eq!(storage.get(&path.bind_default()).unwrap(), None);
/// ```
#[derive(Debug, Default)]
pub struct MapStorage {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl MapStorage {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Storager for MapStorage {
    fn name(&self) -> &str {
        "map"
    }

    fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .insert(path.fq(), StoredValue::new(path, value));
        Ok(())
    }

    fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.get_entry(path)?.map(|stored| stored.data))
    }

    fn get_entry(&self, path: &Path) -> Result<Option<StoredValue>> {
        let key = path.fq();
        let now = SystemTime::now();
        {
            let entries = self.entries.read();
            match entries.get(&key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries.get(&key).is_some_and(|stored| stored.is_expired(now)) {
            debug!("Expired value for {} dropped from map storage", key);
            entries.remove(&key);
            return Ok(None);
        }
        Ok(entries.get(&key).cloned())
    }

    fn flush(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}
