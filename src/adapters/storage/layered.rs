// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two level storage.
//!
//! Level2 is authoritative. An optional Level1 cache sits in front of it.
//! Writes go to Level2 first and then Level1, serialized by one mutex, so a
//! thread always reads its own writes. A Level1 miss falls through to Level2
//! and populates Level1 under the same mutex, which keeps a concurrent write
//! from being shadowed by a stale refill. The refill carries the expiry
//! Level2 reports, so Level1 never outlives Level2.

use crate::domain::{Path, Result};
use crate::ports::{Storager, StoredValue};
use parking_lot::Mutex;
use std::fmt;
use tracing::debug;

/// Level1 + Level2 backend.
///
/// # Examples
///
/// ```rust
/// use scopecfg::adapters::{LayeredStorage, LruStorage, MapStorage};
/// use scopecfg::domain::Path;
/// use scopecfg::ports::Storager;
///
/// let storage = LayeredStorage::new(Box::new(MapStorage::new()))
///     .with_level1(Box::new(LruStorage::new(16)));
/// let path = Path::new("aa/bb/cc").unwrap();
/// storage.set(&path, b"v").unwrap();
/// assert_eq!(storage.get(&path).unwrap(), Some(b"v".to_vec()));
/// ```
pub struct LayeredStorage {
    level1: Option<Box<dyn Storager>>,
    level2: Box<dyn Storager>,
    write_lock: Mutex<()>,
}

impl LayeredStorage {
    /// Creates storage backed by `level2` alone.
    pub fn new(level2: Box<dyn Storager>) -> Self {
        LayeredStorage {
            level1: None,
            level2,
            write_lock: Mutex::new(()),
        }
    }

    /// Puts `level1` in front of Level2.
    pub fn with_level1(mut self, level1: Box<dyn Storager>) -> Self {
        self.level1 = Some(level1);
        self
    }

    /// The Level1 backend, if configured.
    pub fn level1(&self) -> Option<&dyn Storager> {
        self.level1.as_deref()
    }

    /// The Level2 backend.
    pub fn level2(&self) -> &dyn Storager {
        self.level2.as_ref()
    }
}

impl fmt::Debug for LayeredStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayeredStorage")
            .field("level1", &self.level1.as_ref().map(|s| s.name().to_string()))
            .field("level2", &self.level2.name())
            .finish()
    }
}

impl Storager for LayeredStorage {
    fn name(&self) -> &str {
        "layered"
    }

    fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.level2.set(path, value)?;
        if let Some(level1) = &self.level1 {
            level1.set(path, value)?;
        }
        Ok(())
    }

    fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.get_entry(path)?.map(|stored| stored.data))
    }

    fn get_entry(&self, path: &Path) -> Result<Option<StoredValue>> {
        let Some(level1) = &self.level1 else {
            return self.level2.get_entry(path);
        };
        if let Some(found) = level1.get_entry(path)? {
            debug!("Level1 hit for {}", path);
            return Ok(Some(found));
        }

        let _guard = self.write_lock.lock();
        let found = self.level2.get_entry(path)?;
        if let Some(stored) = &found {
            debug!("Level2 hit for {}, populating {}", path, level1.name());
            let refill = match stored.expires {
                Some(at) => path.with_expiry(at),
                None => path.clone(),
            };
            level1.set(&refill, &stored.data)?;
        }
        Ok(found)
    }

    fn flush(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        if let Some(level1) = &self.level1 {
            level1.flush()?;
        }
        self.level2.flush()
    }
}
