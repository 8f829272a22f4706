// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backend trait definition.
//!
//! The engine never decides how bytes are persisted. Every backend, from the
//! in-memory map to an external cache, implements [`Storager`]. The service
//! places an optional fast Level1 backend in front of an authoritative Level2.

use crate::domain::{Path, Result};
use std::sync::Arc;
use std::time::SystemTime;

/// A stored value together with the expiry it was written with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredValue {
    /// The raw bytes.
    pub data: Vec<u8>,
    /// When the value stops being served, if ever.
    pub expires: Option<SystemTime>,
}

impl StoredValue {
    /// Captures `data` with the expiry of `path`.
    pub fn new(path: &Path, data: &[u8]) -> Self {
        StoredValue {
            data: data.to_vec(),
            expires: path.expires(),
        }
    }

    /// Returns true if the expiry lies at or before `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }
}

/// A key-value backend addressed by [`Path`].
///
/// Backends decide how to encode the path (fully qualified string, hash,
/// binary form). They should honour [`Path::expires`] when they can.
///
/// # Examples
///
/// ```rust
/// use scopecfg::ports::Storager;
/// use scopecfg::domain::{Path, Result};
///
/// struct Discard;
///
/// impl Storager for Discard {
///     fn name(&self) -> &str {
///         "discard"
///     }
///
///     fn set(&self, _path: &Path, _value: &[u8]) -> Result<()> {
///         Ok(())
///     }
///
///     fn get(&self, _path: &Path) -> Result<Option<Vec<u8>>> {
///         Ok(None)
///     }
///
///     fn flush(&self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait Storager: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Stores `value` at `path`, replacing any previous value.
    fn set(&self, path: &Path, value: &[u8]) -> Result<()>;

    /// Returns the value at exactly `path`, or `None`.
    fn get(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Like [`Storager::get`], also returning the expiry the value was stored
    /// with. Backends that do not track expiry report `None`.
    fn get_entry(&self, path: &Path) -> Result<Option<StoredValue>> {
        Ok(self.get(path)?.map(|data| StoredValue {
            data,
            expires: None,
        }))
    }

    /// Drops every cached or stored entry the backend owns.
    fn flush(&self) -> Result<()>;
}

impl<S: Storager + ?Sized> Storager for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        (**self).set(path, value)
    }

    fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        (**self).get(path)
    }

    fn get_entry(&self, path: &Path) -> Result<Option<StoredValue>> {
        (**self).get_entry(path)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: Storager + ?Sized> Storager for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        (**self).set(path, value)
    }

    fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        (**self).get(path)
    }

    fn get_entry(&self, path: &Path) -> Result<Option<StoredValue>> {
        (**self).get_entry(path)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}
