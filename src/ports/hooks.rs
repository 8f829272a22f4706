// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hook trait definitions.
//!
//! Observers sit inside the read and write pipelines and may rewrite or veto
//! the raw value. Subscribers are told after the fact that a path changed.
//! Both are registered against a route prefix and fire for every path below it.

use crate::domain::{Path, Result};

/// A synchronous hook in the get/set pipeline.
///
/// `raw` is `None` when no value is present (a `BeforeGet` before storage was
/// consulted, or a miss). Returning `Ok(None)` marks the value as absent for
/// the rest of the pipeline. Returning an error aborts the operation.
///
/// Closures of the matching shape implement the trait.
///
/// # Examples
///
/// ```rust
/// use scopecfg::ports::Observer;
/// use scopecfg::domain::{Path, Result};
///
/// let upper = |_: &Path, raw: Option<Vec<u8>>| -> Result<Option<Vec<u8>>> {
///     Ok(raw.map(|b| b.to_ascii_uppercase()))
/// };
///
/// let path = Path::new("aa/bb/cc").unwrap();
/// let out = upper.observe(&path, Some(b"abc".to_vec())).unwrap();
/// assert_eq!(out, Some(b"ABC".to_vec()));
/// ```
pub trait Observer: Send + Sync {
    /// Inspects or transforms the raw value for `path`.
    fn observe(&self, path: &Path, raw: Option<Vec<u8>>) -> Result<Option<Vec<u8>>>;
}

impl<F> Observer for F
where
    F: Fn(&Path, Option<Vec<u8>>) -> Result<Option<Vec<u8>>> + Send + Sync,
{
    fn observe(&self, path: &Path, raw: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        self(path, raw)
    }
}

/// Receives change notifications after a committed write.
///
/// Subscribers run on a dispatch thread, never on the writer's thread. A
/// subscriber that returns an error or panics is removed.
pub trait Subscriber: Send + Sync {
    /// Called with the path that was written.
    fn message_config(&self, path: &Path) -> Result<()>;
}

impl<F> Subscriber for F
where
    F: Fn(&Path) -> Result<()> + Send + Sync,
{
    fn message_config(&self, path: &Path) -> Result<()> {
        self(path)
    }
}
