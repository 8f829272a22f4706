// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field metadata supplied by configuration schemas.
//!
//! A [`FieldMeta`] declares the default raw value of a route and the most
//! specific scope that may write it. Schemas hand these to the service at
//! construction or through a channel.

use crate::domain::errors::{ConfigError, Result};
use crate::domain::path::Path;
use crate::domain::scope::ScopeKind;

/// Default value and write permission of a route.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::{FieldMeta, Path, ScopeKind};
///
/// let meta = FieldMeta::new(Path::new("carrier/dhl/timeout").unwrap())
///     .with_default("3600s")
///     .with_write_scope(ScopeKind::Default);
///
/// let store_write = Path::new("carrier/dhl/timeout").unwrap().bind_store(3);
/// assert!(meta.check_write(&store_write).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMeta {
    path: Path,
    default: Option<Vec<u8>>,
    write_scope: ScopeKind,
}

impl FieldMeta {
    /// Creates a meta record without default that may be written from any scope.
    pub fn new(path: Path) -> Self {
        FieldMeta {
            path,
            default: None,
            write_scope: ScopeKind::Store,
        }
    }

    /// Sets the default raw value.
    pub fn with_default(mut self, default: impl Into<Vec<u8>>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the most specific scope allowed to write the route.
    pub fn with_write_scope(mut self, kind: ScopeKind) -> Self {
        self.write_scope = kind;
        self
    }

    /// The path the meta is registered for. Its scope selects the trie key.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The default raw value.
    pub fn default_value(&self) -> Option<&[u8]> {
        self.default.as_deref()
    }

    /// The most specific scope allowed to write the route.
    pub fn write_scope(&self) -> ScopeKind {
        self.write_scope
    }

    /// Rejects writes more specific than the declared permission.
    pub fn check_write(&self, target: &Path) -> Result<()> {
        if target.scope().kind() > self.write_scope {
            return Err(ConfigError::NotAllowed {
                path: target.fq(),
                allowed: self.write_scope.name().to_string(),
            });
        }
        Ok(())
    }
}
