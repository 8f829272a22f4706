// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumer-facing service traits.
//!
//! Middleware and generated schema packages only ever see these two traits.
//! [`Getter`] reads a single fully bound [`Path`]; [`ScopedGetter`] is a view
//! bound to one website/store pair that walks the scope fallback chain.

use crate::domain::{Path, Result, ScopeId, ScopeKind, Value};

/// Reads configuration values for fully bound paths.
///
/// # Examples
///
/// ```rust
/// use scopecfg::domain::{Getter, Path, Result, Value};
///
/// struct Fixed;
///
/// impl Getter for Fixed {
///     fn get(&self, path: &Path) -> Result<Value> {
///         Ok(Value::new(path.clone(), "fixed"))
///     }
/// }
///
/// let value = Fixed.get(&Path::new("aa/bb/cc").unwrap()).unwrap();
/// assert_eq!(value.as_str().unwrap(), "fixed");
/// ```
pub trait Getter: Send + Sync {
    /// Retrieves the value stored at exactly `path`.
    ///
    /// A missing value is not an error: the returned [`Value`] reports
    /// `is_found() == false` and its accessors fail with `NotFound`.
    fn get(&self, path: &Path) -> Result<Value>;

    /// Returns the value as a string or `default` if it is absent or unreadable.
    fn get_or_default(&self, path: &Path, default: &str) -> String {
        self.get(path)
            .and_then(|v| v.as_string())
            .unwrap_or_else(|_| default.to_string())
    }

    /// Returns true if a value or default exists at `path`.
    fn has(&self, path: &Path) -> bool {
        self.get(path).map(|v| v.is_found()).unwrap_or(false)
    }
}

/// A read view bound to a website/store pair.
pub trait ScopedGetter: Send + Sync {
    /// The website the view is bound to.
    fn website(&self) -> ScopeId;

    /// The store the view is bound to. The default scope if the view is
    /// website-only.
    fn store(&self) -> ScopeId;

    /// Resolves `route` starting at the most specific bound scope and falling
    /// back to website and default.
    fn get(&self, route: &str) -> Result<Value>;

    /// Resolves `route` starting at the scope level `start`.
    fn get_at(&self, start: ScopeKind, route: &str) -> Result<Value>;
}
