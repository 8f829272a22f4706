// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration watcher trait definition.
//!
//! A `ConfigWatcher` monitors something outside the process (a file, an OS
//! signal) and invokes a callback when the configuration should be reloaded.
//! The service registers a callback that re-runs its sources.

use crate::domain::Result;
use std::sync::Arc;

/// Type alias for reload notification callbacks.
///
/// The callback receives a short description of what triggered it, for
/// example the path of a changed file or the name of a signal.
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A trait for watching external triggers that require a reload.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow for use in multi-threaded contexts.
///
/// # Examples
///
/// ```rust
/// use scopecfg::ports::{ChangeCallback, ConfigWatcher};
/// use scopecfg::domain::Result;
///
/// struct MyWatcher;
///
/// impl ConfigWatcher for MyWatcher {
///     fn watch(&mut self, callback: ChangeCallback) -> Result<()> {
///         callback("startup");
///         Ok(())
///     }
///
///     fn stop(&mut self) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait ConfigWatcher: Send + Sync {
    /// Starts watching.
    ///
    /// When a trigger is detected, `callback` is invoked with a description of
    /// the trigger. The callback may block for the duration of a reload.
    fn watch(&mut self, callback: ChangeCallback) -> Result<()>;

    /// Stops watching and releases any background resources.
    ///
    /// After this returns no more callbacks are delivered.
    fn stop(&mut self) -> Result<()>;
}
