// SPDX-License-Identifier: MIT OR Apache-2.0

//! Watcher implementations for hot reload.
//!
//! This module contains implementations of the `ConfigWatcher` trait. A
//! watcher only signals that a reload is due; the service performs it.

#[cfg(feature = "reload")]
pub mod file_watcher;
#[cfg(all(feature = "signal", unix))]
pub mod signal_watcher;

#[cfg(feature = "reload")]
pub use file_watcher::FileWatcher;
#[cfg(all(feature = "signal", unix))]
pub use signal_watcher::{SignalWatcher, SIGNAL_KEY};
