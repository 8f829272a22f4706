// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ports layer containing trait definitions.
//!
//! This module contains the trait definitions (ports) that define the interfaces
//! for the pluggable parts of the engine: storage backends, hooks, configuration
//! sources, file parsers and reload watchers. These traits are implemented by
//! adapters in the adapters layer or by callers.

pub mod hooks;
pub mod parser;
pub mod source;
pub mod storage;
pub mod watcher;

// Re-export commonly used types
pub use hooks::{Observer, Subscriber};
pub use parser::ConfigParser;
pub use source::{parse_entries, ConfigSource, SourceEntry};
pub use storage::{Storager, StoredValue};
pub use watcher::{ChangeCallback, ConfigWatcher};
