// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters layer containing storage backends, sources and watchers.
//!
//! This module contains concrete implementations of the traits defined in the
//! ports layer: [`Storager`](crate::ports::Storager) backends that hold the
//! values, [`ConfigSource`](crate::ports::ConfigSource) adapters that seed them
//! and [`ConfigWatcher`](crate::ports::ConfigWatcher)s that trigger reloads.

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "env")]
pub mod env_var;
pub mod storage;
pub mod watchers;
#[cfg(feature = "yaml")]
pub mod yaml_file;

// Re-export adapters based on feature flags
#[cfg(feature = "cli")]
pub use cli::CommandLineAdapter;
#[cfg(feature = "env")]
pub use env_var::EnvVarAdapter;
pub use storage::{LayeredStorage, LruStorage, MapStorage, DEFAULT_LRU_CAPACITY};
#[cfg(feature = "redis")]
pub use storage::{RedisStorage, RedisStorageMode};
#[cfg(feature = "reload")]
pub use watchers::FileWatcher;
#[cfg(all(feature = "signal", unix))]
pub use watchers::SignalWatcher;
#[cfg(feature = "yaml")]
pub use yaml_file::{YamlFileAdapter, YamlParser};
