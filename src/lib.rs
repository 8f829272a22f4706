// SPDX-License-Identifier: MIT OR Apache-2.0

//! A scoped configuration path engine.
//!
//! Configuration values are addressed by a route such as
//! `carrier/dhl/username` bound to a scope: the global default, a website or
//! a store. Reads through a [`Scoped`](service::Scoped) view fall back from
//! store to website to default. Observers hooked into the read and write
//! pipelines can rewrite or veto values, and subscribers are told about
//! committed writes on a background thread.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain Layer**: scopes, routes, paths, values, field metas and errors
//! - **Ports**: the pluggable interfaces (`Storager`, `Observer`,
//!   `Subscriber`, `ConfigSource`, `ConfigWatcher`)
//! - **Trie**: the segmented prefix trie that stores hooks and metas
//! - **Resolver**: the per-scope fallback cache with single-flight loading
//! - **Adapters**: storage backends, configuration sources and watchers
//! - **Service**: the [`Service`](service::Service) that orchestrates everything
//!
//! # Feature Flags
//!
//! - `yaml`: Enable YAML file sources (default)
//! - `env`: Enable environment variable sources (default)
//! - `cli`: Enable command-line argument sources (default)
//! - `reload`: Enable hot reload on configuration file changes
//! - `signal`: Enable hot reload on `SIGHUP`
//! - `redis`: Enable the Redis storage backend
//! - `full`: Enable all features
//!
//! # Quick Start
//!
//! ```rust
//! use scopecfg::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let service = Service::builder()
//!     .with_level1_lru(1024)
//!     .with_field_meta(
//!         FieldMeta::new(Path::new("carrier/dhl/timeout")?)
//!             .with_default("30s")
//!             .with_write_scope(ScopeKind::Website),
//!     )
//!     .build()?;
//!
//! service.subscribe(
//!     "carrier/dhl",
//!     Arc::new(|path: &Path| -> Result<()> {
//!         println!("{} changed", path);
//!         Ok(())
//!     }),
//! )?;
//!
//! service.set(&Path::new("carrier/dhl/timeout")?.bind_website(1), b"45s")?;
//!
//! let store = service.scoped(1, 12)?;
//! assert_eq!(store.get("carrier/dhl/timeout")?.as_duration()?.as_secs(), 45);
//!
//! // writes below the declared permission are rejected
//! let err = service
//!     .set(&Path::new("carrier/dhl/timeout")?.bind_store(12), b"1s")
//!     .unwrap_err();
//! assert!(err.is_not_allowed());
//!
//! service.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod resolver;
pub mod service;
pub mod trie;

/// Commonly used types and traits.
///
/// This module re-exports the most commonly used types and traits for convenient access.
pub mod prelude {
    pub use crate::domain::{
        ConfigError, EventKind, FieldMeta, Getter, Path, Result, Route, ScopeId, ScopeKind,
        ScopedGetter, Value, DEFAULT_SCOPE,
    };
    pub use crate::ports::{
        ConfigParser, ConfigSource, ConfigWatcher, Observer, Storager, Subscriber,
    };
    pub use crate::service::{Scoped, Service, ServiceBuilder};

    pub use crate::adapters::{LayeredStorage, LruStorage, MapStorage};

    // Re-export adapters based on feature flags
    #[cfg(feature = "cli")]
    pub use crate::adapters::CommandLineAdapter;
    #[cfg(feature = "env")]
    pub use crate::adapters::EnvVarAdapter;
    #[cfg(feature = "reload")]
    pub use crate::adapters::FileWatcher;
    #[cfg(all(feature = "signal", unix))]
    pub use crate::adapters::SignalWatcher;
    #[cfg(feature = "yaml")]
    pub use crate::adapters::{YamlFileAdapter, YamlParser};
}
