// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain layer containing core types.
//!
//! This module contains the value objects of the engine (scopes, routes, paths,
//! values, field metas, event kinds), the error taxonomy and the consumer-facing
//! service traits. It has no knowledge of storage, hooks or concurrency.

pub mod errors;
pub mod event;
pub mod field_meta;
pub mod path;
pub mod scope;
pub mod service;
pub mod value;

// Re-export commonly used types
pub use errors::{ConfigError, Result};
pub use event::EventKind;
pub use field_meta::FieldMeta;
pub use path::{trie_key_for, Path, Route};
pub use scope::{ScopeId, ScopeKind, DEFAULT_SCOPE};
pub use service::{Getter, ScopedGetter};
pub use value::Value;
