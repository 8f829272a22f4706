// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service layer.
//!
//! This module contains the [`Service`] that orchestrates hooks, storage and
//! scope resolution, its builder, the observer pipeline, the pub/sub notifier
//! and the [`Scoped`] read views.

pub mod config_service;
pub mod notifier;
pub mod pipeline;
pub mod scoped;

// Re-export commonly used types
pub use config_service::{Service, ServiceBuilder};
pub use notifier::Notifier;
pub use scoped::Scoped;
