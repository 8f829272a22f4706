// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backends implementing [`Storager`](crate::ports::Storager).

pub mod layered;
pub mod lru;
pub mod map;
#[cfg(feature = "redis")]
pub mod redis;

pub use self::layered::LayeredStorage;
pub use self::lru::{LruStorage, DEFAULT_LRU_CAPACITY};
pub use self::map::MapStorage;
#[cfg(feature = "redis")]
pub use self::redis::{RedisStorage, RedisStorageMode};
