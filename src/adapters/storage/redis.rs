// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis storage backend.
//!
//! Stores raw values in Redis, either as one string key per path under a
//! namespace prefix or as fields of a single hash. String keys honour the
//! path's advisory expiry with `SET ... PX`. Hash fields cannot expire
//! individually, so the hash mode ignores expiry.

use crate::domain::{ConfigError, Path, Result};
use crate::ports::{Storager, StoredValue};
use once_cell::sync::Lazy;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Shared runtime used to drive the async client from the synchronous storage API.
static STORAGE_RUNTIME: Lazy<std::io::Result<tokio::runtime::Runtime>> =
    Lazy::new(tokio::runtime::Runtime::new);

/// Storage mode for Redis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedisStorageMode {
    /// Store each path as a separate Redis key with a prefix.
    /// Example: `scopecfg:stores/2/carrier/dhl/username`
    StringKeys,
    /// Store all paths as fields of a single Redis hash.
    Hash,
}

fn storage_error(message: impl Into<String>, err: redis::RedisError) -> ConfigError {
    ConfigError::StorageError {
        storage: "redis".to_string(),
        message: message.into(),
        source: Some(Arc::new(err)),
    }
}

/// Runs a future on the shared runtime.
///
/// If called from inside a tokio runtime, the future is driven on a separate
/// thread so the caller's executor is not blocked re-entrantly.
fn block_on<T, F>(future: F) -> Result<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let run = move || match STORAGE_RUNTIME.as_ref() {
        Ok(runtime) => runtime.block_on(future),
        Err(e) => Err(ConfigError::StorageError {
            storage: "redis".to_string(),
            message: format!("Failed to create runtime for Redis storage: {}", e),
            source: None,
        }),
    };

    if tokio::runtime::Handle::try_current().is_ok() {
        std::thread::spawn(run)
            .join()
            .map_err(|_| ConfigError::StorageError {
                storage: "redis".to_string(),
                message: "Redis storage thread panicked".to_string(),
                source: None,
            })?
    } else {
        run()
    }
}

/// Level2 backend backed by Redis.
///
/// # Examples
///
/// ```rust,no_run
/// use scopecfg::adapters::{RedisStorage, RedisStorageMode};
/// use scopecfg::domain::Path;
/// use scopecfg::ports::Storager;
///
/// let storage = RedisStorage::new(
///     "redis://localhost:6379",
///     "scopecfg:",
///     RedisStorageMode::StringKeys,
/// ).unwrap();
/// storage.set(&Path::new("carrier/dhl/username").unwrap(), b"alice").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RedisStorage {
    client: Arc<Client>,
    namespace: String,
    storage_mode: RedisStorageMode,
}

impl RedisStorage {
    /// Validates namespace to prevent pattern injection in `SCAN`
    fn validate_namespace(namespace: &str) -> Result<()> {
        if namespace.contains(['*', '?', '[', ']', '\\']) {
            return Err(ConfigError::StorageError {
                storage: "redis".to_string(),
                message: "Namespace contains invalid characters (* ? [ ] \\)".to_string(),
                source: None,
            });
        }
        Ok(())
    }

    /// Creates a Redis backend and verifies the connection with `PING`.
    ///
    /// * `url` - Redis connection URL (e.g., `"redis://localhost:6379"`)
    /// * `namespace` - Key prefix (StringKeys mode) or hash key name (Hash mode)
    /// * `storage_mode` - Whether to use string keys or a hash
    pub fn new(url: &str, namespace: &str, storage_mode: RedisStorageMode) -> Result<Self> {
        Self::validate_namespace(namespace)?;

        let client = Client::open(url)
            .map_err(|e| storage_error(format!("Failed to create Redis client: {}", e), e))?;

        let storage = RedisStorage {
            client: Arc::new(client),
            namespace: namespace.to_string(),
            storage_mode,
        };

        let client = Arc::clone(&storage.client);
        block_on(async move {
            let mut conn = connect(&client).await?;
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map_err(|e| storage_error(format!("Redis PING failed: {}", e), e))?;
            Ok(())
        })?;

        debug!("Connected Redis storage at {} ({:?})", url, storage_mode);
        Ok(storage)
    }

    /// The namespace (key prefix or hash name).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key_for(&self, path: &Path) -> String {
        match self.storage_mode {
            RedisStorageMode::StringKeys => format!("{}{}", self.namespace, path.fq()),
            RedisStorageMode::Hash => path.fq(),
        }
    }
}

async fn connect(client: &Client) -> Result<MultiplexedConnection> {
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| storage_error(format!("Failed to connect to Redis: {}", e), e))
}

impl Storager for RedisStorage {
    fn name(&self) -> &str {
        "redis"
    }

    fn set(&self, path: &Path, value: &[u8]) -> Result<()> {
        let client = Arc::clone(&self.client);
        let namespace = self.namespace.clone();
        let mode = self.storage_mode;
        let key = self.key_for(path);
        let value = value.to_vec();
        let ttl_ms = path.expires().map(|at| {
            at.duration_since(SystemTime::now())
                .map(|d| d.as_millis().max(1) as u64)
                .unwrap_or(1)
        });

        block_on(async move {
            let mut conn = connect(&client).await?;
            match mode {
                RedisStorageMode::StringKeys => {
                    let mut cmd = redis::cmd("SET");
                    cmd.arg(&key).arg(value);
                    if let Some(ms) = ttl_ms {
                        cmd.arg("PX").arg(ms);
                    }
                    cmd.query_async::<_, ()>(&mut conn)
                        .await
                        .map_err(|e| storage_error(format!("Failed to SET {}: {}", key, e), e))
                }
                RedisStorageMode::Hash => conn
                    .hset::<_, _, _, ()>(&namespace, &key, value)
                    .await
                    .map_err(|e| storage_error(format!("Failed to HSET {}: {}", key, e), e)),
            }
        })
    }

    fn get(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let client = Arc::clone(&self.client);
        let namespace = self.namespace.clone();
        let mode = self.storage_mode;
        let key = self.key_for(path);

        block_on(async move {
            let mut conn = connect(&client).await?;
            match mode {
                RedisStorageMode::StringKeys => conn
                    .get::<_, Option<Vec<u8>>>(&key)
                    .await
                    .map_err(|e| storage_error(format!("Failed to GET {}: {}", key, e), e)),
                RedisStorageMode::Hash => conn
                    .hget::<_, _, Option<Vec<u8>>>(&namespace, &key)
                    .await
                    .map_err(|e| storage_error(format!("Failed to HGET {}: {}", key, e), e)),
            }
        })
    }

    fn get_entry(&self, path: &Path) -> Result<Option<StoredValue>> {
        if self.storage_mode == RedisStorageMode::Hash {
            return Ok(self.get(path)?.map(|data| StoredValue {
                data,
                expires: None,
            }));
        }

        let client = Arc::clone(&self.client);
        let key = self.key_for(path);
        let (data, pttl) = block_on(async move {
            let mut conn = connect(&client).await?;
            redis::pipe()
                .cmd("GET")
                .arg(&key)
                .cmd("PTTL")
                .arg(&key)
                .query_async::<_, (Option<Vec<u8>>, i64)>(&mut conn)
                .await
                .map_err(|e| storage_error(format!("Failed to GET {}: {}", key, e), e))
        })?;

        // PTTL is -1 without expiry and -2 once the key is gone
        let expires = u64::try_from(pttl)
            .ok()
            .map(|ms| SystemTime::now() + Duration::from_millis(ms));
        Ok(data.map(|data| StoredValue { data, expires }))
    }

    fn flush(&self) -> Result<()> {
        let client = Arc::clone(&self.client);
        let namespace = self.namespace.clone();
        let mode = self.storage_mode;

        block_on(async move {
            let mut conn = connect(&client).await?;
            match mode {
                RedisStorageMode::Hash => conn
                    .del::<_, ()>(&namespace)
                    .await
                    .map_err(|e| storage_error(format!("Failed to DEL {}: {}", namespace, e), e)),
                RedisStorageMode::StringKeys => {
                    // Use SCAN instead of KEYS to avoid blocking the Redis server
                    let pattern = format!("{}*", namespace);
                    let mut cursor: u64 = 0;
                    loop {
                        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(&pattern)
                            .arg("COUNT")
                            .arg(100)
                            .query_async(&mut conn)
                            .await
                            .map_err(|e| {
                                storage_error(format!("Failed to scan keys from Redis: {}", e), e)
                            })?;
                        if !keys.is_empty() {
                            conn.del::<_, ()>(keys).await.map_err(|e| {
                                storage_error(format!("Failed to delete keys: {}", e), e)
                            })?;
                        }
                        cursor = next;
                        if cursor == 0 {
                            break;
                        }
                    }
                    Ok(())
                }
            }
        })
    }
}
