// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment variable configuration source adapter.
//!
//! This module provides an adapter that reads configuration values from
//! environment variables carrying a common prefix.

use crate::domain::{Path, Result};
use crate::ports::{ConfigSource, SourceEntry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::env;
use tracing::{debug, warn};

/// Maximum length for environment variable keys (prevents DoS)
const MAX_ENV_KEY_LEN: usize = 512;

/// Maximum length for environment variable values (prevents DoS)
const MAX_ENV_VALUE_LEN: usize = 1048576; // 1MB

/// Prefix used by [`EnvVarAdapter::new`].
pub const DEFAULT_ENV_PREFIX: &str = "SCOPECFG_";

/// Separator between path segments in variable names.
pub const SEGMENT_SEPARATOR: &str = "__";

/// Configuration source adapter for environment variables.
///
/// Only variables starting with the prefix are read. After stripping the
/// prefix, the name is split at `__` into path segments and lowercased, so
/// `SCOPECFG_WEBSITES__2__CARRIER__DHL__USERNAME` becomes the path
/// `websites/2/carrier/dhl/username`. Single underscores stay inside a
/// segment. Variables that do not form a valid path are skipped.
///
/// # Priority
///
/// Environment variables have a priority of 2, which means they override configuration
/// files (priority 1) but are overridden by command-line arguments (priority 3).
///
/// # Examples
///
/// ```rust
/// use scopecfg::adapters::EnvVarAdapter;
/// use scopecfg::ports::ConfigSource;
///
/// let adapter = EnvVarAdapter::with_prefix("MYAPP_");
/// assert_eq!(adapter.priority(), 2);
/// ```
#[derive(Debug)]
pub struct EnvVarAdapter {
    /// Prefix that selects the variables to read
    prefix: String,
    /// Cached variables, keyed by path string
    cache: RwLock<Option<HashMap<String, String>>>,
}

impl EnvVarAdapter {
    /// Creates an adapter reading `SCOPECFG_` variables.
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Creates an adapter reading variables with the given prefix.
    ///
    /// The prefix is stripped from the name before it is turned into a path.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            cache: RwLock::new(None),
        }
    }

    /// Creates an adapter with pre-populated path keyed values for testing.
    ///
    /// **Note**: This method is primarily intended for testing. The keys are
    /// path strings, not variable names.
    ///
    /// ```rust
    /// use scopecfg::adapters::EnvVarAdapter;
    /// use scopecfg::ports::ConfigSource;
    /// use std::collections::HashMap;
    ///
    /// let mut values = HashMap::new();
    /// values.insert("carrier/dhl/username".to_string(), "alice".to_string());
    ///
    /// let adapter = EnvVarAdapter::with_values(values);
    /// assert_eq!(adapter.entries().unwrap().len(), 1);
    /// ```
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self {
            prefix: DEFAULT_ENV_PREFIX.to_string(),
            cache: RwLock::new(Some(values)),
        }
    }

    /// The prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Converts a variable name without prefix into a path string.
    pub fn key_to_path(name: &str) -> String {
        name.split(SEGMENT_SEPARATOR)
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Loads matching environment variables into a new HashMap.
    fn load(&self) -> HashMap<String, String> {
        let mut cache = HashMap::new();

        for (key, value) in env::vars() {
            // Validate input sizes to prevent DoS
            if key.len() > MAX_ENV_KEY_LEN || value.len() > MAX_ENV_VALUE_LEN {
                debug!(
                    "Skipping oversized environment variable: key_len={}, value_len={} (max key={}, max value={})",
                    key.len(),
                    value.len(),
                    MAX_ENV_KEY_LEN,
                    MAX_ENV_VALUE_LEN
                );
                continue;
            }

            let Some(stripped) = key.strip_prefix(&self.prefix) else {
                continue;
            };
            cache.insert(Self::key_to_path(stripped), value);
        }

        debug!(
            "Loaded {} environment variables (prefix={})",
            cache.len(),
            self.prefix
        );

        cache
    }

    /// Gets the cache, loading it if necessary.
    fn get_cache(&self) -> HashMap<String, String> {
        if let Some(cache) = self.cache.read().as_ref() {
            return cache.clone();
        }

        let new_cache = self.load();
        *self.cache.write() = Some(new_cache.clone());
        new_cache
    }
}

impl Default for EnvVarAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for EnvVarAdapter {
    fn name(&self) -> &str {
        "env"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn entries(&self) -> Result<Vec<SourceEntry>> {
        let cache = self.get_cache();
        let mut entries = Vec::with_capacity(cache.len());
        for (key, value) in &cache {
            match Path::parse(key).and_then(|p| p.validate().map(|_| p)) {
                Ok(path) => entries.push((path, value.as_bytes().to_vec())),
                Err(e) => warn!("Skipping environment variable for '{}': {}", key, e),
            }
        }
        Ok(entries)
    }

    fn reload(&mut self) -> Result<()> {
        // Clear cache to force reload on next access
        *self.cache.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScopeId;
    use std::env;

    // Helper to set and clean up environment variables
    struct EnvGuard {
        keys: Vec<String>,
    }

    impl EnvGuard {
        fn new() -> Self {
            EnvGuard { keys: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            env::set_var(key, value);
            self.keys.push(key.to_string());
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for key in &self.keys {
                env::remove_var(key);
            }
        }
    }

    fn find<'a>(entries: &'a [SourceEntry], fq: &str) -> Option<&'a [u8]> {
        entries
            .iter()
            .find(|(p, _)| p.fq() == fq)
            .map(|(_, v)| v.as_slice())
    }

    #[test]
    fn test_env_adapter_name_and_priority() {
        let adapter = EnvVarAdapter::new();
        assert_eq!(adapter.name(), "env");
        assert_eq!(adapter.priority(), 2);
        assert_eq!(adapter.prefix(), DEFAULT_ENV_PREFIX);
    }

    #[test]
    fn test_key_to_path() {
        assert_eq!(
            EnvVarAdapter::key_to_path("WEBSITES__2__CARRIER__DHL__USER_NAME"),
            "websites/2/carrier/dhl/user_name"
        );
    }

    #[test]
    fn test_env_adapter_scoped_entry() {
        let mut guard = EnvGuard::new();
        guard.set("ENVTEST_A_WEBSITES__2__CARRIER__DHL__USERNAME", "bob");
        guard.set("ENVTEST_A_CARRIER__DHL__USERNAME", "alice");

        let adapter = EnvVarAdapter::with_prefix("ENVTEST_A_");
        let entries = adapter.entries().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(
            find(&entries, "websites/2/carrier/dhl/username"),
            Some(&b"bob"[..])
        );
        let default = entries
            .iter()
            .find(|(p, _)| p.scope() == ScopeId::default())
            .unwrap();
        assert_eq!(default.1, b"alice".to_vec());
    }

    #[test]
    fn test_env_adapter_skips_invalid_paths() {
        let mut guard = EnvGuard::new();
        guard.set("ENVTEST_B_SHORT", "x");
        guard.set("ENVTEST_B_AA__BB__CC", "ok");

        let adapter = EnvVarAdapter::with_prefix("ENVTEST_B_");
        let entries = adapter.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(find(&entries, "default/0/aa/bb/cc"), Some(&b"ok"[..]));
    }

    #[test]
    fn test_env_adapter_ignores_other_prefixes() {
        let mut guard = EnvGuard::new();
        guard.set("ENVTEST_OTHER_AA__BB__CC", "nope");

        let adapter = EnvVarAdapter::with_prefix("ENVTEST_C_");
        assert!(adapter.entries().unwrap().is_empty());
    }

    #[test]
    fn test_env_adapter_reload() {
        let mut guard = EnvGuard::new();
        guard.set("ENVTEST_D_AA__BB__CC", "initial");

        let mut adapter = EnvVarAdapter::with_prefix("ENVTEST_D_");
        let entries = adapter.entries().unwrap();
        assert_eq!(find(&entries, "default/0/aa/bb/cc"), Some(&b"initial"[..]));

        guard.set("ENVTEST_D_AA__BB__CC", "updated");
        // cached until reload
        let entries = adapter.entries().unwrap();
        assert_eq!(find(&entries, "default/0/aa/bb/cc"), Some(&b"initial"[..]));

        adapter.reload().unwrap();
        let entries = adapter.entries().unwrap();
        assert_eq!(find(&entries, "default/0/aa/bb/cc"), Some(&b"updated"[..]));
    }
}
