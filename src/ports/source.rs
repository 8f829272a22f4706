// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration source trait definition.
//!
//! A `ConfigSource` produces a batch of `(Path, bytes)` entries that the
//! service writes through its regular `set` pipeline at startup and on every
//! reload. Environment variables, YAML files and command-line arguments are
//! all sources.

use crate::domain::{ConfigError, Path, Result};

/// A single value supplied by a source.
pub type SourceEntry = (Path, Vec<u8>);

/// A trait for configuration sources.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow for use in multi-threaded contexts.
///
/// # Priority
///
/// Each source has a priority value (0-255) that determines the order in which
/// sources are applied. Sources are applied lowest priority first, so entries of
/// higher priority sources overwrite lower ones. The typical priority values are:
///
/// - **3 (highest)**: Command-line arguments
/// - **2**: Environment variables
/// - **1 (lowest)**: Configuration files
///
/// # Examples
///
/// ```rust
/// use scopecfg::ports::{ConfigSource, SourceEntry};
/// use scopecfg::domain::{Path, Result};
///
/// struct MySource;
///
/// impl ConfigSource for MySource {
///     fn name(&self) -> &str {
///         "my-source"
///     }
///
///     fn priority(&self) -> u8 {
///         1
///     }
///
///     fn entries(&self) -> Result<Vec<SourceEntry>> {
///         Ok(vec![(Path::new("aa/bb/cc")?, b"value".to_vec())])
///     }
///
///     fn reload(&mut self) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// assert_eq!(MySource.entries().unwrap().len(), 1);
/// ```
pub trait ConfigSource: Send + Sync {
    /// Returns the name of this configuration source.
    ///
    /// This name is used for logging, error messages, and debugging. It should be
    /// a short, descriptive identifier like "env", "yaml-file", "cli".
    fn name(&self) -> &str;

    /// Returns the priority of this configuration source.
    ///
    /// Higher values are applied later and therefore win.
    fn priority(&self) -> u8;

    /// Returns every entry currently provided by the source.
    fn entries(&self) -> Result<Vec<SourceEntry>>;

    /// Reloads the configuration from the underlying medium.
    ///
    /// For sources that cannot change at runtime (like command-line arguments),
    /// this can be a no-op that returns `Ok(())`.
    fn reload(&mut self) -> Result<()>;
}

/// Converts string keyed values into source entries.
///
/// Keys are parsed with [`Path::parse`], so both bare routes and fully qualified
/// paths are accepted. The first invalid key fails the whole batch.
pub fn parse_entries<'a, I>(source_name: &str, values: I) -> Result<Vec<SourceEntry>>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut entries = Vec::new();
    for (key, value) in values {
        let path = Path::parse(key).map_err(|e| ConfigError::SourceError {
            source_name: source_name.to_string(),
            message: format!("invalid configuration path '{}': {}", key, e),
            source: Some(std::sync::Arc::new(e)),
        })?;
        path.validate()?;
        entries.push((path, value.as_bytes().to_vec()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScopeId;
    use std::collections::HashMap;

    struct TestSource {
        values: HashMap<String, String>,
        reloads: usize,
    }

    impl ConfigSource for TestSource {
        fn name(&self) -> &str {
            "test"
        }

        fn priority(&self) -> u8 {
            1
        }

        fn entries(&self) -> Result<Vec<SourceEntry>> {
            parse_entries(self.name(), &self.values)
        }

        fn reload(&mut self) -> Result<()> {
            self.reloads += 1;
            Ok(())
        }
    }

    #[test]
    fn test_source_entries() {
        let mut values = HashMap::new();
        values.insert("aa/bb/cc".to_string(), "one".to_string());
        values.insert("stores/2/aa/bb/cc".to_string(), "two".to_string());
        let source = TestSource { values, reloads: 0 };

        let mut entries = source.entries().unwrap();
        entries.sort_by_key(|(p, _)| p.fq());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.scope(), ScopeId::default());
        assert_eq!(entries[1].0.scope(), ScopeId::store(2));
        assert_eq!(entries[1].1, b"two".to_vec());
    }

    #[test]
    fn test_source_invalid_key() {
        let mut values = HashMap::new();
        values.insert("aa/bb".to_string(), "one".to_string());
        let source = TestSource { values, reloads: 0 };
        let err = source.entries().unwrap_err();
        assert!(matches!(err, ConfigError::SourceError { .. }));
    }

    #[test]
    fn test_source_reload() {
        let mut source = TestSource {
            values: HashMap::new(),
            reloads: 0,
        };
        source.reload().unwrap();
        assert_eq!(source.reloads, 1);
    }

    #[test]
    fn test_source_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Box<dyn ConfigSource>>();
    }
}
