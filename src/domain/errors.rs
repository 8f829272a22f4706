// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the configuration engine.
//!
//! Every fallible operation in the crate returns [`ConfigError`]. The variants
//! mirror the failure classes of the engine: malformed input, unsupported scope
//! tokens, permission violations, operations after shutdown and the ambient
//! failures of sources, storage backends and watchers.
//!
//! Errors are `Clone` so that a single failed load can be handed to every caller
//! that waited on it.

use std::num::{ParseFloatError, ParseIntError};
use std::str::ParseBoolError;
use std::sync::Arc;
use thiserror::Error;

/// Shared, clonable boxed error used as the `source` of wrapped failures.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// The main error type for configuration operations.
///
/// It is marked as `#[non_exhaustive]` to allow for future additions without
/// breaking backwards compatibility.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::errors::ConfigError;
///
/// fn lookup() -> Result<String, ConfigError> {
///     Err(ConfigError::NotFound {
///         path: "default/0/carrier/dhl/username".to_string(),
///     })
/// }
/// assert!(lookup().unwrap_err().is_not_found());
/// ```
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A path, route or key was empty.
    #[error("Empty {what}")]
    Empty {
        /// What was empty (route, path, key ...)
        what: String,
    },

    /// A route, scope or scope pair is malformed.
    #[error("Not valid: {message}")]
    NotValid {
        /// Description of the violation
        message: String,
    },

    /// A scope-kind token is not recognized.
    #[error("Scope type not supported: {token}")]
    NotSupported {
        /// The offending token
        token: String,
    },

    /// No value exists at any level of the fallback chain and there is no default.
    #[error("Configuration value not found: {path}")]
    NotFound {
        /// The fully qualified path that was requested
        path: String,
    },

    /// A write violates the write-scope permission declared by the route's field meta.
    #[error("Writing {path} is not allowed: route permits writes up to {allowed} scope")]
    NotAllowed {
        /// The fully qualified path of the rejected write
        path: String,
        /// The maximum scope allowed to write this route
        allowed: String,
    },

    /// The service was closed.
    #[error("Service already closed, cannot {operation}")]
    AlreadyClosed {
        /// The operation attempted after shutdown
        operation: String,
    },

    /// An event kind outside of the defined range.
    #[error("Event kind {value} out of range")]
    OutOfRange {
        /// The raw value
        value: u8,
    },

    /// An irrecoverable internal invariant violation.
    #[error("Fatal: {message}")]
    Fatal {
        /// Description of the broken invariant
        message: String,
    },

    /// An observer aborted a read or write pipeline.
    #[error("Observer for {event} on {path} failed: {source}")]
    ObserverError {
        /// The fully qualified path being processed
        path: String,
        /// The event kind being dispatched
        event: String,
        /// The error returned by the observer
        #[source]
        source: Box<ConfigError>,
    },

    /// Failed to convert a configuration value to the requested type.
    #[error("Failed to convert configuration value for '{key}' to type {target_type}: {source}")]
    TypeConversionError {
        /// The path being converted
        key: String,
        /// The target type name
        target_type: String,
        /// The underlying conversion error
        source: SharedError,
    },

    /// An error occurred in a configuration source.
    #[error("Configuration source '{source_name}' error: {message}")]
    SourceError {
        /// The name of the source that encountered the error
        source_name: String,
        /// The error message
        message: String,
        /// The underlying error, if any
        #[source]
        source: Option<SharedError>,
    },

    /// An error occurred in a storage backend.
    #[error("Storage '{storage}' error: {message}")]
    StorageError {
        /// The name of the storage backend
        storage: String,
        /// The error message
        message: String,
        /// The underlying error, if any
        #[source]
        source: Option<SharedError>,
    },

    /// Failed to parse a configuration file or value.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// The error message
        message: String,
        /// The underlying parsing error
        #[source]
        source: Option<SharedError>,
    },

    /// An error occurred in a configuration watcher.
    #[error("Configuration watcher error: {message}")]
    WatcherError {
        /// The error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<SharedError>,
    },

    /// An I/O error occurred while reading configuration.
    #[error("I/O error: {0}")]
    IoError(Arc<std::io::Error>),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(Arc::new(err))
    }
}

impl ConfigError {
    /// Creates a `NotValid` error from anything printable.
    pub fn not_valid(message: impl Into<String>) -> Self {
        ConfigError::NotValid {
            message: message.into(),
        }
    }

    /// Creates a `NotFound` error for the given path.
    pub fn not_found(path: impl Into<String>) -> Self {
        ConfigError::NotFound { path: path.into() }
    }

    /// Creates a `Fatal` error.
    pub fn fatal(message: impl Into<String>) -> Self {
        ConfigError::Fatal {
            message: message.into(),
        }
    }

    /// Creates a TypeConversionError from a ParseIntError.
    pub fn from_parse_int_error(key: String, err: ParseIntError) -> Self {
        ConfigError::TypeConversionError {
            key,
            target_type: "integer".to_string(),
            source: Arc::new(err),
        }
    }

    /// Creates a TypeConversionError from a ParseFloatError.
    pub fn from_parse_float_error(key: String, err: ParseFloatError) -> Self {
        ConfigError::TypeConversionError {
            key,
            target_type: "float".to_string(),
            source: Arc::new(err),
        }
    }

    /// Creates a TypeConversionError from a ParseBoolError.
    pub fn from_parse_bool_error(key: String, err: ParseBoolError) -> Self {
        ConfigError::TypeConversionError {
            key,
            target_type: "boolean".to_string(),
            source: Arc::new(err),
        }
    }

    /// Returns true for [`ConfigError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound { .. })
    }

    /// Returns true for [`ConfigError::NotValid`].
    pub fn is_not_valid(&self) -> bool {
        matches!(self, ConfigError::NotValid { .. })
    }

    /// Returns true for [`ConfigError::NotAllowed`].
    pub fn is_not_allowed(&self) -> bool {
        matches!(self, ConfigError::NotAllowed { .. })
    }

    /// Returns true for [`ConfigError::AlreadyClosed`].
    pub fn is_already_closed(&self) -> bool {
        matches!(self, ConfigError::AlreadyClosed { .. })
    }
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = ConfigError::not_found("default/0/aa/bb/cc");
        assert_eq!(
            error.to_string(),
            "Configuration value not found: default/0/aa/bb/cc"
        );
        assert!(error.is_not_found());
    }

    #[test]
    fn test_not_allowed_error() {
        let error = ConfigError::NotAllowed {
            path: "stores/3/carrier/dhl/timeout".to_string(),
            allowed: "default".to_string(),
        };
        assert!(error.to_string().contains("stores/3/carrier/dhl/timeout"));
        assert!(error.to_string().contains("default"));
        assert!(error.is_not_allowed());
    }

    #[test]
    fn test_type_conversion_error() {
        let source_error = "invalid value".parse::<i32>().unwrap_err();
        let error = ConfigError::TypeConversionError {
            key: "aa/bb/cc".to_string(),
            target_type: "i32".to_string(),
            source: Arc::new(source_error),
        };
        assert!(error.to_string().contains("aa/bb/cc"));
        assert!(error.to_string().contains("i32"));
    }

    #[test]
    fn test_observer_error_keeps_context() {
        let error = ConfigError::ObserverError {
            path: "websites/1/aa/bb/cc".to_string(),
            event: "before_set".to_string(),
            source: Box::new(ConfigError::not_valid("rejected")),
        };
        let msg = error.to_string();
        assert!(msg.contains("before_set"));
        assert!(msg.contains("websites/1/aa/bb/cc"));
        assert!(msg.contains("rejected"));
    }

    #[test]
    fn test_error_is_clone() {
        let error = ConfigError::StorageError {
            storage: "map".to_string(),
            message: "boom".to_string(),
            source: None,
        };
        let cloned = error.clone();
        assert_eq!(error.to_string(), cloned.to_string());
    }

    #[test]
    fn test_already_closed_error() {
        let error = ConfigError::AlreadyClosed {
            operation: "set".to_string(),
        };
        assert_eq!(error.to_string(), "Service already closed, cannot set");
        assert!(error.is_already_closed());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = ConfigError::from(io_error);
        assert!(matches!(error, ConfigError::IoError(_)));
    }

    #[test]
    fn test_from_parse_int_error() {
        let parse_err = "not_a_number".parse::<i32>().unwrap_err();
        let error = ConfigError::from_parse_int_error("aa/bb/cc".to_string(), parse_err);
        assert!(matches!(error, ConfigError::TypeConversionError { .. }));
        assert!(error.to_string().contains("integer"));
    }

    #[test]
    fn test_from_parse_float_error() {
        let parse_err = "not_a_float".parse::<f64>().unwrap_err();
        let error = ConfigError::from_parse_float_error("aa/bb/cc".to_string(), parse_err);
        assert!(error.to_string().contains("float"));
    }

    #[test]
    fn test_from_parse_bool_error() {
        let parse_err = "not_a_bool".parse::<bool>().unwrap_err();
        let error = ConfigError::from_parse_bool_error("aa/bb/cc".to_string(), parse_err);
        assert!(error.to_string().contains("boolean"));
    }
}
