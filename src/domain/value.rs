// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration value type with lazy, type-safe conversions.
//!
//! The engine moves raw bytes around. A [`Value`] wraps the bytes found for a
//! [`Path`] and only decodes them when one of the accessors is called. Every
//! accessor is fallible: an absent value yields `NotFound`, malformed bytes a
//! `TypeConversionError` naming the path and the target type.

use crate::domain::errors::{ConfigError, Result, SharedError};
use crate::domain::path::Path;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error produced when a duration literal cannot be parsed.
#[derive(Debug, Error)]
#[error("invalid duration '{0}'")]
pub struct DurationParseError(String);

/// The raw bytes stored for a path, decoded on demand.
///
/// # Examples
///
/// ```
/// use scopecfg::domain::{Path, Value};
/// use std::time::Duration;
///
/// let path = Path::new("carrier/dhl/timeout").unwrap();
/// let value = Value::new(path.clone(), "3600s");
/// assert_eq!(value.as_duration().unwrap(), Duration::from_secs(3600));
///
/// let missing = Value::not_found(path);
/// assert!(!missing.is_found());
/// assert!(missing.as_str().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Value {
    path: Path,
    data: Option<Vec<u8>>,
}

impl Value {
    /// Wraps the bytes found for `path`.
    pub fn new(path: Path, data: impl Into<Vec<u8>>) -> Self {
        Value {
            path,
            data: Some(data.into()),
        }
    }

    /// A value that was not found anywhere.
    pub fn not_found(path: Path) -> Self {
        Value { path, data: None }
    }

    pub(crate) fn from_option(path: Path, data: Option<Vec<u8>>) -> Self {
        Value { path, data }
    }

    /// The path the value was requested for.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a value (or default) was found.
    pub fn is_found(&self) -> bool {
        self.data.is_some()
    }

    /// The raw bytes, if found.
    pub fn raw(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Consumes the value and returns the raw bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let Value { path, data } = self;
        data.ok_or_else(|| ConfigError::not_found(path.fq()))
    }

    fn bytes(&self) -> Result<&[u8]> {
        self.data
            .as_deref()
            .ok_or_else(|| ConfigError::not_found(self.path.fq()))
    }

    fn conversion_error(&self, target: &str, source: SharedError) -> ConfigError {
        ConfigError::TypeConversionError {
            key: self.path.fq(),
            target_type: target.to_string(),
            source,
        }
    }

    /// Returns the value as a string slice.
    pub fn as_str(&self) -> Result<&str> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes).map_err(|e| self.conversion_error("string", Arc::new(e)))
    }

    /// Returns the value as an owned `String`.
    pub fn as_string(&self) -> Result<String> {
        self.as_str().map(str::to_string)
    }

    /// Converts the value to a boolean.
    ///
    /// Recognizes the following values (case-insensitive):
    /// - `true`: "true", "yes", "1", "on"
    /// - `false`: "false", "no", "0", "off"
    pub fn as_bool(&self) -> Result<bool> {
        let s = self.as_str()?;
        match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => s
                .parse::<bool>()
                .map_err(|e| ConfigError::from_parse_bool_error(self.path.fq(), e)),
        }
    }

    /// Converts the value to an `i32`.
    pub fn as_i32(&self) -> Result<i32> {
        self.as_str()?
            .trim()
            .parse::<i32>()
            .map_err(|e| ConfigError::from_parse_int_error(self.path.fq(), e))
    }

    /// Converts the value to an `i64`.
    pub fn as_i64(&self) -> Result<i64> {
        self.as_str()?
            .trim()
            .parse::<i64>()
            .map_err(|e| ConfigError::from_parse_int_error(self.path.fq(), e))
    }

    /// Converts the value to a `u32`.
    pub fn as_u32(&self) -> Result<u32> {
        self.as_str()?
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::from_parse_int_error(self.path.fq(), e))
    }

    /// Converts the value to a `u64`.
    pub fn as_u64(&self) -> Result<u64> {
        self.as_str()?
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::from_parse_int_error(self.path.fq(), e))
    }

    /// Converts the value to an `f64`.
    pub fn as_f64(&self) -> Result<f64> {
        self.as_str()?
            .trim()
            .parse::<f64>()
            .map_err(|e| ConfigError::from_parse_float_error(self.path.fq(), e))
    }

    /// Converts the value to a [`Duration`].
    ///
    /// Accepts sequences such as `3600s`, `1h30m`, `1.5h` or `250ms`
    /// (units `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare integer is read as
    /// seconds.
    pub fn as_duration(&self) -> Result<Duration> {
        let s = self.as_str()?.trim();
        parse_duration(s).map_err(|e| self.conversion_error("duration", Arc::new(e)))
    }

    /// Converts an RFC 3339 timestamp to a UTC date time.
    pub fn as_time(&self) -> Result<DateTime<Utc>> {
        let s = self.as_str()?.trim();
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| self.conversion_error("time", Arc::new(e)))
    }

    /// Splits a comma separated value into trimmed, non-empty parts.
    pub fn as_list(&self) -> Result<Vec<String>> {
        Ok(self
            .as_str()?
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Parses the value into any type that implements `FromStr`.
    ///
    /// # Examples
    ///
    /// ```
    /// use scopecfg::domain::{Path, Value};
    /// use std::net::IpAddr;
    ///
    /// let value = Value::new(Path::new("aa/bb/cc").unwrap(), "127.0.0.1");
    /// let ip: IpAddr = value.parse().unwrap();
    /// assert_eq!(ip.to_string(), "127.0.0.1");
    /// ```
    pub fn parse<T>(&self) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.as_str()?
            .parse::<T>()
            .map_err(|e| self.conversion_error(std::any::type_name::<T>(), Arc::new(e)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{}", String::from_utf8_lossy(data)),
            None => write!(f, "<not found: {}>", self.path),
        }
    }
}

fn parse_duration(input: &str) -> std::result::Result<Duration, DurationParseError> {
    let err = || DurationParseError(input.to_string());
    if input.is_empty() {
        return Err(err());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(err)?;
        if num_end == 0 {
            return Err(err());
        }
        let number: f64 = rest[..num_end].parse().map_err(|_| err())?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(err()),
        };
        total += number * nanos_per_unit;
        rest = &rest[unit_end..];
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(err());
    }
    Ok(Duration::from_nanos(total as u64))
}
