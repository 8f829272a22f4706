// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration parser trait definition.
//!
//! This module defines the `ConfigParser` trait, which turns the content of a
//! configuration file into flat route keyed strings.

use crate::domain::Result;
use std::collections::HashMap;

/// A trait for parsing configuration files.
///
/// # Key Format
///
/// Parsers flatten nested structures by joining keys with `/`, producing
/// strings that [`crate::domain::Path::parse`] understands. For example:
///
/// ```yaml
/// carrier:
///   dhl:
///     username: alice
/// websites:
///   2:
///     carrier:
///       dhl:
///         username: bob
/// ```
///
/// Is parsed into:
/// - `carrier/dhl/username` -> `"alice"`
/// - `websites/2/carrier/dhl/username` -> `"bob"`
///
/// # Examples
///
/// ```rust
/// use scopecfg::ports::ConfigParser;
/// use scopecfg::domain::Result;
/// use std::collections::HashMap;
///
/// struct MyParser;
///
/// impl ConfigParser for MyParser {
///     fn parse(&self, content: &str) -> Result<HashMap<String, String>> {
///         let mut map = HashMap::new();
///         for line in content.lines() {
///             if let Some((k, v)) = line.split_once('=') {
///                 map.insert(k.trim().to_string(), v.trim().to_string());
///             }
///         }
///         Ok(map)
///     }
///
///     fn supported_extensions(&self) -> &[&str] {
///         &["ini"]
///     }
/// }
///
/// let map = MyParser.parse("aa/bb/cc = 1").unwrap();
/// assert_eq!(map.get("aa/bb/cc"), Some(&"1".to_string()));
/// ```
pub trait ConfigParser {
    /// Parses configuration content into a flat key-value map.
    fn parse(&self, content: &str) -> Result<HashMap<String, String>>;

    /// Returns the file extensions (without the leading dot) this parser supports.
    fn supported_extensions(&self) -> &[&str];
}
