// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line argument configuration source adapter.
//!
//! This module provides an adapter that reads configuration values from
//! command-line arguments.

use crate::domain::{path::SEPARATOR, Result};
use crate::ports::{parse_entries, ConfigSource, SourceEntry};
use std::collections::HashMap;

/// Configuration source adapter for command-line arguments.
///
/// Arguments whose key looks like a path (contains `/`) are read in two formats:
/// - `--route=value` or `--stores/2/route=value`
/// - `--route value`
///
/// Other flags, like `--verbose`, belong to the application and are ignored.
///
/// # Priority
///
/// Command-line arguments have the highest priority (3), which means they override
/// both environment variables (priority 2) and configuration files (priority 1).
///
/// # Examples
///
/// ```rust
/// use scopecfg::adapters::CommandLineAdapter;
/// use scopecfg::ports::ConfigSource;
///
/// let args = vec!["--carrier/dhl/username=alice", "--verbose", "--websites/1/carrier/dhl/username", "bob"];
/// let adapter = CommandLineAdapter::from_args(args);
/// assert_eq!(adapter.entries().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CommandLineAdapter {
    /// Parsed configuration values
    values: HashMap<String, String>,
}

impl CommandLineAdapter {
    /// Creates a new command-line adapter with no arguments.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Creates a new command-line adapter from a vector of arguments.
    pub fn from_args<S: AsRef<str>>(args: Vec<S>) -> Self {
        let mut adapter = Self::new();
        adapter.parse_args(args);
        adapter
    }

    /// Creates a new command-line adapter from the process's command-line arguments.
    ///
    /// This skips the first argument (the program name) and parses the rest.
    pub fn from_env_args() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::from_args(args)
    }

    /// Number of path arguments found.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no path argument was found.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parses command-line arguments and populates the values map.
    fn parse_args<S: AsRef<str>>(&mut self, args: Vec<S>) {
        let mut i = 0;
        while i < args.len() {
            let Some(flag) = args[i].as_ref().strip_prefix("--") else {
                i += 1;
                continue;
            };

            // Handle --key=value format
            if let Some((key, value)) = flag.split_once('=') {
                if key.contains(SEPARATOR) {
                    self.values.insert(key.to_string(), value.to_string());
                }
                i += 1;
                continue;
            }

            // Handle --key value format
            match args.get(i + 1).map(|next| next.as_ref()) {
                // Make sure the next argument is not another flag
                Some(next) if !next.starts_with('-') => {
                    if flag.contains(SEPARATOR) {
                        self.values.insert(flag.to_string(), next.to_string());
                    }
                    i += 2;
                }
                _ => i += 1,
            }
        }
    }
}

impl Default for CommandLineAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for CommandLineAdapter {
    fn name(&self) -> &str {
        "cli"
    }

    fn priority(&self) -> u8 {
        3
    }

    fn entries(&self) -> Result<Vec<SourceEntry>> {
        parse_entries(self.name(), &self.values)
    }

    fn reload(&mut self) -> Result<()> {
        // Command-line arguments don't change during runtime
        Ok(())
    }
}
