// SPDX-License-Identifier: MIT OR Apache-2.0

//! YAML configuration files.
//!
//! Nested mappings are flattened into routes. Scoped values live under
//! top-level `websites/<id>` and `stores/<id>` sections, mirroring the fully
//! qualified path syntax.

use crate::domain::{ConfigError, Result};
use crate::ports::{parse_entries, ConfigParser, ConfigSource, SourceEntry};
use directories::ProjectDirs;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Files above 10MB are rejected before reading.
const MAX_YAML_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Flattens YAML documents into path keyed strings.
///
/// The parser converts YAML files into flat maps whose keys are `/` joined
/// paths. Sequences of scalars become comma separated values, which
/// [`Value::as_list`](crate::domain::Value::as_list) splits again.
///
/// # Examples
///
/// ```rust
/// use scopecfg::adapters::YamlParser;
/// use scopecfg::ports::ConfigParser;
///
/// let parser = YamlParser::new();
/// let yaml_content = "carrier:\n  dhl:\n    username: alice\nwebsites:\n  2:\n    carrier:\n      dhl:\n        username: bob\n";
/// let result = parser.parse(yaml_content).unwrap();
/// assert_eq!(result.get("carrier/dhl/username"), Some(&"alice".to_string()));
/// assert_eq!(result.get("websites/2/carrier/dhl/username"), Some(&"bob".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct YamlParser;

impl YamlParser {
    /// Creates the parser.
    pub fn new() -> Self {
        YamlParser
    }

    fn scalar(value: &serde_yaml::Value) -> Option<String> {
        match value {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            serde_yaml::Value::Null => Some(String::new()),
            _ => None,
        }
    }

    /// Flattens a YAML value into a flat map with `/` joined keys.
    fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, result: &mut HashMap<String, String>) {
        match value {
            serde_yaml::Value::Mapping(map) => {
                for (key, val) in map {
                    // numeric keys are scope ids
                    let Some(key_str) = Self::scalar(key) else {
                        continue;
                    };
                    let new_prefix = if prefix.is_empty() {
                        key_str
                    } else {
                        format!("{}/{}", prefix, key_str)
                    };
                    Self::flatten_yaml(val, &new_prefix, result);
                }
            }
            serde_yaml::Value::Sequence(seq) => {
                let items: Vec<String> = seq.iter().filter_map(Self::scalar).collect();
                if items.len() < seq.len() {
                    debug!("Skipping non-scalar list items under '{}'", prefix);
                }
                result.insert(prefix.to_string(), items.join(","));
            }
            serde_yaml::Value::Tagged(tagged) => {
                Self::flatten_yaml(&tagged.value, prefix, result);
            }
            scalar => {
                if let Some(s) = Self::scalar(scalar) {
                    result.insert(prefix.to_string(), s);
                }
            }
        }
    }
}

impl Default for YamlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigParser for YamlParser {
    fn parse(&self, content: &str) -> Result<HashMap<String, String>> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to parse YAML: {}", e),
                source: Some(Arc::new(e)),
            })?;

        let mut result = HashMap::new();
        Self::flatten_yaml(&value, "", &mut result);
        Ok(result)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
}

fn source_error(message: String, err: Option<std::io::Error>) -> ConfigError {
    ConfigError::SourceError {
        source_name: "yaml-file".to_string(),
        message,
        source: err.map(|e| Arc::new(e) as crate::domain::errors::SharedError),
    }
}

/// Reads a file after checking its size.
fn read_limited(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| {
        source_error(
            format!("Failed to read file metadata: {}", file_name(path)),
            Some(e),
        )
    })?;

    if metadata.len() > MAX_YAML_FILE_SIZE {
        return Err(source_error(
            format!(
                "Configuration file too large: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_YAML_FILE_SIZE
            ),
            None,
        ));
    }

    fs::read_to_string(path).map_err(|e| {
        source_error(
            format!("Failed to read configuration file: {}", file_name(path)),
            Some(e),
        )
    })
}

/// A YAML file as a configuration source.
///
/// The file is read once on creation and again on every reload. Its location
/// is either given explicitly or derived from the platform's configuration
/// directory for an application.
///
/// YAML files have the lowest priority (1): environment variables and
/// command-line arguments overwrite what they set.
///
/// # Examples
///
/// ```rust,no_run
/// use scopecfg::adapters::YamlFileAdapter;
///
/// let explicit = YamlFileAdapter::from_file("/etc/shop/config.yaml").unwrap();
///
/// // ~/.config/shop/config.yaml on Linux
/// let discovered = YamlFileAdapter::from_default_location("shop", "com.example").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct YamlFileAdapter {
    file_path: PathBuf,
    /// Flattened values of the last successful read
    values: HashMap<String, String>,
    parser: YamlParser,
}

impl YamlFileAdapter {
    /// Reads the file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        let parser = YamlParser::new();

        let canonical_path = file_path.canonicalize().map_err(|e| {
            source_error(
                format!("Invalid or inaccessible path: {}", file_name(&file_path)),
                Some(e),
            )
        })?;

        let content = read_limited(&canonical_path)?;
        let values = parser.parse(&content)?;
        debug!(
            "Loaded {} values from {}",
            values.len(),
            canonical_path.display()
        );

        Ok(Self {
            file_path: canonical_path,
            values,
            parser,
        })
    }

    /// Reads `config.yaml` from the application's configuration directory.
    pub fn from_default_location(app_name: &str, qualifier: &str) -> Result<Self> {
        Self::with_filename(app_name, qualifier, "config.yaml")
    }

    /// Reads `filename` from the application's configuration directory.
    pub fn with_filename(app_name: &str, qualifier: &str, filename: &str) -> Result<Self> {
        let proj_dirs = ProjectDirs::from(qualifier, "", app_name).ok_or_else(|| {
            source_error("Failed to determine project directories".to_string(), None)
        })?;

        Self::from_file(proj_dirs.config_dir().join(filename))
    }

    /// The canonical path of the file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl ConfigSource for YamlFileAdapter {
    fn name(&self) -> &str {
        "yaml-file"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn entries(&self) -> Result<Vec<SourceEntry>> {
        parse_entries(self.name(), &self.values)
    }

    fn reload(&mut self) -> Result<()> {
        let content = read_limited(&self.file_path)?;
        self.values = self.parser.parse(&content)?;
        debug!(
            "Reloaded {} values from {}",
            self.values.len(),
            self.file_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScopeId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_yaml_parser_nested() {
        let parser = YamlParser::new();
        let result = parser
            .parse("carrier:\n  dhl:\n    username: alice\n    timeout: 30\n    enabled: true\n")
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(
            result.get("carrier/dhl/username"),
            Some(&"alice".to_string())
        );
        assert_eq!(result.get("carrier/dhl/timeout"), Some(&"30".to_string()));
        assert_eq!(result.get("carrier/dhl/enabled"), Some(&"true".to_string()));
    }

    #[test]
    fn test_yaml_parser_scoped_sections() {
        let parser = YamlParser::new();
        let result = parser
            .parse("stores:\n  3:\n    carrier:\n      dhl:\n        username: carol\n")
            .unwrap();
        assert_eq!(
            result.get("stores/3/carrier/dhl/username"),
            Some(&"carol".to_string())
        );
    }

    #[test]
    fn test_yaml_parser_sequence_joined() {
        let parser = YamlParser::new();
        let result = parser
            .parse("shipping:\n  allowed:\n    countries: [DE, AT, CH]\n")
            .unwrap();
        assert_eq!(
            result.get("shipping/allowed/countries"),
            Some(&"DE,AT,CH".to_string())
        );
    }

    #[test]
    fn test_yaml_parser_null() {
        let parser = YamlParser::new();
        let result = parser.parse("aa:\n  bb:\n    cc: ~\n").unwrap();
        assert_eq!(result.get("aa/bb/cc"), Some(&String::new()));
    }

    #[test]
    fn test_yaml_parser_invalid() {
        let parser = YamlParser::new();
        let err = parser.parse("aa: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_yaml_parser_supported_extensions() {
        assert_eq!(YamlParser::default().supported_extensions(), &["yaml", "yml"]);
    }

    #[test]
    fn test_yaml_adapter_entries() {
        let file = write_yaml(
            "carrier:\n  dhl:\n    username: alice\nwebsites:\n  2:\n    carrier:\n      dhl:\n        username: bob\n",
        );
        let adapter = YamlFileAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.name(), "yaml-file");
        assert_eq!(adapter.priority(), 1);

        let entries = adapter.entries().unwrap();
        assert_eq!(entries.len(), 2);
        let (path, value) = entries
            .iter()
            .find(|(p, _)| p.scope() == ScopeId::website(2))
            .unwrap();
        assert_eq!(path.route().as_str(), "carrier/dhl/username");
        assert_eq!(value, &b"bob".to_vec());
    }

    #[test]
    fn test_yaml_adapter_invalid_path() {
        let file = write_yaml("short: value\n");
        let adapter = YamlFileAdapter::from_file(file.path()).unwrap();
        let err = adapter.entries().unwrap_err();
        assert!(matches!(err, ConfigError::SourceError { .. }));
    }

    #[test]
    fn test_yaml_adapter_reload() {
        let mut file = write_yaml("aa:\n  bb:\n    cc: one\n");
        let mut adapter = YamlFileAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.entries().unwrap()[0].1, b"one".to_vec());

        file.as_file_mut().set_len(0).unwrap();
        std::fs::write(file.path(), "aa:\n  bb:\n    cc: two\n").unwrap();
        adapter.reload().unwrap();
        assert_eq!(adapter.entries().unwrap()[0].1, b"two".to_vec());
    }

    #[test]
    fn test_yaml_adapter_nonexistent_file() {
        let result = YamlFileAdapter::from_file("/nonexistent/scopecfg/config.yaml");
        assert!(matches!(result, Err(ConfigError::SourceError { .. })));
    }
}
