//! Hierarchical configuration documents
//!
//! Both the topology document and the settings document are loaded into a
//! [`ConfigTree`]: an ordered tree whose children are keyed by strings and may
//! repeat keys (several `Parallel` groups in one topology, for example).
//!
//! Loading rules for YAML and JSON:
//! - a mapping contributes one child per entry, in document order
//! - a sequence contributes the children of each mapping item in turn, and a
//!   child keyed by the scalar itself for each scalar item
//! - scalars become leaf data

use crate::error::ConfigError;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Ordered key/value tree with optional leaf data on every node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    data: String,
    children: Vec<(String, ConfigTree)>,
}

impl ConfigTree {
    /// Create an empty node
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node holding only leaf data
    pub fn leaf(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            children: Vec::new(),
        }
    }

    /// Builder-style child append
    #[must_use]
    pub fn with_child(mut self, key: impl Into<String>, child: ConfigTree) -> Self {
        self.push_child(key, child);
        self
    }

    /// Append a child; existing children with the same key are kept
    pub fn push_child(&mut self, key: impl Into<String>, child: ConfigTree) {
        self.children.push((key.into(), child));
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Children in document order
    pub fn children(&self) -> impl Iterator<Item = (&str, &ConfigTree)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Resolve a dotted path (`"ResizeImageStage.width"`), taking the first
    /// child whose key matches at every level. The empty path is this node.
    pub fn get_child(&self, path: &str) -> Option<&ConfigTree> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |node, segment| {
            node.children
                .iter()
                .find(|(key, _)| key == segment)
                .map(|(_, child)| child)
        })
    }

    /// Leaf data at `path`, if the path exists
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_child(path).map(ConfigTree::data)
    }

    /// Parse the leaf data at `path`
    ///
    /// Returns `Ok(None)` when the path is absent and an error when the data
    /// does not parse as `T`.
    pub fn get<T>(&self, path: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = self.get_str(path) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                path: path.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parse the leaf data at `path`, falling back to `default` when absent
    pub fn get_or<T>(&self, path: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.get(path)?.unwrap_or(default))
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        Ok(Self::from_yaml_value(&value))
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        Ok(Self::from_json_value(&value))
    }

    /// Load a YAML (`.yaml`/`.yml`) or JSON (`.json`) document
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        debug!("Loading configuration document {}", path.display());
        let contents = std::fs::read_to_string(path)?;

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&contents),
            "json" => Self::from_json_str(&contents),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    fn from_yaml_value(value: &serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Mapping(mapping) => {
                let mut node = Self::new();
                for (key, child) in mapping {
                    node.push_child(yaml_scalar(key), Self::from_yaml_value(child));
                }
                node
            }
            Value::Sequence(items) => {
                let mut node = Self::new();
                for item in items {
                    match item {
                        Value::Mapping(_) => node.children.extend(Self::from_yaml_value(item).children),
                        Value::Sequence(_) => node.push_child("", Self::from_yaml_value(item)),
                        scalar => node.push_child(yaml_scalar(scalar), Self::new()),
                    }
                }
                node
            }
            Value::Tagged(tagged) => Self::from_yaml_value(&tagged.value),
            scalar => Self::leaf(yaml_scalar(scalar)),
        }
    }

    fn from_json_value(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Object(map) => {
                let mut node = Self::new();
                for (key, child) in map {
                    node.push_child(key.clone(), Self::from_json_value(child));
                }
                node
            }
            Value::Array(items) => {
                let mut node = Self::new();
                for item in items {
                    match item {
                        Value::Object(_) => node.children.extend(Self::from_json_value(item).children),
                        Value::Array(_) => node.push_child("", Self::from_json_value(item)),
                        scalar => node.push_child(json_scalar(scalar), Self::new()),
                    }
                }
                node
            }
            scalar => Self::leaf(json_scalar(scalar)),
        }
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> String {
    use serde_yaml::Value;

    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => yaml_scalar(&tagged.value),
        // Collections used as keys have no sensible string form
        Value::Sequence(_) | Value::Mapping(_) => String::new(),
    }
}

fn json_scalar(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_mapping_preserves_order() {
        let tree = ConfigTree::from_yaml_str(
            "GreyscaleConvertStage:\nSmoothImageStage:\nResizeImageStage:\n",
        )
        .unwrap();

        let keys: Vec<&str> = tree.children().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec!["GreyscaleConvertStage", "SmoothImageStage", "ResizeImageStage"]
        );
    }

    #[test]
    fn test_yaml_sequence_allows_duplicate_keys() {
        let yaml = r#"
- GreyscaleConvertStage
- Parallel:
    - ImageHistogramStage
- Parallel:
    - GradientImageStage
    - NormaliseImageStage
"#;
        let tree = ConfigTree::from_yaml_str(yaml).unwrap();

        let keys: Vec<&str> = tree.children().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["GreyscaleConvertStage", "Parallel", "Parallel"]);

        let second: Vec<&str> = tree
            .children()
            .filter(|(k, _)| *k == "Parallel")
            .nth(1)
            .unwrap()
            .1
            .children()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(second, vec!["GradientImageStage", "NormaliseImageStage"]);
    }

    #[test]
    fn test_json_settings_lookup() {
        let tree = ConfigTree::from_json_str(
            r#"{"ResizeImageStage": {"width": 320, "height": 240}, "SmoothImageStage": {"sigma": 1.5}}"#,
        )
        .unwrap();

        assert_eq!(tree.get::<u32>("ResizeImageStage.width").unwrap(), Some(320));
        assert_eq!(tree.get::<f32>("SmoothImageStage.sigma").unwrap(), Some(1.5));
        assert_eq!(tree.get::<u32>("ResizeImageStage.depth").unwrap(), None);
        assert_eq!(tree.get_or("Missing.value", 7u32).unwrap(), 7);
    }

    #[test]
    fn test_invalid_value_reports_path() {
        let tree = ConfigTree::new().with_child(
            "ResizeImageStage",
            ConfigTree::new().with_child("width", ConfigTree::leaf("wide")),
        );

        let err = tree.get::<u32>("ResizeImageStage.width").unwrap_err();
        match err {
            ConfigError::InvalidValue { path, value, .. } => {
                assert_eq!(path, "ResizeImageStage.width");
                assert_eq!(value, "wide");
            }
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("topology.yaml");
        std::fs::write(&yaml_path, "SmoothImageStage:\n").unwrap();
        let tree = ConfigTree::from_file(&yaml_path).unwrap();
        assert!(tree.get_child("SmoothImageStage").is_some());

        let txt_path = dir.path().join("topology.txt");
        std::fs::write(&txt_path, "SmoothImageStage").unwrap();
        assert!(matches!(
            ConfigTree::from_file(&txt_path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
