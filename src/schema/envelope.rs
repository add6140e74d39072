//! Schema document format and loading.
//!
//! The canonical document is an envelope:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "metadata": { "title": "Sign-up form", "author": "design team" },
//!   "components": [ { "id": "root", "componentName": "Page" } ]
//! }
//! ```
//!
//! Loaders in the wild also hand over a bare array of root nodes or a single
//! root node, so [`Schema::from_json_str`] accepts all three shapes.

use crate::domain::{DynUiError, Node, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Version written into envelopes built from bare node lists.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";

fn default_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

/// Descriptive schema metadata. Carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Who wrote the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Creation timestamp, as written by the authoring tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,

    /// Last modification timestamp, as written by the authoring tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

/// A complete schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Format version string.
    #[serde(default = "default_version")]
    pub version: String,

    /// Root nodes, in render order.
    pub components: Vec<Node>,

    /// Optional descriptive metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SchemaMetadata>,
}

impl Schema {
    /// Wraps root nodes in an envelope with the default version and no metadata.
    #[must_use]
    pub fn new(components: Vec<Node>) -> Self {
        Self {
            version: default_version(),
            components,
            metadata: None,
        }
    }

    /// Parses an envelope, a bare array of nodes, or a single node.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::Schema`] when the text is not valid JSON or does
    /// not match any of the accepted shapes, and [`DynUiError::Config`] for a
    /// top-level scalar.
    ///
    /// # Example
    ///
    /// ```
    /// use dynui::schema::Schema;
    ///
    /// let single = Schema::from_json_str(r#"{"id": "a", "componentName": "Text"}"#)?;
    /// let list = Schema::from_json_str(r#"[{"id": "a", "componentName": "Text"}]"#)?;
    /// assert_eq!(single.components, list.components);
    /// # Ok::<(), dynui::DynUiError>(())
    /// ```
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Interprets an already-parsed JSON value; see [`Schema::from_json_str`].
    ///
    /// # Errors
    ///
    /// Same as [`Schema::from_json_str`].
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(_) => Ok(Self::new(serde_json::from_value(value)?)),
            Value::Object(ref map) if map.contains_key("components") => Ok(serde_json::from_value(value)?),
            Value::Object(_) => Ok(Self::new(vec![serde_json::from_value(value)?])),
            other => Err(DynUiError::Config(format!(
                "schema must be an object or an array of nodes, found `{other}`"
            ))),
        }
    }

    /// Reads and parses a schema file.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::Io`] if the file cannot be read, otherwise as
    /// [`Schema::from_json_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = ?path, "loading schema");
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Number of nodes across all trees.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        for root in &self.components {
            root.walk(&mut |_| count += 1);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_keeps_metadata() {
        let schema = Schema::from_json_str(
            r#"{
                "version": "2.1",
                "metadata": { "title": "Demo", "createTime": "2024-01-01" },
                "components": [
                    { "id": "a", "componentName": "View", "children": [
                        { "id": "b", "componentName": "Text" }
                    ] }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.version, "2.1");
        assert_eq!(schema.node_count(), 2);
        let metadata = schema.metadata.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Demo"));
        assert_eq!(metadata.create_time.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn bare_shapes_get_default_version() {
        let schema = Schema::from_json_str(r#"[{"id": "a", "componentName": "Text"}]"#).unwrap();
        assert_eq!(schema.version, DEFAULT_SCHEMA_VERSION);
        assert!(schema.metadata.is_none());
    }

    #[test]
    fn scalar_schema_is_a_configuration_error() {
        assert!(matches!(Schema::from_json_str("42"), Err(DynUiError::Config(_))));
        assert!(matches!(Schema::from_json_str("{"), Err(DynUiError::Schema(_))));
        assert!(matches!(
            Schema::from_json_str(r#"{"componentName": "NoId"}"#),
            Err(DynUiError::Schema(_))
        ));
    }
}
