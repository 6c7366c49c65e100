//! Flattening of nested owner mappings into path/value pairs
//!
//! Paths are built as `prefix/key`. Items of a repeated element that carry
//! text alongside attributes become a single pair whose path is qualified by
//! every other key, e.g. `/Contacts/Contact/@type=work`.

use crate::melt::types::MeltConfig;
use serde_json::{Map, Value};

/// Key under which an element's own text is stored next to its attributes
pub const TEXT_KEY: &str = "#text";

/// Prefix marking an attribute key inside a nested mapping
pub const ATTRIBUTE_PREFIX: &str = "@";

/// Reduces nested mappings to an ordered list of `(path, value)` pairs
#[derive(Debug, Clone)]
pub struct FieldFlattener {
    list_separator: String,
}

impl FieldFlattener {
    pub fn new(config: &MeltConfig) -> Self {
        FieldFlattener {
            list_separator: config.list_separator.clone(),
        }
    }

    /// Flatten every leaf of `mapping`, in key order, below `prefix`
    ///
    /// Repeated paths are kept; merging them into a flat mapping is left to
    /// the caller.
    pub fn flatten(&self, mapping: &Map<String, Value>, prefix: &str) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        self.flatten_into(mapping, prefix, &mut pairs);
        pairs
    }

    fn flatten_into(
        &self,
        mapping: &Map<String, Value>,
        prefix: &str,
        pairs: &mut Vec<(String, String)>,
    ) {
        for (key, value) in mapping {
            let path = format!("{}/{}", prefix, key);

            match value {
                Value::Object(nested) => self.flatten_into(nested, &path, pairs),
                Value::Array(items) if items.iter().any(Value::is_object) => {
                    self.flatten_items(items, &path, pairs)
                }
                _ => pairs.push((path, self.scalar_text(value))),
            }
        }
    }

    /// Handle the items of a repeated element sharing `path`
    fn flatten_items(&self, items: &[Value], path: &str, pairs: &mut Vec<(String, String)>) {
        for item in items {
            match item {
                Value::Object(fields) => match fields.get(TEXT_KEY) {
                    Some(text) => {
                        let mut qualified = path.to_string();
                        for (qualifier, value) in fields {
                            if qualifier != TEXT_KEY {
                                qualified.push('/');
                                qualified.push_str(qualifier);
                                qualified.push('=');
                                qualified.push_str(&self.scalar_text(value));
                            }
                        }
                        pairs.push((qualified, self.scalar_text(text)));
                    }
                    None => self.flatten_into(fields, path, pairs),
                },
                scalar => pairs.push((path.to_string(), self.scalar_text(scalar))),
            }
        }
    }

    /// Render a leaf as a cell value
    fn scalar_text(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| self.scalar_text(item))
                .collect::<Vec<_>>()
                .join(&self.list_separator),
            other => other.to_string(),
        }
    }
}
