//! In-memory capture of the `<Owner>` sub-tree
//!
//! Elements are folded into nested mappings as they close: attributes become
//! `@name` keys, text becomes the value itself or a `#text` key when the
//! element also has attributes or children, and a repeated child turns into
//! a list of its occurrences.

use crate::error::RecordError;
use crate::melt::flatten::{ATTRIBUTE_PREFIX, TEXT_KEY};
use serde_json::{Map, Value};

pub const OWNER_TAG: &str = "Owner";

#[derive(Debug)]
struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: &str) -> Self {
        Frame {
            name: name.to_string(),
            children: Map::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        let mut children = self.children;

        if children.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            }
        } else {
            if !text.is_empty() {
                children.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
            }
            Value::Object(children)
        }
    }
}

/// Builder for the owner sub-tree, one frame per open element
#[derive(Debug)]
pub struct OwnerTree {
    stack: Vec<Frame>,
    legacy_ampersands: bool,
}

impl OwnerTree {
    /// Start a capture at an `<Owner>` element; its own attributes are not kept
    pub fn open(legacy_ampersands: bool) -> Self {
        OwnerTree {
            stack: vec![Frame::new(OWNER_TAG)],
            legacy_ampersands,
        }
    }

    /// Number of open elements, the owner element included
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push_element(&mut self, name: &str, attrs: &[(String, String)]) {
        let mut frame = Frame::new(name);
        for (key, value) in attrs {
            frame.children.insert(
                format!("{}{}", ATTRIBUTE_PREFIX, key),
                Value::String(self.clean(value)),
            );
        }
        self.stack.push(frame);
    }

    pub fn push_text(&mut self, text: &str) {
        let text = self.clean(text);
        if let Some(frame) = self.stack.last_mut() {
            frame.text.push_str(&text);
        }
    }

    /// Close the innermost element below the owner and attach it to its parent
    pub fn close_element(&mut self, name: &str) -> Result<(), RecordError> {
        if self.stack.len() < 2 {
            return Err(RecordError::Flatten(format!(
                "unexpected </{}> closing the owner sub-tree",
                name
            )));
        }

        let frame = self.stack.pop().ok_or_else(|| {
            RecordError::Flatten("owner sub-tree is already closed".to_string())
        })?;
        if frame.name != name {
            return Err(RecordError::Flatten(format!(
                "</{}> does not close <{}>",
                name, frame.name
            )));
        }

        let child_name = frame.name.clone();
        let value = frame.into_value();
        if let Some(parent) = self.stack.last_mut() {
            push_child(&mut parent.children, child_name, value);
        }
        Ok(())
    }

    /// Finish the capture, yielding the owner element's mapping
    ///
    /// `None` means the owner element was empty.
    pub fn finish(mut self) -> Result<Option<Map<String, Value>>, RecordError> {
        if self.stack.len() != 1 {
            let open = self
                .stack
                .iter()
                .skip(1)
                .map(|frame| frame.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(RecordError::Flatten(format!(
                "owner closed with open elements: {}",
                open
            )));
        }

        let Some(root) = self.stack.pop() else {
            return Ok(None);
        };
        let value = root.into_value();
        if value.is_null() {
            return Ok(None);
        }

        let mut mapping = Map::new();
        mapping.insert(OWNER_TAG.to_string(), value);
        Ok(Some(mapping))
    }

    fn clean(&self, raw: &str) -> String {
        if self.legacy_ampersands {
            raw.replace('&', "and")
        } else {
            raw.to_string()
        }
    }
}

/// Add a child value, turning repeated names into a list
fn push_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builds_nested_mapping() {
        let mut tree = OwnerTree::open(false);
        tree.push_element("Name", &attrs(&[("abbreviation", "NCBI")]));
        tree.push_text("National Center for Biotechnology Information");
        tree.close_element("Name").unwrap();
        tree.push_element("Contacts", &[]);
        for (kind, number) in [("work", "1"), ("home", "2")] {
            tree.push_element("Phone", &attrs(&[("type", kind)]));
            tree.push_text(number);
            tree.close_element("Phone").unwrap();
        }
        tree.close_element("Contacts").unwrap();

        let mapping = tree.finish().unwrap().unwrap();
        assert_eq!(
            Value::Object(mapping),
            json!({
                "Owner": {
                    "Name": {
                        "@abbreviation": "NCBI",
                        "#text": "National Center for Biotechnology Information"
                    },
                    "Contacts": {
                        "Phone": [
                            {"@type": "work", "#text": "1"},
                            {"@type": "home", "#text": "2"}
                        ]
                    }
                }
            })
        );
    }

    #[test]
    fn test_empty_owner_yields_nothing() {
        let tree = OwnerTree::open(false);
        assert!(tree.finish().unwrap().is_none());
    }

    #[test]
    fn test_legacy_ampersands() {
        let mut tree = OwnerTree::open(true);
        tree.push_element("Name", &attrs(&[("abbreviation", "R&D")]));
        tree.push_text("Smith & Sons");
        tree.close_element("Name").unwrap();

        let mapping = tree.finish().unwrap().unwrap();
        assert_eq!(
            Value::Object(mapping),
            json!({"Owner": {"Name": {"@abbreviation": "RandD", "#text": "Smith and Sons"}}})
        );
    }

    #[test]
    fn test_mismatched_close_is_a_flatten_error() {
        let mut tree = OwnerTree::open(false);
        tree.push_element("Name", &[]);
        let err = tree.close_element("Contacts").unwrap_err();
        assert!(matches!(err, RecordError::Flatten(_)));
    }

    #[test]
    fn test_unclosed_child_is_a_flatten_error() {
        let mut tree = OwnerTree::open(false);
        tree.push_element("Name", &[]);
        assert!(matches!(tree.finish(), Err(RecordError::Flatten(_))));
    }
}
