//! In-memory record model.
//!
//! A [`Record`] is a bag of named fields. Each field holds a [`Value`]: a text
//! scalar, an ordered list of values (repeatable field) or a [`Composite`] of
//! named sub-fields (object field). Serialized form is plain JSON: strings,
//! arrays and objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named sub-fields of an object value, or the top-level fields of a record.
pub type Composite = BTreeMap<String, Value>;

/// Identifier of a record inside its database.
pub type RecordId = u64;

/// A field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    List(Vec<Value>),
    Object(Composite),
}

impl Value {
    /// Create an empty object value.
    pub fn object() -> Self {
        Self::Object(Composite::new())
    }

    /// The scalar content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Composite> {
        match self {
            Self::Object(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Composite> {
        match self {
            Self::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// True for an empty string, an empty list or an object without fields.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Object(fields) => fields.is_empty(),
        }
    }

    /// Whether this value is the text `expected` (whole-value equality).
    pub fn is_text(&self, expected: &str) -> bool {
        self.as_text() == Some(expected)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Composite> for Value {
    fn from(fields: Composite) -> Self {
        Self::Object(fields)
    }
}

/// One structured data item, the unit batch operations act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub fields: Composite,
}

/// Field holding the record type (schema name).
pub const TYPE_FIELD: &str = "type";

/// Field holding the post type of the database the record belongs to.
pub const POST_TYPE_FIELD: &str = "posttype";

impl Record {
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: Composite::new(),
        }
    }

    /// Builder-style field assignment.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_text)
    }

    /// Assign a field, creating it when absent.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_owned(), value.into());
    }

    /// Remove a field, returning its previous value.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// The record type, used to look up its schema.
    pub fn record_type(&self) -> Option<&str> {
        self.get_text(TYPE_FIELD)
    }

    /// The post type of the database holding the record.
    pub fn post_type(&self) -> Option<&str> {
        self.get_text(POST_TYPE_FIELD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_untagged_roundtrip_shape() {
        let value: Value = serde_json::from_value(json!({
            "text": "a",
            "texts": ["b", "c"],
            "objects": [{"value": "d"}]
        }))
        .expect("parse");

        let fields = value.as_object().expect("object");
        assert!(fields["text"].is_text("a"));
        assert_eq!(fields["texts"].as_list().map(<[Value]>::len), Some(2));
        assert!(fields["objects"].as_list().expect("list")[0].as_object().is_some());
    }

    #[test]
    fn test_is_empty() {
        assert!(Value::from("").is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(Value::object().is_empty());
        assert!(!Value::from("x").is_empty());
        assert!(!Value::List(vec![Value::from("")]).is_empty());
    }

    #[test]
    fn test_record_accessors() {
        let mut record = Record::new(7)
            .with(TYPE_FIELD, "article")
            .with(POST_TYPE_FIELD, "dbbooks");

        assert_eq!(record.record_type(), Some("article"));
        assert_eq!(record.post_type(), Some("dbbooks"));
        assert!(record.has("type"));

        assert_eq!(record.unset("type"), Some(Value::from("article")));
        assert_eq!(record.record_type(), None);
    }
}
