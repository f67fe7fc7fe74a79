//! Schema reflection descriptors.
//!
//! A [`Schema`] describes the fields of one record type: name, declared value
//! kind, collection flag and, for composites, the child descriptors. Schemas
//! are supplied by the database collaborator; the search/replace registry only
//! reads them.

use serde::{Deserialize, Serialize};

/// Declared value kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaKind {
    /// Object with named sub-fields.
    Composite,
    /// Entry picked from a code table.
    Enumerated,
    Date,
    /// Free text.
    Text,
    #[default]
    Other,
}

/// One field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(default)]
    pub kind: SchemaKind,
    /// True when the field holds a sequence of values.
    #[serde(default)]
    pub collection: bool,
    /// Code table backing an enumerated field (e.g. the `type` of a topic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SchemaField>,
}

impl SchemaField {
    pub fn new(name: &str, kind: SchemaKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            collection: false,
            table: None,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn repeatable(mut self) -> Self {
        self.collection = true;
        self
    }

    #[must_use]
    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_owned());
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Schema of one record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Record type name.
    pub name: String,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Source of record schemas, keyed by record type.
pub trait SchemaSource {
    fn schema(&self, record_type: &str) -> Option<&Schema>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_from_json_defaults() {
        let schema: Schema = serde_json::from_value(json!({
            "name": "article",
            "fields": [
                {"name": "title", "kind": "text"},
                {"name": "topic", "kind": "composite", "collection": true, "fields": [
                    {"name": "type", "kind": "enumerated", "table": "topics"},
                    {"name": "value", "kind": "enumerated", "collection": true}
                ]},
                {"name": "misc"}
            ]
        }))
        .expect("parse schema");

        assert_eq!(schema.field("misc").map(|f| f.kind), Some(SchemaKind::Other));
        let topic = schema.field("topic").expect("topic");
        assert!(topic.collection);
        assert!(topic.has_fields());
        assert_eq!(
            topic.field("type").and_then(|f| f.table.as_deref()),
            Some("topics")
        );
    }
}
