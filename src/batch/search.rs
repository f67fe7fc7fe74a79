//! Collaborator contracts consumed by the batch controller.
//!
//! A batch never talks to a concrete backend: it builds a [`SearchRequest`],
//! reads the aggregations of the [`SearchResponse`] and loads, saves or
//! deletes records through a [`Store`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BatchResult;
use crate::record::{Record, RecordId, Value};
use crate::schema::SchemaSource;

/// A search filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// Field holds `value`, as a whole value or as one of its occurrences.
    Term { field: String, value: String },
    Not(Box<Filter>),
}

impl Filter {
    pub fn term(field: &str, value: &str) -> Self {
        Self::Term {
            field: field.to_owned(),
            value: value.to_owned(),
        }
    }

    /// Filter matching the records this one does not match.
    #[must_use]
    pub fn exclude(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Term { field, value } => match record.get(field) {
                Some(Value::List(items)) => items.iter().any(|item| item.is_text(value)),
                Some(other) => other.is_text(value),
                None => false,
            },
            Self::Not(inner) => !inner.matches(record),
        }
    }
}

/// Query selecting the records a batch acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Restrict to these collections (database post types); empty means all.
    pub collections: Vec<String>,
    /// Restrict to these record types; empty means all.
    pub types: Vec<String>,
    /// Restrict to these record ids; empty means all.
    pub ids: Vec<RecordId>,
    /// All filters must match.
    pub filters: Vec<Filter>,
    /// Named filters whose match counts are reported in the response.
    pub counts: BTreeMap<String, Filter>,
}

impl SearchRequest {
    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn add_count(&mut self, name: &str, filter: Filter) {
        self.counts.insert(name.to_owned(), filter);
    }

    /// Whether `record`, stored in `collection`, satisfies the request.
    pub fn matches(&self, collection: &str, record: &Record) -> bool {
        (self.collections.is_empty() || self.collections.iter().any(|c| c == collection))
            && (self.types.is_empty()
                || record
                    .record_type()
                    .is_some_and(|t| self.types.iter().any(|wanted| wanted == t)))
            && (self.ids.is_empty() || self.ids.contains(&record.id))
            && self.filters.iter().all(|filter| filter.matches(record))
    }
}

/// One aggregation bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    #[serde(default)]
    pub label: String,
    pub count: u64,
    /// Per-collection breakdown, on record type buckets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<Bucket>,
}

/// Hit count and aggregations of an executed [`SearchRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: u64,
    /// Hits per collection.
    pub collections: Vec<Bucket>,
    /// Hits per record type, each with its per-collection breakdown.
    pub types: Vec<Bucket>,
    /// Hits per named count filter of the request.
    pub counts: BTreeMap<String, u64>,
}

impl SearchResponse {
    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).copied().unwrap_or(0)
    }
}

/// Executes search requests.
pub trait SearchEngine {
    /// Run `request` and compute its aggregations.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be executed.
    fn execute(&self, request: &SearchRequest) -> BatchResult<SearchResponse>;

    /// Ids of the matching records, in iteration order.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be executed.
    fn cursor(&self, request: &SearchRequest) -> BatchResult<Vec<RecordId>>;
}

/// One record database.
pub trait Database: SchemaSource {
    /// Post type identifying the database; also its collection name.
    fn post_type(&self) -> &str;

    fn label(&self) -> &str;

    /// Record types the database declares.
    fn types(&self) -> Vec<String>;

    /// Store `record`, replacing any record with the same id.
    ///
    /// # Errors
    ///
    /// Fails if the record cannot be stored.
    fn save(&mut self, record: Record) -> BatchResult<()>;

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::RecordNotFound`](crate::BatchError::RecordNotFound)
    /// if the database has no such record.
    fn delete(&mut self, id: RecordId) -> BatchResult<()>;
}

/// Lookup of code tables (authority lists of discriminator codes).
pub trait CodeTables {
    /// Codes of table `name`, if it exists.
    fn codes(&self, name: &str) -> Option<Vec<String>>;
}

/// Everything a batch needs from the backend.
pub trait Store: SearchEngine + CodeTables {
    /// Post types of the managed databases.
    fn post_types(&self) -> Vec<String>;

    /// Managed database for `post_type`.
    fn database(&self, post_type: &str) -> Option<&dyn Database>;

    fn database_mut(&mut self, post_type: &str) -> Option<&mut dyn Database>;

    /// Load a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::RecordNotFound`](crate::BatchError::RecordNotFound)
    /// if the id no longer designates a record.
    fn load(&self, id: RecordId) -> BatchResult<Record>;

    /// Move or write back `record` into the database named by its post type.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::UnknownDatabase`](crate::BatchError::UnknownDatabase)
    /// if the post type is not a managed database.
    fn save(&mut self, record: Record) -> BatchResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches() {
        let record = Record::new(1)
            .with("status", "publish")
            .with("topics", vec![Value::from("a"), Value::from("b")]);

        assert!(Filter::term("status", "publish").matches(&record));
        assert!(Filter::term("topics", "b").matches(&record));
        assert!(!Filter::term("status", "draft").matches(&record));
        assert!(Filter::term("status", "draft").exclude().matches(&record));
        assert!(!Filter::term("missing", "x").matches(&record));
    }

    #[test]
    fn test_request_from_json() {
        let request: SearchRequest = serde_json::from_value(json!({
            "types": ["article"],
            "filters": [{"not": {"term": {"field": "status", "value": "trash"}}}]
        }))
        .expect("request");

        let record = Record::new(3).with("type", "article").with("status", "publish");
        assert!(request.matches("dbbooks", &record));
        assert!(!request.matches("dbbooks", &record.clone().with("status", "trash")));
        assert!(!request.matches("dbbooks", &record.with("type", "book")));
    }
}
