//! In-memory backend.
//!
//! [`MemoryStore`] implements every collaborator contract of the batch
//! controller over a JSON document:
//!
//! ```json
//! {
//!   "databases": [
//!     {"post_type": "dbbooks", "label": "Books", "types": [...], "records": [...]}
//!   ],
//!   "tables": {"topic-type": ["free", "geo"]}
//! }
//! ```
//!
//! Collections with `"managed": false` are searchable but never modified,
//! like content the batches do not own.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::search::{
    Bucket, CodeTables, Database, SearchEngine, SearchRequest, SearchResponse, Store,
};
use crate::error::{BatchError, BatchResult};
use crate::record::{POST_TYPE_FIELD, Record, RecordId};
use crate::schema::{Schema, SchemaSource};
use crate::util::atomic::write_json;

fn managed_default() -> bool {
    true
}

/// One collection of records sharing a set of record type schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDatabase {
    pub post_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "managed_default")]
    pub managed: bool,
    /// Schemas of the record types the database declares.
    #[serde(default)]
    pub types: Vec<Schema>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl MemoryDatabase {
    pub fn new(post_type: &str, label: &str) -> Self {
        Self {
            post_type: post_type.to_owned(),
            label: label.to_owned(),
            managed: true,
            types: Vec::new(),
            records: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, schema: Schema) -> Self {
        self.types.push(schema);
        self
    }

    #[must_use]
    pub fn with_record(mut self, mut record: Record) -> Self {
        record.set(POST_TYPE_FIELD, self.post_type.as_str());
        self.records.push(record);
        self
    }

    #[must_use]
    pub fn unmanaged(mut self) -> Self {
        self.managed = false;
        self
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    fn label_or_key(&self) -> &str {
        if self.label.is_empty() {
            &self.post_type
        } else {
            &self.label
        }
    }
}

impl SchemaSource for MemoryDatabase {
    fn schema(&self, record_type: &str) -> Option<&Schema> {
        self.types.iter().find(|schema| schema.name == record_type)
    }
}

impl Database for MemoryDatabase {
    fn post_type(&self) -> &str {
        &self.post_type
    }

    fn label(&self) -> &str {
        self.label_or_key()
    }

    fn types(&self) -> Vec<String> {
        self.types.iter().map(|schema| schema.name.clone()).collect()
    }

    fn save(&mut self, mut record: Record) -> BatchResult<()> {
        record.set(POST_TYPE_FIELD, self.post_type.as_str());
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        Ok(())
    }

    fn delete(&mut self, id: RecordId) -> BatchResult<()> {
        let index = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or(BatchError::RecordNotFound { id })?;
        self.records.remove(index);
        debug!(id, database = self.post_type, "record deleted");
        Ok(())
    }
}

/// Databases and code tables held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub databases: Vec<MemoryDatabase>,
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_database(mut self, database: MemoryDatabase) -> Self {
        self.databases.push(database);
        self
    }

    #[must_use]
    pub fn with_table(mut self, name: &str, codes: &[&str]) -> Self {
        self.tables
            .insert(name.to_owned(), codes.iter().map(|&code| code.to_owned()).collect());
        self
    }

    /// Build from a store document, stamping each record with its post type.
    ///
    /// # Errors
    ///
    /// Fails if the document does not have the store layout.
    pub fn from_json(value: serde_json::Value) -> BatchResult<Self> {
        let mut store: Self = serde_json::from_value(value)?;
        for database in &mut store.databases {
            for record in &mut database.records {
                record.set(POST_TYPE_FIELD, database.post_type.as_str());
            }
        }
        Ok(store)
    }

    /// Read a store file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read store {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("invalid JSON in store {}", path.display()))?;
        Self::from_json(value).with_context(|| format!("invalid store {}", path.display()))
    }

    /// Atomically write the store file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_file(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    /// Find a record in any collection, managed or not.
    pub fn find(&self, id: RecordId) -> Option<&Record> {
        self.databases.iter().find_map(|database| database.record(id))
    }

    fn managed(&self, post_type: &str) -> Option<&MemoryDatabase> {
        self.databases
            .iter()
            .find(|database| database.managed && database.post_type == post_type)
    }

    fn matches<'a>(
        &'a self,
        request: &'a SearchRequest,
    ) -> BatchResult<impl Iterator<Item = (&'a MemoryDatabase, &'a Record)> + 'a> {
        for collection in &request.collections {
            if !self.databases.iter().any(|d| &d.post_type == collection) {
                return Err(BatchError::UnknownDatabase(collection.clone()));
            }
        }
        Ok(self.databases.iter().flat_map(move |database| {
            database
                .records
                .iter()
                .filter(move |record| request.matches(&database.post_type, record))
                .map(move |record| (database, record))
        }))
    }
}

fn bump(buckets: &mut Vec<Bucket>, key: &str, label: &str) -> usize {
    let index = match buckets.iter().position(|bucket| bucket.key == key) {
        Some(index) => index,
        None => {
            buckets.push(Bucket {
                key: key.to_owned(),
                label: label.to_owned(),
                ..Bucket::default()
            });
            buckets.len() - 1
        }
    };
    buckets[index].count += 1;
    index
}

impl SearchEngine for MemoryStore {
    fn execute(&self, request: &SearchRequest) -> BatchResult<SearchResponse> {
        let mut response = SearchResponse::default();
        for name in request.counts.keys() {
            response.counts.insert(name.clone(), 0);
        }

        for (database, record) in self.matches(request)? {
            response.hits += 1;
            bump(&mut response.collections, &database.post_type, database.label_or_key());

            let record_type = record.record_type().unwrap_or_default();
            let index = bump(&mut response.types, record_type, record_type);
            bump(
                &mut response.types[index].collections,
                &database.post_type,
                database.label_or_key(),
            );

            for (name, filter) in &request.counts {
                if filter.matches(record) {
                    *response.counts.entry(name.clone()).or_default() += 1;
                }
            }
        }
        debug!(hits = response.hits, "search executed");
        Ok(response)
    }

    fn cursor(&self, request: &SearchRequest) -> BatchResult<Vec<RecordId>> {
        Ok(self.matches(request)?.map(|(_, record)| record.id).collect())
    }
}

impl CodeTables for MemoryStore {
    fn codes(&self, name: &str) -> Option<Vec<String>> {
        self.tables.get(name).cloned()
    }
}

impl Store for MemoryStore {
    fn post_types(&self) -> Vec<String> {
        self.databases
            .iter()
            .filter(|database| database.managed)
            .map(|database| database.post_type.clone())
            .collect()
    }

    fn database(&self, post_type: &str) -> Option<&dyn Database> {
        self.managed(post_type).map(|database| database as &dyn Database)
    }

    fn database_mut(&mut self, post_type: &str) -> Option<&mut dyn Database> {
        self.databases
            .iter_mut()
            .find(|database| database.managed && database.post_type == post_type)
            .map(|database| database as &mut dyn Database)
    }

    fn load(&self, id: RecordId) -> BatchResult<Record> {
        self.find(id).cloned().ok_or(BatchError::RecordNotFound { id })
    }

    fn save(&mut self, record: Record) -> BatchResult<()> {
        let post_type = record.post_type().unwrap_or_default().to_owned();
        if self.managed(&post_type).is_none() {
            return Err(BatchError::UnknownDatabase(post_type));
        }

        // A record lives in a single collection.
        for database in &mut self.databases {
            if database.post_type != post_type {
                database.records.retain(|r| r.id != record.id);
            }
        }
        self.database_mut(&post_type)
            .ok_or_else(|| BatchError::UnknownDatabase(post_type.clone()))?
            .save(record)
    }
}
