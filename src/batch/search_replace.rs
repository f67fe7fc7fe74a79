//! Search and replace in the fields of the selected records.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::batch::{Batch, Context, Prepare, SearchResponse, Store, hits_message};
use crate::error::BatchResult;
use crate::record::{Record, TYPE_FIELD};
use crate::replace::field::TYPE_SUBFIELD;
use crate::replace::{FieldsBuilder, Operation, OptionLayout};

/// One row of the `operations` parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OperationRow {
    pub field: String,
    pub search: String,
    pub replace: String,
}

impl OperationRow {
    fn is_blank(&self) -> bool {
        self.field.is_empty() && self.search.is_empty() && self.replace.is_empty()
    }
}

pub struct SearchReplace {
    typed_fields: Vec<String>,
    layout: OptionLayout,
    operations: Vec<Operation>,
    modified: u64,
}

impl SearchReplace {
    pub const NAME: &'static str = "search-replace";

    pub fn new(typed_fields: Vec<String>, layout: OptionLayout) -> Self {
        Self {
            typed_fields,
            layout,
            operations: Vec::new(),
            modified: 0,
        }
    }

    /// Operations validated by the last [`Batch::before_process`].
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

/// Build the field registry for the record types of a search response.
///
/// Each record type contributes the fields of its schema in every managed
/// database holding records of that type. The configured typed bases then
/// get one typed field per code of the table behind their `type` sub-field.
///
/// # Errors
///
/// Fails on an inconsistent schema.
pub fn fields_for_response(
    store: &dyn Store,
    response: &SearchResponse,
    typed_fields: &[String],
) -> BatchResult<FieldsBuilder> {
    let mut builder = FieldsBuilder::new();
    let mut tables: Vec<(String, BTreeSet<String>)> = Vec::new();

    for type_bucket in &response.types {
        let reference = Record::new(0).with(TYPE_FIELD, type_bucket.key.as_str());
        for collection in &type_bucket.collections {
            let Some(database) = store.database(&collection.key) else {
                warn!(collection = collection.key, "database not found");
                continue;
            };
            builder.add_fields_from_record(&reference, database)?;

            let Some(schema) = database.schema(&type_bucket.key) else {
                continue;
            };
            for base in typed_fields {
                let Some(table) = schema
                    .field(base)
                    .and_then(|field| field.field(TYPE_SUBFIELD))
                    .and_then(|field| field.table.as_deref())
                else {
                    continue;
                };
                // Table references may carry a "kind:" prefix.
                let table = table.rsplit(':').next().unwrap_or(table).to_owned();
                match tables.iter_mut().find(|(name, _)| name == base) {
                    Some((_, names)) => {
                        names.insert(table);
                    }
                    None => tables.push((base.clone(), BTreeSet::from([table]))),
                }
            }
        }
    }

    for (base, names) in tables {
        let codes: BTreeSet<String> = names
            .iter()
            .filter_map(|name| store.codes(name))
            .flatten()
            .collect();
        debug!(field = base, codes = codes.len(), "adding typed fields");
        builder.add_typed_fields(&base, codes)?;
    }
    Ok(builder)
}

/// Turn the submitted rows into operations, skipping blank rows.
///
/// # Errors
///
/// Returns [`BatchError::UnknownField`](crate::BatchError::UnknownField) for
/// a field that is not in the registry, and the errors of
/// [`Fields::operation`](crate::replace::Fields::operation).
pub fn parse_operations(builder: &FieldsBuilder, rows: &[OperationRow]) -> BatchResult<Vec<Operation>> {
    let fields = builder.fields();
    rows.iter()
        .filter(|row| !row.is_blank())
        .map(|row| {
            let id = fields.resolve(&row.field)?;
            fields.operation(id, &row.search, &row.replace)
        })
        .collect()
}

impl Batch for SearchReplace {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn label(&self) -> &'static str {
        "Search and replace"
    }

    fn description(&self) -> &'static str {
        "Searches, replaces, injects or clears values in the fields of the selected records."
    }

    fn capability(&self) -> &'static str {
        "docalist_batch_search_replace"
    }

    fn before_process(&mut self, ctx: &mut Context<'_>, response: &SearchResponse) -> BatchResult<Prepare> {
        let builder = fields_for_response(&*ctx.store, response, &self.typed_fields)?;
        let rows: Vec<OperationRow> = match ctx.parameters.get("operations") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => Vec::new(),
        };
        self.operations = parse_operations(&builder, &rows)?;

        let message = hits_message(response.hits, "search and replace in");
        let options = builder.fields().select_options(self.layout);
        if self.operations.is_empty() {
            return Ok(Prepare::Form(json!({
                "message": message,
                "fields": options,
            })));
        }
        if !ctx.parameters.is_confirmed() {
            let explanations: Vec<&str> = self.operations.iter().map(Operation::explanation).collect();
            return Ok(Prepare::Confirm(json!({
                "message": message,
                "fields": options,
                "operations": explanations,
            })));
        }
        self.modified = 0;
        Ok(Prepare::Proceed)
    }

    fn process(&mut self, ctx: &mut Context<'_>, mut record: Record) -> BatchResult<bool> {
        let mut changed = false;
        for operation in &self.operations {
            changed |= operation.process(&mut record);
        }
        if changed {
            debug!(id = record.id, "record modified");
            ctx.store.save(record)?;
            self.modified += 1;
        }
        Ok(true)
    }

    fn after_process(&mut self, ctx: &mut Context<'_>) -> u64 {
        ctx.info(format!("{} record(s) modified.", self.modified));
        self.modified
    }
}
