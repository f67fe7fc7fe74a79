//! Batch controller.
//!
//! A batch is a multi-step, confirm-then-execute bulk operation over the
//! records matched by a search. [`BatchRunner::run`] drives one step:
//!
//! ```text
//! create request ─▶ execute ─▶ validate/filter ─▶ re-execute
//!     ─▶ before_process (form? confirm?) ─▶ process each record ─▶ after_process
//! ```
//!
//! Each call either stops early with the [`RunOutcome`] the caller must act
//! on (show a form, ask for confirmation, report an empty search) or runs the
//! batch to completion. The concrete batches only supply their parameter
//! checks and the per-record `process`.

pub mod change_author;
pub mod change_status;
pub mod delete;
pub mod move_to_database;
pub mod search;
pub mod search_replace;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::{info, warn};

use crate::error::{BatchError, BatchResult};
use crate::record::Record;
use crate::replace::OptionLayout;

pub use change_author::ChangeAuthor;
pub use change_status::ChangeStatus;
pub use delete::Delete;
pub use move_to_database::MoveToDatabase;
pub use search::{Bucket, CodeTables, Database, Filter, SearchEngine, SearchRequest, SearchResponse, Store};
pub use search_replace::SearchReplace;

/// Names of the available batches.
pub const BATCH_NAMES: [&str; 5] = [
    Delete::NAME,
    ChangeStatus::NAME,
    ChangeAuthor::NAME,
    MoveToDatabase::NAME,
    SearchReplace::NAME,
];

/// Tunables shared by all batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Repeatable fields that get one typed field per code of their `type` table.
    pub typed_fields: Vec<String>,
    /// Presentation of the search/replace field picker.
    pub option_layout: OptionLayout,
    /// Emit a progress notice every this many records (0 disables).
    pub progress_every: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            typed_fields: ["topic", "number", "date", "content", "extent", "relation"]
                .map(String::from)
                .to_vec(),
            option_layout: OptionLayout::Flat,
            progress_every: 100,
        }
    }
}

/// Create the batch registered under `name`.
///
/// # Errors
///
/// Returns [`BatchError::UnknownBatch`] for any other name.
pub fn create(name: &str, settings: &BatchSettings) -> BatchResult<Box<dyn Batch>> {
    let batch: Box<dyn Batch> = match name {
        Delete::NAME => Box::new(Delete::default()),
        ChangeStatus::NAME => Box::new(ChangeStatus::default()),
        ChangeAuthor::NAME => Box::new(ChangeAuthor::default()),
        MoveToDatabase::NAME => Box::new(MoveToDatabase::default()),
        SearchReplace::NAME => Box::new(SearchReplace::new(
            settings.typed_fields.clone(),
            settings.option_layout,
        )),
        other => return Err(BatchError::UnknownBatch(other.to_owned())),
    };
    Ok(batch)
}

/// User-submitted parameters of a batch step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Json>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; `null` gives empty parameters.
    ///
    /// # Errors
    ///
    /// Fails if `value` is neither an object nor `null`.
    pub fn from_json(value: Json) -> BatchResult<Self> {
        match value {
            Json::Null => Ok(Self::new()),
            other => Ok(serde_json::from_value(other)?),
        }
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Json>) -> Self {
        self.0.insert(name.to_owned(), value.into());
        self
    }

    /// Whether the parameter is present with a non-empty value.
    pub fn has(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(|value| match value {
            Json::Null => false,
            Json::Bool(flag) => *flag,
            Json::Number(n) => n.as_i64() != Some(0),
            Json::String(s) => !s.is_empty() && s != "0",
            Json::Array(items) => !items.is_empty(),
            Json::Object(fields) => !fields.is_empty(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&Json> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Json::as_str)
    }

    /// Validation chatter is not reported in silent mode.
    pub fn is_silent(&self) -> bool {
        self.has("silent")
    }

    pub fn is_confirmed(&self) -> bool {
        self.has("confirm")
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
}

/// A message for the operator, collected while a batch step runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

/// What a batch needs while it runs: the backend, the parameters and the
/// notice sink.
pub struct Context<'a> {
    pub store: &'a mut dyn Store,
    pub parameters: &'a Parameters,
    notices: Vec<Notice>,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a mut dyn Store, parameters: &'a Parameters) -> Self {
        Self {
            store,
            parameters,
            notices: Vec::new(),
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            level: Level::Info,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            level: Level::Warning,
            message: message.into(),
        });
    }

    /// Report a validation message unless the parameters ask for silence.
    pub fn report(&mut self, message: impl Into<String>) {
        if !self.parameters.is_silent() {
            self.info(message);
        }
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

/// Result of [`Batch::before_process`].
#[derive(Debug, Clone, PartialEq)]
pub enum Prepare {
    /// Parameters are complete and confirmed.
    Proceed,
    /// Parameters are missing; show this form.
    Form(Json),
    /// Parameters are complete; show this summary and ask for confirmation.
    Confirm(Json),
}

/// Counters of a completed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub batch: String,
    /// Records loaded and handed to the batch.
    pub processed: u64,
    /// Records the batch changed, moved or deleted.
    pub modified: u64,
    pub notices: Vec<Notice>,
}

/// How a batch step ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum RunOutcome {
    /// No `search` parameter was given.
    NoSearchRequest,
    SearchError { message: String },
    NoResults { notices: Vec<Notice> },
    /// Nothing left that the batch may act on.
    ValidateFailed { notices: Vec<Notice> },
    Form { hits: u64, form: Json, notices: Vec<Notice> },
    Confirm { hits: u64, form: Json, notices: Vec<Notice> },
    Completed(Summary),
}

/// One bulk operation.
pub trait Batch {
    /// Identifier used to select the batch.
    fn name(&self) -> &'static str;

    fn label(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Capability an operator needs to run the batch.
    fn capability(&self) -> &'static str {
        "manage_options"
    }

    /// Add batch-specific counts or filters to the initial request.
    fn create_search_request(&self, _parameters: &Parameters, _request: &mut SearchRequest) {}

    /// Refine the request from the initial response. Returning `false` stops
    /// the run.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameters.
    fn validate_request(
        &mut self,
        _ctx: &mut Context<'_>,
        _request: &mut SearchRequest,
        _response: &SearchResponse,
    ) -> BatchResult<bool> {
        Ok(true)
    }

    /// Check parameters and confirmation before any record is touched.
    ///
    /// # Errors
    ///
    /// Fails on invalid parameters.
    fn before_process(&mut self, ctx: &mut Context<'_>, response: &SearchResponse) -> BatchResult<Prepare>;

    /// Handle one record. Returning `false` aborts the rest of the batch.
    ///
    /// # Errors
    ///
    /// Fails if the backend rejects a write.
    fn process(&mut self, ctx: &mut Context<'_>, record: Record) -> BatchResult<bool>;

    /// Report and return the number of records changed.
    fn after_process(&mut self, ctx: &mut Context<'_>) -> u64;
}

/// Drives a [`Batch`] against a [`Store`].
pub struct BatchRunner<'a> {
    store: &'a mut dyn Store,
    progress_every: u64,
}

impl<'a> BatchRunner<'a> {
    pub fn new(store: &'a mut dyn Store) -> Self {
        Self {
            store,
            progress_every: BatchSettings::default().progress_every,
        }
    }

    #[must_use]
    pub fn with_progress_every(mut self, every: u64) -> Self {
        self.progress_every = every;
        self
    }

    /// Run one step of `batch` with `parameters`.
    ///
    /// # Errors
    ///
    /// Configuration errors raised by the batch (for example an unknown field
    /// in a search/replace operation) and backend write failures stop the
    /// run. Search failures and unreadable records do not: they are reported
    /// through the outcome.
    pub fn run(&mut self, batch: &mut dyn Batch, parameters: &Parameters) -> BatchResult<RunOutcome> {
        info!(batch = batch.name(), "batch step started");
        let Some(request) = parameters.get("search") else {
            return Ok(RunOutcome::NoSearchRequest);
        };
        let mut request: SearchRequest = match serde_json::from_value(request.clone()) {
            Ok(request) => request,
            Err(err) => {
                return Ok(RunOutcome::SearchError {
                    message: err.to_string(),
                });
            }
        };
        batch.create_search_request(parameters, &mut request);

        let mut ctx = Context::new(&mut *self.store, parameters);
        let response = match ctx.store.execute(&request) {
            Ok(response) => response,
            Err(err) => return Ok(search_error(&err)),
        };
        if response.hits == 0 {
            return Ok(RunOutcome::NoResults {
                notices: ctx.take_notices(),
            });
        }

        let valid = validate_collections(&mut ctx, &mut request, &response)
            && batch.validate_request(&mut ctx, &mut request, &response)?;
        if !ctx.notices().is_empty() && !parameters.is_silent() {
            ctx.notices.insert(
                0,
                Notice {
                    level: Level::Info,
                    message: format!("Your search returns {} hit(s).", response.hits),
                },
            );
        }
        if !valid {
            return Ok(RunOutcome::ValidateFailed {
                notices: ctx.take_notices(),
            });
        }

        let response = match ctx.store.execute(&request) {
            Ok(response) => response,
            Err(err) => return Ok(search_error(&err)),
        };
        if response.hits == 0 {
            return Ok(RunOutcome::NoResults {
                notices: ctx.take_notices(),
            });
        }

        match batch.before_process(&mut ctx, &response)? {
            Prepare::Proceed => {}
            Prepare::Form(form) => {
                return Ok(RunOutcome::Form {
                    hits: response.hits,
                    form,
                    notices: ctx.take_notices(),
                });
            }
            Prepare::Confirm(form) => {
                return Ok(RunOutcome::Confirm {
                    hits: response.hits,
                    form,
                    notices: ctx.take_notices(),
                });
            }
        }

        let ids = match ctx.store.cursor(&request) {
            Ok(ids) => ids,
            Err(err) => return Ok(search_error(&err)),
        };
        let mut processed = 0;
        for id in ids {
            let record = match ctx.store.load(id) {
                Ok(record) => record,
                Err(err) => {
                    warn!(id, error = %err, "record skipped");
                    ctx.warn(format!(
                        "Error loading record {id} ({err}), the search index may be out of sync. Record skipped."
                    ));
                    continue;
                }
            };

            processed += 1;
            if self.progress_every > 0 && processed % self.progress_every == 0 {
                ctx.info(format!("{processed} records processed..."));
            }

            let managed = record
                .post_type()
                .is_some_and(|post_type| ctx.store.database(post_type).is_some());
            if !managed {
                warn!(id, "not a managed record");
                ctx.warn(format!("Record {id} is not a managed record, skipped."));
                continue;
            }

            if !batch.process(&mut ctx, record)? {
                ctx.warn("Processing returned false, batch interrupted.");
                break;
            }
        }

        let modified = batch.after_process(&mut ctx);
        info!(batch = batch.name(), processed, modified, "batch completed");
        Ok(RunOutcome::Completed(Summary {
            batch: batch.name().to_owned(),
            processed,
            modified,
            notices: ctx.take_notices(),
        }))
    }
}

fn search_error(err: &BatchError) -> RunOutcome {
    warn!(error = %err, "search request failed");
    RunOutcome::SearchError {
        message: err.to_string(),
    }
}

/// Restrict the request to the collections backed by a managed database.
fn validate_collections(ctx: &mut Context<'_>, request: &mut SearchRequest, response: &SearchResponse) -> bool {
    let mut managed = Vec::new();
    for bucket in &response.collections {
        if ctx.store.database(&bucket.key).is_some() {
            managed.push(bucket.key.clone());
            continue;
        }
        let label = if bucket.label.is_empty() {
            &bucket.key
        } else {
            &bucket.label
        };
        ctx.report(format!(
            "Added a filter to exclude {} hit(s) of type {label}.",
            bucket.count
        ));
    }

    if managed.is_empty() {
        ctx.info("There are no managed records left in the results, cannot continue.");
        return false;
    }
    request.collections = managed;
    true
}

/// Hit count line used by the forms and confirmations.
pub(crate) fn hits_message(hits: u64, action: &str) -> String {
    format!("You are about to {action} {hits} record(s).")
}
