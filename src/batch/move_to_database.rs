//! Move the selected records to another database.

use serde_json::json;

use crate::batch::{Batch, Context, Filter, Parameters, Prepare, SearchRequest, SearchResponse, hits_message};
use crate::error::{BatchError, BatchResult};
use crate::record::{POST_TYPE_FIELD, Record, TYPE_FIELD};

const DB_COUNT: &str = "db-count";

#[derive(Debug, Default)]
pub struct MoveToDatabase {
    post_type: String,
    modified: u64,
}

impl MoveToDatabase {
    pub const NAME: &'static str = "move-to-database";

    fn destination(parameters: &Parameters) -> Option<&str> {
        parameters
            .get_str(POST_TYPE_FIELD)
            .filter(|_| parameters.has(POST_TYPE_FIELD))
    }
}

impl Batch for MoveToDatabase {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn label(&self) -> &'static str {
        "Move to another database"
    }

    fn description(&self) -> &'static str {
        "Transfers the selected records to another database."
    }

    fn capability(&self) -> &'static str {
        "docalist_batch_move_to_database"
    }

    fn create_search_request(&self, parameters: &Parameters, request: &mut SearchRequest) {
        if let Some(post_type) = Self::destination(parameters) {
            request.add_count(DB_COUNT, Filter::term(POST_TYPE_FIELD, post_type));
        }
    }

    fn validate_request(
        &mut self,
        ctx: &mut Context<'_>,
        request: &mut SearchRequest,
        response: &SearchResponse,
    ) -> BatchResult<bool> {
        let Some(post_type) = Self::destination(ctx.parameters) else {
            return Ok(true);
        };
        let (types, label) = {
            let database = ctx
                .store
                .database(post_type)
                .ok_or_else(|| BatchError::UnknownDatabase(post_type.to_owned()))?;
            (database.types(), database.label().to_owned())
        };

        let mut excluded = Vec::new();
        for bucket in &response.types {
            if types.contains(&bucket.key) {
                continue;
            }
            request.add_filter(Filter::term(TYPE_FIELD, &bucket.key).exclude());
            excluded.push(format!("{} record(s) of type \"{}\"", bucket.count, bucket.key));
        }
        if !excluded.is_empty() {
            ctx.report(format!(
                "Added filters to exclude the record types that do not exist in database \"{label}\": {}.",
                excluded.join(", ")
            ));
        }

        let count = response.count(DB_COUNT);
        if count > 0 {
            request.add_filter(Filter::term(POST_TYPE_FIELD, post_type).exclude());
            ctx.report(format!(
                "Added a filter to exclude {count} record(s) already in database \"{label}\"."
            ));
        }
        Ok(true)
    }

    fn before_process(&mut self, ctx: &mut Context<'_>, response: &SearchResponse) -> BatchResult<Prepare> {
        let destination = Self::destination(ctx.parameters);
        let form = json!({
            "message": hits_message(response.hits, "move"),
            "fields": [{
                "name": POST_TYPE_FIELD,
                "label": "Destination database",
                "description": "Choose from the list.",
                "options": ctx.store.post_types(),
                "value": destination,
            }],
        });
        let Some(post_type) = destination else {
            return Ok(Prepare::Form(form));
        };
        if !ctx.parameters.is_confirmed() {
            return Ok(Prepare::Confirm(form));
        }
        post_type.clone_into(&mut self.post_type);
        self.modified = 0;
        Ok(Prepare::Proceed)
    }

    fn process(&mut self, ctx: &mut Context<'_>, mut record: Record) -> BatchResult<bool> {
        record.set(POST_TYPE_FIELD, self.post_type.as_str());
        // The reference number and its slug belong to the source database.
        record.unset("ref");
        record.unset("slug");
        record.set(
            "lastupdate",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        ctx.store.save(record)?;
        self.modified += 1;
        Ok(true)
    }

    fn after_process(&mut self, ctx: &mut Context<'_>) -> u64 {
        ctx.info(format!(
            "{} record(s) moved to database \"{}\".",
            self.modified, self.post_type
        ));
        self.modified
    }
}
