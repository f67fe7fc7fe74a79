//! Change the author account of the selected records.

use serde_json::json;

use crate::batch::{Batch, Context, Filter, Parameters, Prepare, SearchRequest, SearchResponse, hits_message};
use crate::error::BatchResult;
use crate::record::Record;

const CREATED_BY: &str = "createdBy";
const USER_COUNT: &str = "user-count";

#[derive(Debug, Default)]
pub struct ChangeAuthor {
    created_by: String,
    modified: u64,
}

impl ChangeAuthor {
    pub const NAME: &'static str = "change-author";

    fn author(parameters: &Parameters) -> Option<String> {
        if !parameters.has(CREATED_BY) {
            return None;
        }
        // Accounts may be submitted as login or numeric id.
        match parameters.get(CREATED_BY)? {
            serde_json::Value::String(login) => Some(login.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

impl Batch for ChangeAuthor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn label(&self) -> &'static str {
        "Change author"
    }

    fn description(&self) -> &'static str {
        "Changes the author account of the selected records."
    }

    fn capability(&self) -> &'static str {
        "docalist_batch_change_author"
    }

    fn create_search_request(&self, parameters: &Parameters, request: &mut SearchRequest) {
        if let Some(author) = Self::author(parameters) {
            request.add_count(USER_COUNT, Filter::term(CREATED_BY, &author));
        }
    }

    fn validate_request(
        &mut self,
        ctx: &mut Context<'_>,
        request: &mut SearchRequest,
        response: &SearchResponse,
    ) -> BatchResult<bool> {
        let Some(author) = Self::author(ctx.parameters) else {
            return Ok(true);
        };
        let count = response.count(USER_COUNT);
        if count > 0 {
            request.add_filter(Filter::term(CREATED_BY, &author).exclude());
            ctx.report(format!(
                "Added a filter to exclude {count} record(s) already created by {author}."
            ));
        }
        Ok(true)
    }

    fn before_process(&mut self, ctx: &mut Context<'_>, response: &SearchResponse) -> BatchResult<Prepare> {
        let author = Self::author(ctx.parameters);
        let form = json!({
            "message": hits_message(response.hits, "change the author of"),
            "fields": [{
                "name": CREATED_BY,
                "label": "New author",
                "description": "Login of the account the records will be assigned to.",
                "value": author,
            }],
        });
        let Some(author) = author else {
            return Ok(Prepare::Form(form));
        };
        if !ctx.parameters.is_confirmed() {
            return Ok(Prepare::Confirm(form));
        }
        self.created_by = author;
        self.modified = 0;
        Ok(Prepare::Proceed)
    }

    fn process(&mut self, ctx: &mut Context<'_>, mut record: Record) -> BatchResult<bool> {
        record.set(CREATED_BY, self.created_by.as_str());
        ctx.store.save(record)?;
        self.modified += 1;
        Ok(true)
    }

    fn after_process(&mut self, ctx: &mut Context<'_>) -> u64 {
        ctx.info(format!("Author changed for {} record(s).", self.modified));
        self.modified
    }
}
