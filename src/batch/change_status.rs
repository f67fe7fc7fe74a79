//! Change the publication status of the selected records.

use serde_json::json;

use crate::batch::{Batch, Context, Filter, Parameters, Prepare, SearchRequest, SearchResponse, hits_message};
use crate::error::BatchResult;
use crate::record::Record;

const STATUS: &str = "status";
const STATUS_COUNT: &str = "status-count";

/// Statuses offered by the form.
pub const STATUSES: [&str; 4] = ["publish", "pending", "draft", "private"];

#[derive(Debug, Default)]
pub struct ChangeStatus {
    status: String,
    modified: u64,
}

impl ChangeStatus {
    pub const NAME: &'static str = "change-status";

    fn form(parameters: &Parameters, message: String) -> serde_json::Value {
        json!({
            "message": message,
            "fields": [{
                "name": STATUS,
                "label": "New status",
                "description": "Choose the new status from the list.",
                "options": STATUSES,
                "value": parameters.get_str(STATUS).unwrap_or("publish"),
            }],
        })
    }
}

impl Batch for ChangeStatus {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn label(&self) -> &'static str {
        "Change status"
    }

    fn description(&self) -> &'static str {
        "Changes the publication status of the selected records."
    }

    fn capability(&self) -> &'static str {
        "docalist_batch_change_status"
    }

    fn create_search_request(&self, parameters: &Parameters, request: &mut SearchRequest) {
        if let Some(status) = parameters.get_str(STATUS).filter(|_| parameters.has(STATUS)) {
            request.add_count(STATUS_COUNT, Filter::term(STATUS, status));
        }
    }

    fn validate_request(
        &mut self,
        ctx: &mut Context<'_>,
        request: &mut SearchRequest,
        response: &SearchResponse,
    ) -> BatchResult<bool> {
        let Some(status) = ctx.parameters.get_str(STATUS).filter(|_| ctx.parameters.has(STATUS)) else {
            return Ok(true);
        };
        let count = response.count(STATUS_COUNT);
        if count > 0 {
            request.add_filter(Filter::term(STATUS, status).exclude());
            ctx.report(format!(
                "Added a filter to exclude {count} record(s) already in status {status}."
            ));
        }
        Ok(true)
    }

    fn before_process(&mut self, ctx: &mut Context<'_>, response: &SearchResponse) -> BatchResult<Prepare> {
        let message = hits_message(response.hits, "change the status of");
        let Some(status) = ctx.parameters.get_str(STATUS).filter(|_| ctx.parameters.has(STATUS)) else {
            return Ok(Prepare::Form(Self::form(ctx.parameters, message)));
        };
        if !ctx.parameters.is_confirmed() {
            return Ok(Prepare::Confirm(Self::form(ctx.parameters, message)));
        }
        status.clone_into(&mut self.status);
        self.modified = 0;
        Ok(Prepare::Proceed)
    }

    fn process(&mut self, ctx: &mut Context<'_>, mut record: Record) -> BatchResult<bool> {
        record.set(STATUS, self.status.as_str());
        ctx.store.save(record)?;
        self.modified += 1;
        Ok(true)
    }

    fn after_process(&mut self, ctx: &mut Context<'_>) -> u64 {
        ctx.info(format!("Status changed for {} record(s).", self.modified));
        self.modified
    }
}
