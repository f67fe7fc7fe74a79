//! Permanently delete the selected records.

use serde_json::json;

use crate::batch::{Batch, Context, Prepare, SearchResponse, hits_message};
use crate::error::{BatchError, BatchResult};
use crate::record::Record;

#[derive(Debug, Default)]
pub struct Delete {
    deleted: u64,
}

impl Delete {
    pub const NAME: &'static str = "delete";
}

impl Batch for Delete {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn label(&self) -> &'static str {
        "Delete all"
    }

    fn description(&self) -> &'static str {
        "Permanently deletes the selected records."
    }

    fn capability(&self) -> &'static str {
        "docalist_batch_delete"
    }

    fn before_process(&mut self, ctx: &mut Context<'_>, response: &SearchResponse) -> BatchResult<Prepare> {
        if !ctx.parameters.is_confirmed() {
            return Ok(Prepare::Confirm(json!({
                "message": hits_message(response.hits, "permanently delete"),
            })));
        }
        self.deleted = 0;
        Ok(Prepare::Proceed)
    }

    fn process(&mut self, ctx: &mut Context<'_>, record: Record) -> BatchResult<bool> {
        let post_type = record.post_type().unwrap_or_default().to_owned();
        let database = ctx
            .store
            .database_mut(&post_type)
            .ok_or(BatchError::UnknownDatabase(post_type))?;
        database.delete(record.id)?;
        self.deleted += 1;
        Ok(true)
    }

    fn after_process(&mut self, ctx: &mut Context<'_>) -> u64 {
        ctx.info(format!("{} record(s) deleted.", self.deleted));
        self.deleted
    }
}
