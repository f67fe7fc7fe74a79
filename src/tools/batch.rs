//! Batch tool: run one step of a batch against the store.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::{self, BATCH_NAMES, BatchRunner, Parameters, RunOutcome};
use crate::record::RecordId;
use super::{ToolCallResult, ToolDefinition};
use crate::server::ServerConfig;
use crate::store::MemoryStore;
use crate::util::diff::record_diff;

#[derive(Debug, Deserialize)]
pub struct BatchParams {
    /// Batch name.
    pub batch: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Changes a dry run would make to one record.
#[derive(Debug, Serialize)]
pub struct Preview {
    pub id: RecordId,
    pub diff: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchReport {
    #[serde(flatten)]
    outcome: RunOutcome,
    dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    previews: Vec<Preview>,
}

pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "batch".to_owned(),
        description: "Run one step of a batch over the records matched by `parameters.search`. \
            Without `confirm` the step stops at the parameter form or the confirmation. \
            Available batches: delete, change-status, change-author, move-to-database, search-replace."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "batch": {
                    "type": "string",
                    "enum": BATCH_NAMES,
                    "description": "Batch to run"
                },
                "parameters": {
                    "type": "object",
                    "description": "search (request object), confirm, silent, and the batch parameters: status, createdBy, posttype or operations"
                }
            },
            "required": ["batch"]
        }),
    }
}

pub fn execute(config: &ServerConfig, store: &mut MemoryStore, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: BatchParams =
        serde_json::from_value(arguments).context("invalid batch parameters")?;
    let parameters =
        Parameters::from_json(params.parameters).context("batch parameters must be an object")?;

    let mut batch = batch::create(&params.batch, &config.batch)?;

    let mut working = if config.dry_run { store.clone() } else { std::mem::take(store) };
    let outcome = BatchRunner::new(&mut working)
        .with_progress_every(config.batch.progress_every)
        .run(batch.as_mut(), &parameters);

    let previews = if config.dry_run {
        previews(store, &working)
    } else {
        *store = working;
        Vec::new()
    };

    // `store` is whole again from here on.
    let outcome = outcome?;

    if let RunOutcome::Completed(summary) = &outcome {
        if !config.dry_run && summary.modified > 0 {
            store.write_file(&config.store_path)?;
            info!(path = %config.store_path.display(), "store saved");
        }
    }

    super::json_result(&BatchReport {
        outcome,
        dry_run: config.dry_run,
        previews,
    })
}

fn previews(before: &MemoryStore, after: &MemoryStore) -> Vec<Preview> {
    let ids: BTreeSet<RecordId> = [before, after]
        .into_iter()
        .flat_map(|store| store.databases.iter())
        .flat_map(|database| database.records.iter().map(|record| record.id))
        .collect();

    ids.into_iter()
        .filter_map(|id| {
            let diff = record_diff(&id.to_string(), before.find(id), after.find(id));
            (!diff.is_empty()).then_some(Preview { id, diff })
        })
        .collect()
}
