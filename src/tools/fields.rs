//! Fields tool: list the fields search/replace can target.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{ToolCallResult, ToolDefinition};
use crate::server::ServerConfig;
use crate::store::MemoryStore;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FieldsParams {
    /// Restrict to these record types.
    pub types: Vec<String>,
}

pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "fields".to_owned(),
        description: "List the fields available for search/replace, as picker options \
            (key and label), for the record types present in the store."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "types": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Only include these record types (default: all)"
                }
            }
        }),
    }
}

pub fn execute(config: &ServerConfig, store: &MemoryStore, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: FieldsParams = if arguments.is_null() {
        FieldsParams::default()
    } else {
        serde_json::from_value(arguments).context("invalid fields parameters")?
    };

    let builder = super::registry(config, store, &params.types)?;
    super::json_result(&builder.fields().select_options(config.batch.option_layout))
}
