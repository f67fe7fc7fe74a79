//! Explain tool: validate search/replace rows and describe what they will do.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::batch::search_replace::{OperationRow, parse_operations};
use crate::replace::Operation;
use super::{ToolCallResult, ToolDefinition};
use crate::server::ServerConfig;
use crate::store::MemoryStore;

#[derive(Debug, Deserialize)]
pub struct ExplainParams {
    pub operations: Vec<OperationRow>,
    /// Record types whose fields are valid targets (default: all).
    #[serde(default)]
    pub types: Vec<String>,
}

pub fn tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "explain".to_owned(),
        description: "Check search/replace operations without running them. Returns one \
            explanation per non-blank row, or the first configuration error."
            .to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "operations": {
                    "type": "array",
                    "description": "Rows of {field, search, replace}; empty search injects, empty replace removes, both empty clears",
                    "items": {
                        "type": "object",
                        "properties": {
                            "field": {"type": "string"},
                            "search": {"type": "string"},
                            "replace": {"type": "string"}
                        },
                        "required": ["field"]
                    }
                },
                "types": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            },
            "required": ["operations"]
        }),
    }
}

pub fn execute(config: &ServerConfig, store: &MemoryStore, arguments: serde_json::Value) -> Result<ToolCallResult> {
    let params: ExplainParams =
        serde_json::from_value(arguments).context("invalid explain parameters")?;

    let builder = super::registry(config, store, &params.types)?;
    let operations = parse_operations(&builder, &params.operations)?;
    if operations.is_empty() {
        return Ok(super::text_result("No operation given.".to_owned(), true));
    }
    let lines: Vec<&str> = operations.iter().map(Operation::explanation).collect();
    Ok(super::text_result(lines.join("\n"), false))
}
