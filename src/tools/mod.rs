//! Tool router: registers and dispatches MCP tool calls.
//!
//! Each tool is a function that takes JSON arguments and returns a
//! [`ToolCallResult`]. The router owns the configuration and the loaded
//! store, and provides `list_tools()` / `call_tool()` for the server.
//!
//! Tools propagate failures with `?`. The router turns a [`BatchError`] into
//! an `isError` result carrying its message; anything else (bad arguments,
//! store write failures) is logged and reported with its context chain.

pub mod batch;
pub mod explain;
pub mod fields;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error};

use crate::batch::SearchRequest;
use crate::batch::search::SearchEngine;
use crate::batch::search_replace::fields_for_response;
use crate::error::{BatchError, BatchResult};
use crate::replace::FieldsBuilder;
use crate::server::ServerConfig;
use crate::store::MemoryStore;

/// Entry of the `tools/list` result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// Result of a `tools/call`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ContentItem>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// Tool router that dispatches MCP tool calls to implementations.
pub struct ToolRouter {
    config: ServerConfig,
    store: MemoryStore,
}

impl ToolRouter {
    /// Create a router over the store file named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file cannot be read.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = MemoryStore::from_file(&config.store_path)?;
        Ok(Self::with_store(config, store))
    }

    /// Create a router over an already loaded store.
    pub fn with_store(config: ServerConfig, store: MemoryStore) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// List all available tools with their JSON Schema definitions.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        vec![
            fields::tool_definition(),
            explain::tool_definition(),
            batch::tool_definition(),
        ]
    }

    /// Call a tool by name with the given JSON arguments.
    pub fn call_tool(&mut self, name: &str, arguments: serde_json::Value) -> ToolCallResult {
        debug!(tool = name, "dispatching tool call");

        let result = match name {
            "fields" => fields::execute(&self.config, &self.store, arguments),
            "explain" => explain::execute(&self.config, &self.store, arguments),
            "batch" => batch::execute(&self.config, &mut self.store, arguments),
            _ => return text_result(format!("Unknown tool: {name}"), true),
        };
        result.unwrap_or_else(|e| {
            if let Some(rejected) = e.downcast_ref::<BatchError>() {
                debug!(tool = name, error = %rejected, "tool call rejected");
                return text_result(format!("Error: {rejected}"), true);
            }
            error!(tool = name, error = %format!("{e:#}"), "tool call failed");
            text_result(format!("Error: {e:#}"), true)
        })
    }
}

pub(crate) fn text_result(text: String, is_error: bool) -> ToolCallResult {
    ToolCallResult {
        content: vec![ContentItem {
            content_type: "text".to_owned(),
            text,
        }],
        is_error,
    }
}

pub(crate) fn json_result(value: &impl Serialize) -> Result<ToolCallResult> {
    Ok(text_result(serde_json::to_string_pretty(value)?, false))
}

/// Field registry for the stored records of the given types (all types when
/// empty).
pub(crate) fn registry(config: &ServerConfig, store: &MemoryStore, types: &[String]) -> BatchResult<FieldsBuilder> {
    let request = SearchRequest {
        types: types.to_vec(),
        ..SearchRequest::default()
    };
    let response = store.execute(&request)?;
    fields_for_response(store, &response, &config.batch.typed_fields)
}
