//! Batch server: newline-delimited JSON-RPC 2.0 over stdio.
//!
//! Answers the Model Context Protocol subset a tool client needs:
//! `initialize`, `tools/list`, `tools/call` and `ping`. Notifications are
//! accepted and never answered. A failing tool is still a successful call
//! whose result has `isError` set; JSON-RPC errors are reserved for requests
//! the server cannot make sense of.

use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::batch::BatchSettings;
use crate::tools::ToolRouter;

/// Longest request line accepted (10 MiB); longer lines are discarded.
const MAX_LINE_BYTES: u64 = 10 * 1024 * 1024;

const PROTOCOL_VERSION: &str = "2025-06-18";

/// A request, or a notification when `id` is absent.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Reply to one request. Exactly one of `result` and `error` is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// `null` when the request could not be parsed.
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Configuration for the batch server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// JSON store file holding the databases and code tables.
    pub store_path: PathBuf,
    /// Never write the store back; batch results carry record diffs instead.
    pub dry_run: bool,
    #[serde(flatten)]
    pub batch: BatchSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("store.json"),
            dry_run: false,
            batch: BatchSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Read a JSON configuration file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }
}

/// Run the batch server on stdin/stdout until stdin is closed.
///
/// # Errors
///
/// Returns an error if the store cannot be loaded or stdio fails.
pub fn run_server(config: ServerConfig) -> Result<()> {
    info!(
        store = %config.store_path.display(),
        dry_run = config.dry_run,
        "docbatch server starting"
    );

    let mut router = ToolRouter::new(config)?;
    let mut reader = std::io::stdin().lock();
    let mut stdout = std::io::stdout().lock();
    serve(&mut router, &mut reader, &mut stdout)?;

    info!("docbatch server stopped");
    Ok(())
}

/// Answer newline-delimited requests from `reader` until end of input.
///
/// # Errors
///
/// Returns an error if reading or writing fails.
pub fn serve(router: &mut ToolRouter, reader: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .by_ref()
            .take(MAX_LINE_BYTES + 1)
            .read_line(&mut line)
            .context("failed to read request")?;
        if read == 0 {
            info!("input closed, shutting down");
            return Ok(());
        }

        let response = if line.len() as u64 > MAX_LINE_BYTES && !line.ends_with('\n') {
            reader
                .skip_until(b'\n')
                .context("failed to discard oversized request")?;
            warn!(limit = MAX_LINE_BYTES, "oversized request discarded");
            Some(JsonRpcResponse::failure(
                None,
                RpcError::new(
                    RpcError::INVALID_REQUEST,
                    format!("request exceeds {MAX_LINE_BYTES} bytes"),
                ),
            ))
        } else {
            let request = line.trim();
            if request.is_empty() {
                continue;
            }
            respond(router, request)
        };

        if let Some(response) = response {
            write_response(out, &response)?;
        }
    }
}

/// Answer one request line; notifications get `None`.
fn respond(router: &mut ToolRouter, line: &str) -> Option<JsonRpcResponse> {
    debug!(request = line, "received");
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparsable request");
            return Some(JsonRpcResponse::failure(
                None,
                RpcError::new(RpcError::PARSE_ERROR, format!("parse error: {e}")),
            ));
        }
    };

    if request.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::failure(
            request.id,
            RpcError::new(
                RpcError::INVALID_REQUEST,
                format!("jsonrpc must be \"2.0\", got \"{}\"", request.jsonrpc),
            ),
        ));
    }

    let Some(id) = request.id else {
        debug!(method = request.method, "notification");
        return None;
    };

    Some(match handle(router, &request.method, request.params) {
        Ok(result) => JsonRpcResponse::success(Some(id), result),
        Err(error) => {
            warn!(method = request.method, code = error.code, message = error.message, "request failed");
            JsonRpcResponse::failure(Some(id), error)
        }
    })
}

fn handle(router: &mut ToolRouter, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        })),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({"tools": router.list_tools()})),
        "tools/call" => {
            let call: ToolCall = serde_json::from_value(params).map_err(|e| {
                RpcError::new(RpcError::INVALID_PARAMS, format!("invalid tools/call params: {e}"))
            })?;
            let result = router.call_tool(&call.name, call.arguments);
            serde_json::to_value(result)
                .map_err(|e| RpcError::new(RpcError::INTERNAL_ERROR, e.to_string()))
        }
        other => Err(RpcError::new(
            RpcError::METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        )),
    }
}

fn write_response(out: &mut impl Write, response: &JsonRpcResponse) -> Result<()> {
    serde_json::to_writer(&mut *out, response).context("failed to write response")?;
    out.write_all(b"\n").context("failed to write response")?;
    out.flush().context("failed to flush output")
}
