//! MCP protocol integration tests.
//!
//! Drives the JSON-RPC 2.0 server loop over in-memory pipes, with the store
//! kept in a temporary file.

use std::path::Path;

use docbatch::server::{JsonRpcRequest, JsonRpcResponse, ServerConfig, serve};
use docbatch::store::MemoryStore;
use docbatch::tools::ToolRouter;
use serde_json::{Value, json};

fn store_json() -> Value {
    json!({
        "databases": [{
            "post_type": "dbbooks",
            "label": "Books",
            "types": [{
                "name": "book",
                "fields": [
                    {"name": "title", "kind": "text"},
                    {"name": "topic", "kind": "composite", "collection": true, "fields": [
                        {"name": "type", "kind": "enumerated", "table": "topic-type"},
                        {"name": "value", "kind": "enumerated", "collection": true}
                    ]}
                ]
            }],
            "records": [
                {"id": 1, "fields": {"type": "book", "title": "Rust in action"}},
                {"id": 2, "fields": {"type": "book", "title": "Programming Rust"}}
            ]
        }],
        "tables": {"topic-type": ["free", "geo"]}
    })
}

fn router(dir: &Path, dry_run: bool) -> ToolRouter {
    let store_path = dir.join("store.json");
    std::fs::write(&store_path, store_json().to_string()).expect("write store");
    let config = ServerConfig {
        store_path,
        dry_run,
        ..ServerConfig::default()
    };
    ToolRouter::new(config).expect("router")
}

/// Send `requests` one per line and collect the responses.
fn exchange(router: &mut ToolRouter, requests: &[Value]) -> Vec<JsonRpcResponse> {
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
    let mut reader = input.as_bytes();
    let mut output = Vec::new();
    serve(router, &mut reader, &mut output).expect("serve");

    String::from_utf8(output)
        .expect("utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response"))
        .collect()
}

fn call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

/// Text of the single content item of a tools/call response.
fn text(response: &JsonRpcResponse) -> (&str, bool) {
    let result = response.result.as_ref().expect("result");
    let text = result["content"][0]["text"].as_str().expect("text");
    (text, result.get("isError").and_then(Value::as_bool).unwrap_or(false))
}

#[test]
fn test_json_rpc_request_parsing() {
    let req: JsonRpcRequest = serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {"protocolVersion": "2025-06-18", "capabilities": {}}
    }))
    .expect("should parse initialize request");

    assert_eq!(req.method, "initialize");
    assert_eq!(req.id, Some(json!(1)));
}

#[test]
fn test_handshake_and_tool_list() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut router = router(dir.path(), false);

    let responses = exchange(
        &mut router,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
        ],
    );

    // The notification gets no response.
    assert_eq!(responses.len(), 3);
    let init = responses[0].result.as_ref().expect("initialize result");
    assert_eq!(init["serverInfo"]["name"], "docbatch");

    let tools = responses[1].result.as_ref().expect("tools")["tools"]
        .as_array()
        .expect("tool array")
        .clone();
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(names, ["fields", "explain", "batch"]);
    for tool in &tools {
        assert!(tool["description"].as_str().is_some_and(|d| !d.is_empty()));
        assert!(tool["inputSchema"].is_object());
    }
    assert_eq!(responses[2].id, Some(json!(3)));
}

#[test]
fn test_protocol_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut router = router(dir.path(), false);

    let input = "not json\n\
        {\"jsonrpc\":\"1.0\",\"id\":1,\"method\":\"ping\"}\n\
        {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"resources/list\"}\n";
    let mut reader = input.as_bytes();
    let mut output = Vec::new();
    serve(&mut router, &mut reader, &mut output).expect("serve");
    let responses: Vec<JsonRpcResponse> = String::from_utf8(output)
        .expect("utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response"))
        .collect();

    let codes: Vec<i64> = responses
        .iter()
        .map(|r| r.error.as_ref().expect("error").code)
        .collect();
    assert_eq!(codes, [-32700, -32600, -32601]);
}

#[test]
fn test_fields_tool() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut router = router(dir.path(), false);

    let responses = exchange(&mut router, &[call(1, "fields", json!({}))]);
    let (text, is_error) = text(&responses[0]);
    assert!(!is_error);

    let options: Value = serde_json::from_str(text).expect("options");
    let keys: Vec<&str> = options
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|o| o["key"].as_str())
        .collect();
    assert_eq!(
        keys,
        ["title", "topic.type", "topic.value", "topic/type.free", "topic/type.geo"]
    );
}

#[test]
fn test_explain_tool() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut router = router(dir.path(), false);

    let responses = exchange(
        &mut router,
        &[
            call(
                1,
                "explain",
                json!({"operations": [
                    {"field": "title", "search": "Rust", "replace": ""},
                    {"field": "topic/type.free", "replace": "systems"}
                ]}),
            ),
            call(2, "explain", json!({"operations": [{"field": "topic", "search": "a"}]})),
            call(3, "explain", json!({"operations": [{"field": "missing", "search": "a"}]})),
        ],
    );

    let (text, is_error) = text(&responses[0]);
    assert!(!is_error);
    assert_eq!(
        text,
        "Remove \"Rust\" from field title (text).\nInject \"systems\" into field topic/type.free (values)."
    );

    let (text, is_error) = self::text(&responses[1]);
    assert!(is_error);
    assert!(text.contains("topic"), "{text}");

    let (text, is_error) = self::text(&responses[2]);
    assert!(is_error);
    assert_eq!(text, "Error: the field missing does not exist");
}

#[test]
fn test_batch_tool_writes_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut router = router(dir.path(), false);
    let arguments = |confirm: bool| {
        json!({
            "batch": "search-replace",
            "parameters": {
                "search": {},
                "operations": [{"field": "title", "search": "Rust", "replace": "Ferris"}],
                "confirm": confirm
            }
        })
    };

    let responses = exchange(&mut router, &[call(1, "batch", arguments(false)), call(2, "batch", arguments(true))]);

    let (text, is_error) = text(&responses[0]);
    assert!(!is_error);
    let report: Value = serde_json::from_str(text).expect("report");
    assert_eq!(report["outcome"], "confirm");
    assert_eq!(report["hits"], 2);

    let (text, _) = self::text(&responses[1]);
    let report: Value = serde_json::from_str(text).expect("report");
    assert_eq!(report["outcome"], "completed");
    assert_eq!(report["modified"], 2);
    assert_eq!(report["dryRun"], false);

    let saved = MemoryStore::from_file(&dir.path().join("store.json")).expect("saved store");
    assert_eq!(saved.find(1).and_then(|r| r.get_text("title")), Some("Ferris in action"));
    assert_eq!(router.store().find(2).and_then(|r| r.get_text("title")), Some("Programming Ferris"));
}

#[test]
fn test_batch_tool_dry_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut router = router(dir.path(), true);

    let responses = exchange(
        &mut router,
        &[call(
            1,
            "batch",
            json!({
                "batch": "delete",
                "parameters": {"search": {"ids": [2]}, "confirm": true}
            }),
        )],
    );

    let (text, is_error) = text(&responses[0]);
    assert!(!is_error);
    let report: Value = serde_json::from_str(text).expect("report");
    assert_eq!(report["outcome"], "completed");
    assert_eq!(report["dryRun"], true);
    assert_eq!(report["previews"][0]["id"], 2);
    assert!(report["previews"][0]["diff"]
        .as_str()
        .is_some_and(|diff| diff.contains("-  \"title\": \"Programming Rust\"")));

    // Nothing deleted, nothing written.
    assert!(router.store().find(2).is_some());
    let saved = MemoryStore::from_file(&dir.path().join("store.json")).expect("store");
    assert!(saved.find(2).is_some());
}

#[test]
fn test_batch_tool_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut router = router(dir.path(), false);

    let responses = exchange(
        &mut router,
        &[
            call(1, "batch", json!({"batch": "archive", "parameters": {"search": {}}})),
            call(2, "batch", json!({"parameters": {}})),
            call(3, "unknown", json!({})),
        ],
    );

    let (text, is_error) = text(&responses[0]);
    assert!(is_error);
    assert_eq!(text, "Error: unknown batch: archive");

    let (text, is_error) = self::text(&responses[1]);
    assert!(is_error);
    assert!(text.contains("invalid batch parameters"), "{text}");

    let (text, is_error) = self::text(&responses[2]);
    assert!(is_error);
    assert!(text.contains("Unknown tool"));
}

#[test]
fn test_oversized_request_is_discarded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut router = router(dir.path(), false);

    let mut input = format!(
        "{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\",\"params\":{{\"pad\":\"{}\"}}}}\n",
        "x".repeat(11 * 1024 * 1024)
    );
    input.push_str("{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");
    input.push_str("{\"jsonrpc\":\"2.0\",\"method\":\"notifications/cancelled\"}\n");
    let mut reader = input.as_bytes();
    let mut output = Vec::new();
    serve(&mut router, &mut reader, &mut output).expect("serve");

    let responses: Vec<JsonRpcResponse> = String::from_utf8(output)
        .expect("utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response"))
        .collect();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].error.as_ref().map(|e| e.code), Some(-32600));
    assert_eq!(responses[0].id, None);
    assert_eq!(responses[1].id, Some(json!(2)));
    assert!(responses[1].error.is_none());
}
