// crates/upgrade-compass-mcp/tests/protocol.rs
// ============================================================================
// Module: Protocol Tests
// Description: Dispatcher state, batching, and failure-mapping coverage.
// Purpose: Verify the JSON-RPC contract end to end.
// Dependencies: upgrade-compass-mcp, serde_json, tokio
// ============================================================================

//! Protocol tests: dispatcher state, batching, and failure-mapping coverage.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

mod common;

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use upgrade_compass_core::ToolEnvelope;

use common::EchoTool;
use common::FailingTool;
use common::StreamingTool;
use common::call;
use common::dispatcher;
use common::dispatcher_with;
use common::initialize;

#[tokio::test]
async fn response_id_echoes_value_and_type() {
    let dispatcher = dispatcher();
    let numeric =
        call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 7, "method": "ping" }))
            .await
            .unwrap();
    assert_eq!(numeric["id"], json!(7));
    let string =
        call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": "seven", "method": "ping" }))
            .await
            .unwrap();
    assert_eq!(string["id"], json!("seven"));
}

#[tokio::test]
async fn null_id_is_a_request_not_a_notification() {
    let dispatcher = dispatcher();
    let response =
        call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": null, "method": "ping" }))
            .await
            .unwrap();
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["result"]["status"], "ok");
}

#[tokio::test]
async fn notifications_produce_no_reply() {
    let dispatcher = dispatcher();
    let silent = dispatcher
        .handle_raw(&json!({ "jsonrpc": "2.0", "method": "ping" }).to_string())
        .await;
    assert!(silent.is_none());
    let unknown = dispatcher
        .handle_raw(&json!({ "jsonrpc": "2.0", "method": "whatever" }).to_string())
        .await;
    assert!(unknown.is_none());
}

#[tokio::test]
async fn batch_of_only_notifications_yields_no_output() {
    let dispatcher = dispatcher();
    let batch = json!([
        { "jsonrpc": "2.0", "method": "ping" },
        { "jsonrpc": "2.0", "method": "tools/listChanged" },
    ]);
    assert!(dispatcher.handle_raw(&batch.to_string()).await.is_none());
}

#[tokio::test]
async fn batch_responses_preserve_input_order_minus_notifications() {
    let dispatcher = dispatcher();
    let batch = json!([
        { "jsonrpc": "2.0", "id": 1, "method": "ping" },
        { "jsonrpc": "2.0", "method": "ping" },
        { "jsonrpc": "2.0", "id": 2, "method": "ping" },
    ]);
    let raw = dispatcher.handle_raw(&batch.to_string()).await.unwrap();
    let responses: Vec<Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], json!(1));
    assert_eq!(responses[1]["id"], json!(2));
}

#[tokio::test]
async fn malformed_bytes_map_to_parse_error_with_null_id() {
    let dispatcher = dispatcher();
    let raw = dispatcher.handle_raw("{not json").await.unwrap();
    let response: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(response["id"], Value::Null);
    assert_eq!(response["error"]["code"], -32700);
}

#[tokio::test]
async fn wrong_jsonrpc_marker_is_an_invalid_request() {
    let dispatcher = dispatcher();
    let response =
        call(&dispatcher, &json!({ "jsonrpc": "1.0", "id": 1, "method": "ping" }))
            .await
            .unwrap();
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn unknown_method_maps_to_method_not_found() {
    let dispatcher = dispatcher();
    initialize(&dispatcher).await;
    let response =
        call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/destroy" }))
            .await
            .unwrap();
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn state_dependent_methods_require_initialize() {
    let dispatcher = dispatcher();
    for method in
        ["tools/list", "tools/call", "resources/list", "resources/read", "prompts/list"]
    {
        let response =
            call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 1, "method": method }))
                .await
                .unwrap();
        assert_eq!(response["error"]["code"], -32603, "method {method}");
        let message = response["error"]["message"].as_str().unwrap();
        assert!(message.contains("not been initialized"), "method {method}: {message}");
    }
    initialize(&dispatcher).await;
    let listed =
        call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
            .await
            .unwrap();
    assert!(listed["result"]["tools"].is_array());
}

#[tokio::test]
async fn ping_works_in_both_states() {
    let dispatcher = dispatcher();
    let before = call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }))
        .await
        .unwrap();
    assert_eq!(before["result"]["status"], "ok");
    initialize(&dispatcher).await;
    let after = call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" }))
        .await
        .unwrap();
    assert_eq!(after["result"]["status"], "ok");
}

#[tokio::test]
async fn initialize_validates_and_echoes_the_requested_version() {
    let dispatcher = dispatcher();
    let bad = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "protocolVersion": "v1" },
        }),
    )
    .await
    .unwrap();
    assert_eq!(bad["error"]["code"], -32603);
    assert!(bad["error"]["message"].as_str().unwrap().contains("YYYY-MM-DD"));

    let echoed = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 2, "method": "initialize",
            "params": { "protocolVersion": "2024-11-05" },
        }),
    )
    .await
    .unwrap();
    assert_eq!(echoed["result"]["protocolVersion"], "2024-11-05");

    let defaulted = call(
        &dispatcher,
        &json!({ "jsonrpc": "2.0", "id": 3, "method": "initialize", "params": {} }),
    )
    .await
    .unwrap();
    assert_eq!(defaulted["result"]["protocolVersion"], "2025-06-18");
    let capabilities = &defaulted["result"]["capabilities"];
    for surface in ["tools", "resources", "prompts"] {
        assert_eq!(capabilities[surface]["listChanged"], false);
    }
    assert!(defaulted["result"]["instructions"].as_str().unwrap().len() > 10);
}

#[tokio::test]
async fn registered_echo_tool_lists_and_round_trips() {
    let dispatcher = dispatcher_with(|registry| registry.register(Arc::new(EchoTool)));
    initialize(&dispatcher).await;

    let listed =
        call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }))
            .await
            .unwrap();
    let tools = listed["result"]["tools"].as_array().unwrap();
    assert!(tools.iter().any(|tool| tool["name"] == "echo"));

    let called = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": { "name": "echo", "arguments": { "probe": true } },
        }),
    )
    .await
    .unwrap();
    assert_eq!(called["result"]["isError"], false);
    let content = called["result"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0]["type"], "text");
    let envelope: ToolEnvelope =
        serde_json::from_str(content[0]["text"].as_str().unwrap()).unwrap();
    assert!(envelope.ok);
    assert_eq!(envelope.data.unwrap()["echo"]["probe"], true);
}

#[tokio::test]
async fn unregistered_tool_call_mentions_not_registered() {
    let dispatcher = dispatcher();
    initialize(&dispatcher).await;
    let response = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": { "name": "absent_tool", "arguments": {} },
        }),
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], -32603);
    assert!(response["error"]["message"].as_str().unwrap().contains("not registered"));
}

#[tokio::test]
async fn tool_call_params_are_validated() {
    let dispatcher = dispatcher();
    initialize(&dispatcher).await;
    let missing_name = call(
        &dispatcher,
        &json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {} }),
    )
    .await
    .unwrap();
    assert!(
        missing_name["error"]["message"]
            .as_str()
            .unwrap()
            .contains("\"name\" is required")
    );

    let bad_arguments = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": { "name": "echo", "arguments": [1, 2] },
        }),
    )
    .await
    .unwrap();
    assert!(
        bad_arguments["error"]["message"]
            .as_str()
            .unwrap()
            .contains("\"arguments\" must be an object")
    );
}

#[tokio::test]
async fn failure_envelopes_set_is_error_without_raising() {
    let dispatcher = dispatcher_with(|registry| registry.register(Arc::new(FailingTool)));
    initialize(&dispatcher).await;
    let response = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": { "name": "always_fails", "arguments": {} },
        }),
    )
    .await
    .unwrap();
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    let envelope: ToolEnvelope = serde_json::from_str(
        response["result"]["content"][0]["text"].as_str().unwrap(),
    )
    .unwrap();
    assert!(!envelope.ok);
    assert_eq!(envelope.warnings, vec!["partial results discarded".to_string()]);
}

#[tokio::test]
async fn stream_chunks_append_to_the_content_list() {
    let dispatcher = dispatcher_with(|registry| registry.register(Arc::new(StreamingTool)));
    initialize(&dispatcher).await;
    let response = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": { "name": "streaming", "arguments": {} },
        }),
    )
    .await
    .unwrap();
    let content = response["result"]["content"].as_array().unwrap();
    assert_eq!(content.len(), 3);
    assert_eq!(content[1]["text"], "chunk one");
    assert_eq!(content[2]["text"], "chunk two");
}

#[tokio::test]
async fn resources_list_and_read_round_trip() {
    let dispatcher = dispatcher();
    initialize(&dispatcher).await;
    let listed =
        call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" }))
            .await
            .unwrap();
    let resources = listed["result"]["resources"].as_array().unwrap();
    assert!(!resources.is_empty());
    let uri = resources[0]["uri"].as_str().unwrap().to_string();

    let read = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 2, "method": "resources/read",
            "params": { "uri": uri },
        }),
    )
    .await
    .unwrap();
    let contents = read["result"]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0]["uri"], resources[0]["uri"]);
    assert!(contents[0]["text"].as_str().unwrap().len() > 2);
}

#[tokio::test]
async fn unknown_resource_uri_mentions_not_found() {
    let dispatcher = dispatcher();
    initialize(&dispatcher).await;
    let response = call(
        &dispatcher,
        &json!({
            "jsonrpc": "2.0", "id": 1, "method": "resources/read",
            "params": { "uri": "compass://knowledge-base/absent" },
        }),
    )
    .await
    .unwrap();
    assert_eq!(response["error"]["code"], -32603);
    assert!(response["error"]["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn prompts_list_returns_the_static_catalog() {
    let dispatcher = dispatcher();
    initialize(&dispatcher).await;
    let listed =
        call(&dispatcher, &json!({ "jsonrpc": "2.0", "id": 1, "method": "prompts/list" }))
            .await
            .unwrap();
    let prompts = listed["result"]["prompts"].as_array().unwrap();
    assert!(prompts.iter().any(|prompt| prompt["name"] == "upgrade_foundation"));
}
