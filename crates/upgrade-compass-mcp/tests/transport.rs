// crates/upgrade-compass-mcp/tests/transport.rs
// ============================================================================
// Module: Transport Tests
// Description: Message loop timing, heartbeat, and shutdown coverage.
// Purpose: Verify the stdio loop semantics with a controlled clock.
// Dependencies: upgrade-compass-mcp, tokio
// ============================================================================

//! Transport tests: message loop timing, heartbeat, and shutdown coverage.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

mod common;

use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use upgrade_compass_mcp::server::HEARTBEAT_METHOD;
use upgrade_compass_mcp::server::run_message_loop;

use common::dispatcher;

/// Reads the next line from the transport output.
async fn next_line(reader: &mut BufReader<DuplexStream>) -> Value {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    serde_json::from_str(line.trim()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn idle_intervals_emit_heartbeat_notifications() {
    let dispatcher = dispatcher();
    let (tx, rx) = mpsc::channel::<String>(4);
    let (client, server_io) = tokio::io::duplex(16 * 1024);
    let mut reader = BufReader::new(client);

    let loop_task = tokio::spawn(run_message_loop(dispatcher, rx, server_io, 30));

    // First idle interval elapses: exactly one heartbeat notification.
    let heartbeat = next_line(&mut reader).await;
    assert_eq!(heartbeat["method"], HEARTBEAT_METHOD);
    assert!(heartbeat.get("id").is_none());
    assert!(heartbeat["params"]["timestamp"].is_u64());

    // A second idle interval elapses: one more heartbeat.
    let second = next_line(&mut reader).await;
    assert_eq!(second["method"], HEARTBEAT_METHOD);

    drop(tx);
    loop_task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn traffic_is_answered_and_resets_the_idle_clock() {
    let dispatcher = dispatcher();
    let (tx, rx) = mpsc::channel::<String>(4);
    let (client, server_io) = tokio::io::duplex(16 * 1024);
    let mut reader = BufReader::new(client);

    let loop_task = tokio::spawn(run_message_loop(dispatcher, rx, server_io, 30));

    tx.send(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }).to_string())
        .await
        .unwrap();
    let response = next_line(&mut reader).await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["status"], "ok");

    // After traffic the idle clock restarts; the next emission is a heartbeat.
    let heartbeat = next_line(&mut reader).await;
    assert_eq!(heartbeat["method"], HEARTBEAT_METHOD);

    drop(tx);
    loop_task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_lines_and_notifications_produce_no_output() {
    let dispatcher = dispatcher();
    let (tx, rx) = mpsc::channel::<String>(4);
    let (client, server_io) = tokio::io::duplex(16 * 1024);
    let mut reader = BufReader::new(client);

    let loop_task = tokio::spawn(run_message_loop(dispatcher, rx, server_io, 30));

    tx.send(String::new()).await.unwrap();
    tx.send("   ".to_string()).await.unwrap();
    tx.send(json!({ "jsonrpc": "2.0", "method": "ping" }).to_string()).await.unwrap();
    tx.send(json!({ "jsonrpc": "2.0", "id": 9, "method": "ping" }).to_string())
        .await
        .unwrap();

    // The only output is the reply to the identified request.
    let response = next_line(&mut reader).await;
    assert_eq!(response["id"], 9);

    drop(tx);
    loop_task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn end_of_input_terminates_the_loop() {
    let dispatcher = dispatcher();
    let (tx, rx) = mpsc::channel::<String>(4);
    let (client, server_io) = tokio::io::duplex(16 * 1024);

    let loop_task = tokio::spawn(run_message_loop(dispatcher, rx, server_io, 30));
    drop(tx);
    loop_task.await.unwrap().unwrap();
    drop(client);
}
