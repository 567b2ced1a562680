// crates/upgrade-compass-mcp/tests/common/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared fixtures for the MCP integration suites.
// Purpose: Build dispatchers and registries over the embedded corpus.
// Dependencies: upgrade-compass-core, upgrade-compass-mcp
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only fixtures; each suite uses a subset."
)]

use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use serde_json::json;
use upgrade_compass_core::KnowledgeBase;
use upgrade_compass_core::ToolEnvelope;
use upgrade_compass_core::ToolError;
use upgrade_compass_core::ToolTimer;
use upgrade_compass_core::tool::Tool;
use upgrade_compass_mcp::RequestDispatcher;
use upgrade_compass_mcp::ToolContext;
use upgrade_compass_mcp::ToolRegistry;
use upgrade_compass_mcp::audit::AuditEvent;
use upgrade_compass_mcp::audit::AuditSink;
use upgrade_compass_mcp::audit::NoopAuditSink;
use upgrade_compass_mcp::prompts::PromptCatalog;
use upgrade_compass_mcp::resources::ResourceCatalog;
use upgrade_compass_mcp::tools::register_default_tools;

/// Builds the shared tool context over the embedded corpus.
pub fn tool_context() -> ToolContext {
    ToolContext {
        knowledge: Arc::new(KnowledgeBase::embedded().unwrap()),
        default_root: None,
        excluded_dirs: vec!["target".to_string(), ".git".to_string()],
    }
}

/// Builds a dispatcher with the default tool set plus test extras.
pub fn dispatcher_with(extra: impl FnOnce(&mut ToolRegistry)) -> Arc<RequestDispatcher> {
    let context = tool_context();
    let mut registry = ToolRegistry::new(Arc::new(NoopAuditSink), 5);
    register_default_tools(&mut registry, &context);
    extra(&mut registry);
    let resources = ResourceCatalog::from_knowledge_base(&context.knowledge).unwrap();
    Arc::new(RequestDispatcher::new(
        registry,
        resources,
        PromptCatalog::default_prompts(),
        None,
    ))
}

/// Builds a dispatcher with only the default tool set.
pub fn dispatcher() -> Arc<RequestDispatcher> {
    dispatcher_with(|_| {})
}

/// Sends one raw message and decodes the reply.
pub async fn call(dispatcher: &RequestDispatcher, payload: &Value) -> Option<Value> {
    let raw = dispatcher.handle_raw(&payload.to_string()).await?;
    Some(serde_json::from_str(&raw).unwrap())
}

/// Completes the initialize handshake.
pub async fn initialize(dispatcher: &RequestDispatcher) {
    let response = call(
        dispatcher,
        &json!({ "jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {} }),
    )
    .await
    .unwrap();
    assert!(response.get("result").is_some(), "initialize failed: {response}");
}

/// Tool that echoes its payload back inside a success envelope.
pub struct EchoTool;

impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the payload back."
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        Ok(ToolEnvelope::success(json!({ "echo": payload }), Vec::new(), &timer))
    }
}

/// Tool that always returns an `ok: false` envelope with warnings.
pub struct FailingTool;

impl Tool for FailingTool {
    fn name(&self) -> &str {
        "always_fails"
    }

    fn description(&self) -> &str {
        "Return a failure envelope."
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let _ = payload;
        let timer = ToolTimer::start();
        Ok(ToolEnvelope::failure(
            "domain failure",
            Some("execution_failed".to_string()),
            vec!["partial results discarded".to_string()],
            &timer,
        ))
    }
}

/// Tool whose data carries pre-formed stream chunks.
pub struct StreamingTool;

impl Tool for StreamingTool {
    fn name(&self) -> &str {
        "streaming"
    }

    fn description(&self) -> &str {
        "Return extra pre-formed content chunks."
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let _ = payload;
        let timer = ToolTimer::start();
        Ok(ToolEnvelope::success(
            json!({
                "summary": "two chunks follow",
                "stream": [
                    { "type": "text", "text": "chunk one" },
                    { "type": "text", "text": "chunk two" },
                ],
            }),
            Vec::new(),
            &timer,
        ))
    }
}

/// Tool that blocks far past any configured limit.
pub struct SleepyTool;

impl Tool for SleepyTool {
    fn name(&self) -> &str {
        "sleepy"
    }

    fn description(&self) -> &str {
        "Block for a long time."
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let _ = payload;
        // Long enough to trip a 1s limit, short enough that runtime shutdown
        // (which waits for abandoned blocking tasks) stays quick.
        std::thread::sleep(std::time::Duration::from_secs(2));
        let timer = ToolTimer::start();
        Ok(ToolEnvelope::success(json!({}), Vec::new(), &timer))
    }
}

/// Audit sink recording event labels for assertions.
#[derive(Default)]
pub struct RecordingSink {
    /// Recorded event JSON values.
    events: Mutex<Vec<Value>>,
}

impl RecordingSink {
    /// Returns recorded event tags in emission order.
    pub fn event_tags(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event["event"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Returns recorded events.
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingSink {
    fn emit(&self, event: &AuditEvent) {
        if let Ok(value) = serde_json::to_value(event) {
            if let Ok(mut events) = self.events.lock() {
                events.push(value);
            }
        }
    }
}
