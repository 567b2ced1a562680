// crates/upgrade-compass-mcp/src/dispatcher.rs
// ============================================================================
// Module: Protocol Dispatcher
// Description: JSON-RPC 2.0 decoding, state rules, and method routing.
// Purpose: Turn raw protocol messages into registry calls and responses.
// Dependencies: upgrade-compass-core, serde_json
// ============================================================================

//! ## Overview
//! The dispatcher accepts one raw message (or a batch array), enforces the
//! initialize-before-use rule, routes the fixed method table, and maps every
//! failure to a structured protocol error. A request with a present `id` key
//! receives exactly one response whose `id` echoes the request's value and
//! type; a message without an `id` key is a notification and is never
//! answered. Expected "not found" lookups are typed misses, not exceptions;
//! only the protocol boundary converts them to error objects.
//!
//! ## Invariants
//! - Every request with an `id` yields exactly one response object.
//! - A batch of only notifications yields no output at all.
//! - Responses are produced in input order, minus filtered notifications.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use upgrade_compass_core::ToolError;

use crate::prompts::PromptCatalog;
use crate::registry::ToolRegistry;
use crate::resources::ResourceCatalog;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol versions this server accepts, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2024-11-05", "2024-10-07"];

/// Parse error code.
const PARSE_ERROR: i64 = -32700;
/// Invalid request code.
const INVALID_REQUEST: i64 = -32600;
/// Method not found code.
const METHOD_NOT_FOUND: i64 = -32601;
/// Internal error code (also used for "not initialized" and tool failures).
const INTERNAL_ERROR: i64 = -32603;

/// Advertised server name.
const SERVER_NAME: &str = "Upgrade Compass";
/// Advertised server version.
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default operating instructions returned by `initialize`.
const DEFAULT_INSTRUCTIONS: &str = "\
Upgrade Compass exposes structured Rust edition upgrade guidance, analyzers, \
and migration utilities.

Before starting an upgrade, establish a baseline (no code or dependency \
changes until this is complete):
- Run the full test suite and record the results.
- Capture key performance and error-rate metrics.
- Tag or note the current git commit, ensuring a clean working tree.
- Document the active toolchain (rustc version, targets, CI images).

Tool usage discipline:
- Call tools/list to inspect schemas and required parameters before invoking \
anything.
- Only invoke tools when the answer is not already available in the current \
context.
- Avoid re-running a tool unless new inputs would change the result; \
reference prior outputs instead.
- Prefer purpose-built analyzers over manual grepping; tools give \
structured, reusable data.
- Trim or summarise large outputs before replying to keep the conversation \
context lean.";

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// JSON-RPC dispatcher for one logical session.
///
/// # Invariants
/// - State moves from uninitialized to initialized exactly once, on a
///   successful `initialize`; there is no terminal state.
pub struct RequestDispatcher {
    /// Registry executing `tools/call`.
    registry: ToolRegistry,
    /// Read-only resource catalog.
    resources: ResourceCatalog,
    /// Read-only prompt catalog.
    prompts: PromptCatalog,
    /// Operating instructions returned by `initialize`.
    instructions: String,
    /// Whether `initialize` has completed for this session.
    initialized: AtomicBool,
}

impl RequestDispatcher {
    /// Creates a dispatcher over its catalogs.
    #[must_use]
    pub fn new(
        registry: ToolRegistry,
        resources: ResourceCatalog,
        prompts: PromptCatalog,
        instructions: Option<String>,
    ) -> Self {
        Self {
            registry,
            resources,
            prompts,
            instructions: instructions.unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Handles one raw protocol message or batch.
    ///
    /// Returns `None` when the input produces no reply: a notification, or a
    /// batch whose every element was a notification.
    pub async fn handle_raw(&self, payload: &str) -> Option<String> {
        let decoded: Result<Value, serde_json::Error> = serde_json::from_str(payload);
        let response = match decoded {
            Err(err) => Some(error_response(
                Value::Null,
                PARSE_ERROR,
                &format!("Parse error: {err}"),
            )),
            Ok(Value::Array(batch)) => {
                let mut responses = Vec::new();
                for element in batch {
                    if let Some(reply) = self.handle_message(element).await {
                        responses.push(reply);
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    Some(Value::Array(responses))
                }
            }
            Ok(single) => self.handle_message(single).await,
        };
        response.map(|value| encode(&value))
    }

    /// Handles one decoded protocol message.
    async fn handle_message(&self, request: Value) -> Option<Value> {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let Some(object) = request.as_object() else {
            return Some(error_response(id, INVALID_REQUEST, "Invalid Request"));
        };
        if object.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Some(error_response(id, INVALID_REQUEST, "Invalid Request"));
        }
        let Some(method) = object.get("method").and_then(Value::as_str) else {
            return Some(error_response(id, METHOD_NOT_FOUND, "Method not found"));
        };
        let params = object.get("params").cloned().unwrap_or(Value::Null);

        if !object.contains_key("id") {
            // Notifications are intentionally ignored.
            return None;
        }

        let result = match method {
            "initialize" => self.initialize(&params),
            "ping" => Ok(json!({ "status": "ok" })),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(&params).await,
            "resources/list" => self.list_resources(),
            "resources/read" => self.read_resource(&params),
            "prompts/list" => self.list_prompts(),
            _ => return Some(error_response(id, METHOD_NOT_FOUND, "Method not found")),
        };
        Some(match result {
            Ok(value) => json!({ "jsonrpc": "2.0", "id": id, "result": value }),
            Err(err) => error_response(id, INTERNAL_ERROR, &err.to_string()),
        })
    }

    /// Handles `initialize`, validating an optional requested version.
    fn initialize(&self, params: &Value) -> Result<Value, DispatchError> {
        let requested = params.get("protocolVersion");
        let protocol_version = match requested {
            // Accept unknown but well-shaped versions for forward compatibility.
            Some(Value::String(version)) if is_protocol_version_shape(version) => version.clone(),
            None | Some(Value::Null) => SUPPORTED_PROTOCOL_VERSIONS[0].to_string(),
            Some(_) => return Err(DispatchError::InvalidProtocolVersion),
        };
        self.initialized.store(true, Ordering::SeqCst);
        Ok(json!({
            "protocolVersion": protocol_version,
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION,
            },
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
                "prompts": { "listChanged": false },
            },
            "instructions": self.instructions.clone(),
        }))
    }

    /// Fails state-dependent methods before `initialize` has completed.
    fn ensure_initialized(&self) -> Result<(), DispatchError> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DispatchError::NotInitialized)
        }
    }

    /// Handles `tools/list`.
    fn list_tools(&self) -> Result<Value, DispatchError> {
        self.ensure_initialized()?;
        Ok(json!({ "tools": self.registry.descriptors() }))
    }

    /// Handles `tools/call`, wrapping the envelope into protocol content.
    async fn call_tool(&self, params: &Value) -> Result<Value, DispatchError> {
        self.ensure_initialized()?;
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return Err(DispatchError::InvalidParams(
                "parameter \"name\" is required".to_string(),
            ));
        };
        let arguments = match params.get("arguments") {
            None => json!({}),
            Some(value) if value.is_object() => value.clone(),
            Some(_) => {
                return Err(DispatchError::InvalidParams(
                    "parameter \"arguments\" must be an object".to_string(),
                ));
            }
        };

        let envelope = self.registry.invoke(name, arguments).await?;
        let is_error = !envelope.ok;
        let text = serde_json::to_string_pretty(&envelope)
            .map_err(|err| DispatchError::Serialization(err.to_string()))?;
        let mut content = vec![json!({ "type": "text", "text": text })];
        if let Some(stream) = envelope
            .data
            .as_ref()
            .and_then(|data| data.get("stream"))
            .and_then(Value::as_array)
        {
            content.extend(stream.iter().cloned());
        }
        Ok(json!({ "content": content, "isError": is_error }))
    }

    /// Handles `resources/list`.
    fn list_resources(&self) -> Result<Value, DispatchError> {
        self.ensure_initialized()?;
        Ok(json!({ "resources": self.resources.describe() }))
    }

    /// Handles `resources/read`.
    fn read_resource(&self, params: &Value) -> Result<Value, DispatchError> {
        self.ensure_initialized()?;
        let Some(uri) = params.get("uri").and_then(Value::as_str) else {
            return Err(DispatchError::InvalidParams(
                "parameter \"uri\" is required".to_string(),
            ));
        };
        let resource = self
            .resources
            .read(uri)
            .ok_or_else(|| DispatchError::ResourceNotFound(uri.to_string()))?;
        Ok(json!({
            "contents": [{
                "uri": resource.uri.clone(),
                "mimeType": resource.mime_type.clone(),
                "text": resource.text.clone(),
            }],
        }))
    }

    /// Handles `prompts/list`.
    fn list_prompts(&self) -> Result<Value, DispatchError> {
        self.ensure_initialized()?;
        Ok(json!({ "prompts": self.prompts.describe() }))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a structured error response.
fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
        },
    })
}

/// Encodes a response value, falling back to a serialization error object.
fn encode(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| {
        "{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{\"code\":-32603,\"message\":\
         \"serialization failed\"}}"
            .to_string()
    })
}

/// Returns whether a requested version matches the `YYYY-MM-DD` shape.
fn is_protocol_version_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures raised while handling a recognized method.
///
/// Every variant surfaces as an internal protocol error with this display
/// text; the dispatcher never lets one escape past the transport boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A state-dependent method ran before `initialize`.
    #[error("server has not been initialized; call initialize first")]
    NotInitialized,
    /// The requested protocol version is malformed.
    #[error("invalid protocol version format; expected YYYY-MM-DD")]
    InvalidProtocolVersion,
    /// Required parameters are missing or have the wrong shape.
    #[error("{0}")]
    InvalidParams(String),
    /// A resource URI did not resolve.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// Response serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// A registry invocation failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
