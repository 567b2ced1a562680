// crates/upgrade-compass-core/src/tool.rs
// ============================================================================
// Module: Tool Contract
// Description: Trait and descriptor types for registered server capabilities.
// Purpose: Define the seam between the tool registry and tool implementations.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A tool is a named capability with a declared input shape that maps a JSON
//! payload to a [`crate::envelope::ToolEnvelope`]. Expected failures (invalid
//! input, domain misses) are `ok: false` envelopes; [`ToolError`] is reserved
//! for registry-level conditions and genuinely unexpected execution faults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::envelope::ToolEnvelope;

// ============================================================================
// SECTION: Tool Trait
// ============================================================================

/// A named, independently invocable server capability.
pub trait Tool: Send + Sync {
    /// Stable unique tool name.
    fn name(&self) -> &str;

    /// Human-readable tool description.
    fn description(&self) -> &str;

    /// JSON schema describing the accepted payload.
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
        })
    }

    /// Free-form annotations advertised alongside the descriptor.
    fn annotations(&self) -> Value {
        json!({})
    }

    /// Executes the tool against a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Failed`] only for unexpected execution faults;
    /// expected failures are reported as `ok: false` envelopes.
    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError>;

    /// Builds the wire descriptor for this tool.
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            annotations: self.annotations(),
        }
    }
}

// ============================================================================
// SECTION: Descriptor
// ============================================================================

/// Wire descriptor advertised by `tools/list`.
///
/// # Invariants
/// - `name` values are unique within a registry; re-registering a name
///   silently replaces the prior entry.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for the accepted payload.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Free-form annotations.
    pub annotations: Value,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry-level tool invocation errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool name is not registered.
    #[error("tool \"{0}\" is not registered")]
    NotRegistered(String),
    /// The tool exceeded its execution allowance and was abandoned.
    ///
    /// This is a soft bound: the underlying work is not preempted, only
    /// abandoned by the caller.
    #[error("tool \"{name}\" exceeded the {limit_secs}s execution limit")]
    Timeout {
        /// Tool name.
        name: String,
        /// Configured limit in seconds.
        limit_secs: u64,
    },
    /// The tool failed with an unexpected execution fault.
    #[error("{0}")]
    Failed(String),
}
