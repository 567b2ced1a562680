// crates/upgrade-compass-mcp/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Named capability registry with audited, time-bounded dispatch.
// Purpose: Execute registered tools under a soft execution limit.
// Dependencies: upgrade-compass-core, tokio
// ============================================================================

//! ## Overview
//! The registry maps unique tool names to implementations and invokes them on
//! a blocking worker under `tokio::time::timeout`. The limit is a soft bound:
//! a tool blocked in one long operation is abandoned, not preempted. Every
//! invocation emits audit events for start, completion, warnings, and
//! failures; envelopes pass through unmodified, including `ok: false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use serde_json::Value;
use upgrade_compass_core::ToolDescriptor;
use upgrade_compass_core::ToolEnvelope;
use upgrade_compass_core::ToolError;
use upgrade_compass_core::tool::Tool;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default advisory execution limit in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Registry of named tools.
///
/// # Invariants
/// - Names are unique; registering a duplicate silently replaces the prior
///   entry.
pub struct ToolRegistry {
    /// Registered tools keyed by name.
    tools: BTreeMap<String, Arc<dyn Tool>>,
    /// Audit sink for lifecycle events.
    audit: Arc<dyn AuditSink>,
    /// Advisory execution limit in seconds (0 disables).
    timeout_secs: u64,
}

impl ToolRegistry {
    /// Creates a registry with the given audit sink and execution limit.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>, timeout_secs: u64) -> Self {
        Self {
            tools: BTreeMap::new(),
            audit,
            timeout_secs,
        }
    }

    /// Registers a tool, silently replacing any prior entry with its name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name.clone(), tool);
        self.audit.emit(&AuditEvent::ToolRegistered {
            tool: name,
        });
    }

    /// Returns whether a tool name is registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the tool registered under a name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotRegistered`] for unknown names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.tools.get(name).cloned().ok_or_else(|| {
            self.audit.emit(&AuditEvent::ToolNotFound {
                tool: name.to_string(),
            });
            ToolError::NotRegistered(name.to_string())
        })
    }

    /// Returns registered tool names in stable order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Returns wire descriptors for every registered tool.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    /// Invokes a tool by name under the configured execution limit.
    ///
    /// The name is resolved before any timeout logic runs. The returned
    /// envelope is exactly what the tool produced; failures are audited and
    /// propagated unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotRegistered`] for unknown names,
    /// [`ToolError::Timeout`] when the limit elapses, or the tool's own
    /// [`ToolError`].
    pub async fn invoke(&self, name: &str, payload: Value) -> Result<ToolEnvelope, ToolError> {
        let tool = self.get(name)?;
        let started = Instant::now();
        self.audit.emit(&AuditEvent::ToolInvocationStarted {
            tool: name.to_string(),
            payload_fields: payload.as_object().map_or(0, serde_json::Map::len),
        });

        let execution = {
            let tool = Arc::clone(&tool);
            tokio::task::spawn_blocking(move || tool.execute(&payload))
        };
        let joined = if self.timeout_secs == 0 {
            execution.await
        } else {
            match tokio::time::timeout(Duration::from_secs(self.timeout_secs), execution).await {
                Ok(joined) => joined,
                Err(_elapsed) => {
                    let error = ToolError::Timeout {
                        name: name.to_string(),
                        limit_secs: self.timeout_secs,
                    };
                    self.emit_failure(name, started, &error);
                    return Err(error);
                }
            }
        };
        let result = joined
            .map_err(|join_error| ToolError::Failed(format!("tool task failed: {join_error}")));

        match result {
            Ok(Ok(envelope)) => {
                self.audit.emit(&AuditEvent::ToolInvocationCompleted {
                    tool: name.to_string(),
                    duration_ms: elapsed_ms(started),
                    success: envelope.ok,
                });
                if !envelope.warnings.is_empty() {
                    self.audit.emit(&AuditEvent::ToolInvocationWarnings {
                        tool: name.to_string(),
                        warnings: envelope.warnings.clone(),
                    });
                }
                Ok(envelope)
            }
            Ok(Err(error)) | Err(error) => {
                self.emit_failure(name, started, &error);
                Err(error)
            }
        }
    }

    /// Emits a failure audit event.
    fn emit_failure(&self, name: &str, started: Instant, error: &ToolError) {
        self.audit.emit(&AuditEvent::ToolInvocationFailed {
            tool: name.to_string(),
            duration_ms: elapsed_ms(started),
            error_kind: error_kind(error),
            message: error.to_string(),
        });
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Elapsed milliseconds rounded to two decimals.
fn elapsed_ms(started: Instant) -> f64 {
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    (ms * 100.0).round() / 100.0
}

/// Normalized error kind label for audit events.
const fn error_kind(error: &ToolError) -> &'static str {
    match error {
        ToolError::NotRegistered(_) => "not_registered",
        ToolError::Timeout {
            ..
        } => "timeout",
        ToolError::Failed(_) => "execution_failed",
    }
}
