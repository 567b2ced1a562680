// crates/upgrade-compass-mcp/src/audit.rs
// ============================================================================
// Module: Audit Logging
// Description: Structured audit events for registry and server lifecycles.
// Purpose: Emit machine-readable logs without hard pipeline dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are serde-serializable records written as single JSON lines.
//! Sinks are intentionally lightweight so deployments can route events to
//! their preferred logging pipeline without redesign: stderr for interactive
//! use, an append-only file for supervised processes, and a no-op sink for
//! tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Structured audit event payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A tool was registered (or silently replaced a prior entry).
    ToolRegistered {
        /// Tool name.
        tool: String,
    },
    /// An invocation targeted an unregistered tool name.
    ToolNotFound {
        /// Requested tool name.
        tool: String,
    },
    /// A tool invocation started.
    ToolInvocationStarted {
        /// Tool name.
        tool: String,
        /// Number of top-level payload fields.
        payload_fields: usize,
    },
    /// A tool invocation completed and returned an envelope.
    ToolInvocationCompleted {
        /// Tool name.
        tool: String,
        /// Elapsed milliseconds.
        duration_ms: f64,
        /// Envelope success flag.
        success: bool,
    },
    /// A completed invocation carried warnings.
    ToolInvocationWarnings {
        /// Tool name.
        tool: String,
        /// Warning messages.
        warnings: Vec<String>,
    },
    /// A tool invocation failed with an error.
    ToolInvocationFailed {
        /// Tool name.
        tool: String,
        /// Elapsed milliseconds.
        duration_ms: f64,
        /// Normalized error kind label.
        error_kind: &'static str,
        /// Error message.
        message: String,
    },
    /// The server started serving a transport.
    ServerStarted {
        /// Transport label.
        transport: &'static str,
    },
    /// The server stopped serving.
    ServerStopped {
        /// Transport label.
        transport: &'static str,
    },
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Emits one audit event.
    fn emit(&self, event: &AuditEvent);
}

/// Sink that writes JSON lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn emit(&self, event: &AuditEvent) {
        if let Some(line) = render(event) {
            let mut stderr = std::io::stderr().lock();
            let _ = stderr.write_all(line.as_bytes());
            let _ = stderr.write_all(b"\n");
        }
    }
}

/// Sink that appends JSON lines to a file.
#[derive(Debug)]
pub struct FileAuditSink {
    /// Append-only log file handle.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens (or creates) the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be opened.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn emit(&self, event: &AuditEvent) {
        let Some(line) = render(event) else {
            return;
        };
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.write_all(b"\n");
        }
    }
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: &AuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders an event as a JSON line with a millisecond timestamp.
fn render(event: &AuditEvent) -> Option<String> {
    let mut value = serde_json::to_value(event).ok()?;
    if let Value::Object(fields) = &mut value {
        fields.insert("timestamp_ms".to_string(), Value::from(timestamp_ms()));
    }
    serde_json::to_string(&value).ok()
}

/// Milliseconds since the unix epoch.
fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
