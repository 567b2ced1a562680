// crates/upgrade-compass-core/src/envelope.rs
// ============================================================================
// Module: Tool Result Envelope
// Description: Structured result envelope produced by every tool invocation.
// Purpose: Keep tool outcomes (including failures) as data, never exceptions.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every tool returns a [`ToolEnvelope`]: schema version, success flag, data
//! or fault, warnings, and wall-clock timings. An `ok: false` envelope is a
//! normal return value; it crosses the registry boundary untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Envelope schema version stamped on every tool result.
pub const ENVELOPE_SCHEMA_VERSION: &str = "1.0.0";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result envelope returned by every tool invocation.
///
/// # Invariants
/// - `ok` is `true` iff `data` is present and `error` is absent.
/// - `warnings` is always present, possibly empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEnvelope {
    /// Envelope schema version.
    pub schema_version: String,
    /// Whether the invocation succeeded.
    pub ok: bool,
    /// Tool output payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure details when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeFault>,
    /// Non-fatal warnings accumulated during execution.
    pub warnings: Vec<String>,
    /// Execution timings.
    pub timings: EnvelopeTimings,
}

/// Failure details carried inside an `ok: false` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeFault {
    /// Human-readable failure message.
    pub message: String,
    /// Stable machine-readable failure code when available.
    pub code: Option<String>,
}

/// Execution timings recorded for a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeTimings {
    /// Elapsed wall-clock milliseconds.
    pub ms: f64,
}

/// Wall-clock timer started at the top of a tool invocation.
#[derive(Debug, Clone, Copy)]
pub struct ToolTimer {
    /// Instant the invocation started.
    started: Instant,
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl ToolTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Returns elapsed milliseconds rounded to three decimals.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        let ms = self.started.elapsed().as_secs_f64() * 1000.0;
        (ms * 1000.0).round() / 1000.0
    }
}

impl ToolEnvelope {
    /// Builds a success envelope.
    #[must_use]
    pub fn success(data: Value, warnings: Vec<String>, timer: &ToolTimer) -> Self {
        Self {
            schema_version: ENVELOPE_SCHEMA_VERSION.to_string(),
            ok: true,
            data: Some(data),
            error: None,
            warnings,
            timings: EnvelopeTimings {
                ms: timer.elapsed_ms(),
            },
        }
    }

    /// Builds a failure envelope.
    #[must_use]
    pub fn failure(
        message: impl Into<String>,
        code: Option<String>,
        warnings: Vec<String>,
        timer: &ToolTimer,
    ) -> Self {
        Self {
            schema_version: ENVELOPE_SCHEMA_VERSION.to_string(),
            ok: false,
            data: None,
            error: Some(EnvelopeFault {
                message: message.into(),
                code,
            }),
            warnings,
            timings: EnvelopeTimings {
                ms: timer.elapsed_ms(),
            },
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
