// crates/upgrade-compass-mcp/src/tools.rs
// ============================================================================
// Module: Tool Set
// Description: Shared tool context and the explicit registration list.
// Purpose: Wire every server capability into the registry at startup.
// Dependencies: upgrade-compass-core
// ============================================================================

//! ## Overview
//! Tools are constructed and registered by an explicit builder so the
//! available capability set is statically known. Each tool receives a
//! [`ToolContext`] handle: the knowledge base, the configured default project
//! root, and the scan exclusion list. Invalid payloads and expected domain
//! misses are reported as `ok: false` envelopes, never as errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod analysis;
pub mod code;
pub mod docs;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use upgrade_compass_core::FilesystemScanner;
use upgrade_compass_core::KnowledgeBase;
use upgrade_compass_core::KnowledgeError;
use upgrade_compass_core::ProjectContext;
use upgrade_compass_core::ToolEnvelope;
use upgrade_compass_core::ToolTimer;

use crate::registry::ToolRegistry;

// ============================================================================
// SECTION: Tool Context
// ============================================================================

/// Shared handles passed to every tool at construction.
#[derive(Clone)]
pub struct ToolContext {
    /// Knowledge base service.
    pub knowledge: Arc<KnowledgeBase>,
    /// Default project root used when a payload omits `project_path`.
    pub default_root: Option<PathBuf>,
    /// Directory names excluded from scans.
    pub excluded_dirs: Vec<String>,
}

impl ToolContext {
    /// Resolves the project root from a payload or the configured default.
    ///
    /// # Errors
    ///
    /// Returns a message suitable for an invalid-request envelope.
    pub fn resolve_root(&self, payload: &Value) -> Result<PathBuf, String> {
        if let Some(path) = payload.get("project_path").and_then(Value::as_str) {
            return Ok(PathBuf::from(path));
        }
        self.default_root.clone().ok_or_else(|| {
            "parameter \"project_path\" is required when no default project root is configured"
                .to_string()
        })
    }

    /// Builds a call-scoped scanner rooted at the resolved project root.
    ///
    /// # Errors
    ///
    /// Returns a message suitable for an invalid-request envelope.
    pub fn scanner(&self, payload: &Value) -> Result<FilesystemScanner, String> {
        let root = self.resolve_root(payload)?;
        let context = ProjectContext::new(&root, self.excluded_dirs.iter().cloned())
            .map_err(|err| err.to_string())?;
        Ok(FilesystemScanner::new(context))
    }
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers the complete tool set.
pub fn register_default_tools(registry: &mut ToolRegistry, context: &ToolContext) {
    registry.register(Arc::new(code::FindUsagePatternsTool::new(context.clone())));
    registry.register(Arc::new(code::ScanBreakingChangesTool::new(context.clone())));
    registry.register(Arc::new(docs::SearchUpgradeDocsTool::new(context.clone())));
    registry.register(Arc::new(docs::GetUpgradeGuideTool::new(context.clone())));
    registry.register(Arc::new(docs::GetBreakingChangeDetailsTool::new(context.clone())));
    registry.register(Arc::new(docs::ListDeprecatedFeaturesTool::new(context.clone())));
    registry.register(Arc::new(docs::GetUpgradePathTool::new(context.clone())));
    registry.register(Arc::new(analysis::AnalyzeCurrentEditionTool::new(context.clone())));
    registry.register(Arc::new(analysis::AnalyzeDependenciesTool::new(context.clone())));
}

// ============================================================================
// SECTION: Envelope Helpers
// ============================================================================

/// Builds an invalid-request failure envelope.
#[must_use]
pub fn invalid_request(message: &str, timer: &ToolTimer) -> ToolEnvelope {
    ToolEnvelope::failure(message, Some("invalid_request".to_string()), Vec::new(), timer)
}

/// Builds a failure envelope from a knowledge base error.
///
/// Misses keep their typed identity through a `not_found` code; every other
/// corpus failure maps to `knowledge_error`.
#[must_use]
pub fn knowledge_failure(error: &KnowledgeError, timer: &ToolTimer) -> ToolEnvelope {
    let code = match error {
        KnowledgeError::NotFound {
            ..
        } => "not_found",
        _ => "knowledge_error",
    };
    ToolEnvelope::failure(error.to_string(), Some(code.to_string()), Vec::new(), timer)
}
