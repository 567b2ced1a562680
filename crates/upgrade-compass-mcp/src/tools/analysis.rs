// crates/upgrade-compass-mcp/src/tools/analysis.rs
// ============================================================================
// Module: Manifest Analysis Tools
// Description: Edition and dependency analysis over Cargo manifests.
// Purpose: Report where a project stands before an upgrade starts.
// Dependencies: upgrade-compass-core
// ============================================================================

//! ## Overview
//! Analysis tools read the resolved project's manifest and report edition
//! standing and dependency facts. Missing or malformed manifests are
//! `ok: false` envelopes so a client can fall back to asking for an explicit
//! `project_path`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use upgrade_compass_core::ManifestError;
use upgrade_compass_core::ManifestInspector;
use upgrade_compass_core::ProjectAnalysis;
use upgrade_compass_core::ToolEnvelope;
use upgrade_compass_core::ToolError;
use upgrade_compass_core::ToolTimer;
use upgrade_compass_core::manifest::DependencyKind;
use upgrade_compass_core::tool::Tool;

use crate::tools::ToolContext;
use crate::tools::invalid_request;

// ============================================================================
// SECTION: analyze_current_edition
// ============================================================================

/// Reports the project's edition standing and suggested upgrade path.
pub struct AnalyzeCurrentEditionTool {
    /// Shared tool context.
    context: ToolContext,
}

impl AnalyzeCurrentEditionTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for AnalyzeCurrentEditionTool {
    fn name(&self) -> &str {
        "analyze_current_edition"
    }

    fn description(&self) -> &str {
        "Read the project manifest and report its edition, toolchain floor, and the \
         suggested next upgrade path."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_path": {
                    "type": "string",
                    "description": "Project root to analyze (defaults to the configured root).",
                },
            },
        })
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        let root = match self.context.resolve_root(payload) {
            Ok(root) => root,
            Err(message) => return Ok(invalid_request(&message, &timer)),
        };
        let summary = match ManifestInspector::inspect_root(&root) {
            Ok(summary) => summary,
            Err(err) => return Ok(manifest_failure(&err, &timer)),
        };
        let analysis = ProjectAnalysis::from_summary(&summary);
        Ok(ToolEnvelope::success(
            json!({
                "package_name": summary.package_name,
                "is_workspace_root": summary.is_workspace_root,
                "analysis": analysis,
            }),
            Vec::new(),
            &timer,
        ))
    }
}

// ============================================================================
// SECTION: analyze_dependencies
// ============================================================================

/// Reports declared dependencies and flags unpinned requirements.
pub struct AnalyzeDependenciesTool {
    /// Shared tool context.
    context: ToolContext,
}

impl AnalyzeDependenciesTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for AnalyzeDependenciesTool {
    fn name(&self) -> &str {
        "analyze_dependencies"
    }

    fn description(&self) -> &str {
        "List the project's declared dependencies with their requirement sources."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "project_path": {
                    "type": "string",
                    "description": "Project root to analyze (defaults to the configured root).",
                },
            },
        })
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        let root = match self.context.resolve_root(payload) {
            Ok(root) => root,
            Err(message) => return Ok(invalid_request(&message, &timer)),
        };
        let summary = match ManifestInspector::inspect_root(&root) {
            Ok(summary) => summary,
            Err(err) => return Ok(manifest_failure(&err, &timer)),
        };

        let mut warnings = Vec::new();
        for dependency in &summary.dependencies {
            if dependency.requirement == "*" {
                warnings.push(format!(
                    "Dependency {} has an unpinned requirement.",
                    dependency.name
                ));
            }
        }
        let count = |kind: DependencyKind| {
            summary.dependencies.iter().filter(|dep| dep.kind == kind).count()
        };
        let dependency_count = count(DependencyKind::Normal);
        let dev_dependency_count = count(DependencyKind::Dev);
        let build_dependency_count = count(DependencyKind::Build);
        Ok(ToolEnvelope::success(
            json!({
                "dependencies": summary.dependencies,
                "dependency_count": dependency_count,
                "dev_dependency_count": dev_dependency_count,
                "build_dependency_count": build_dependency_count,
            }),
            warnings,
            &timer,
        ))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a failure envelope from a manifest error.
fn manifest_failure(error: &ManifestError, timer: &ToolTimer) -> ToolEnvelope {
    let code = match error {
        ManifestError::NotFound(_) => "not_found",
        _ => "manifest_error",
    };
    ToolEnvelope::failure(error.to_string(), Some(code.to_string()), Vec::new(), timer)
}
