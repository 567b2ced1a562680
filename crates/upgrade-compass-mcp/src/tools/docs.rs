// crates/upgrade-compass-mcp/src/tools/docs.rs
// ============================================================================
// Module: Documentation Tools
// Description: Knowledge base search and lookup tools.
// Purpose: Serve upgrade guides, breaking changes, and paths to clients.
// Dependencies: upgrade-compass-core
// ============================================================================

//! ## Overview
//! Documentation tools are thin wrappers over the knowledge base service.
//! Unknown identifiers surface as `ok: false` envelopes with a `not_found`
//! code so broad client workflows keep moving.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use upgrade_compass_core::ToolEnvelope;
use upgrade_compass_core::ToolError;
use upgrade_compass_core::ToolTimer;
use upgrade_compass_core::tool::Tool;

use crate::tools::ToolContext;
use crate::tools::invalid_request;
use crate::tools::knowledge_failure;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default search result limit.
const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Hard cap on search results.
const MAX_SEARCH_LIMIT: usize = 50;

// ============================================================================
// SECTION: search_upgrade_docs
// ============================================================================

/// Searches the knowledge base.
pub struct SearchUpgradeDocsTool {
    /// Shared tool context.
    context: ToolContext,
}

impl SearchUpgradeDocsTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for SearchUpgradeDocsTool {
    fn name(&self) -> &str {
        "search_upgrade_docs"
    }

    fn description(&self) -> &str {
        "Search breaking changes and usage patterns in the upgrade knowledge base."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Whitespace-separated search terms.",
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum results to return (default 10).",
                },
            },
            "required": ["query"],
        })
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        let Some(query) = payload.get("query").and_then(Value::as_str) else {
            return Ok(invalid_request("parameter \"query\" is required", &timer));
        };
        let limit = payload
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(DEFAULT_SEARCH_LIMIT, |value| {
                usize::try_from(value).unwrap_or(MAX_SEARCH_LIMIT).min(MAX_SEARCH_LIMIT)
            });
        let results = self.context.knowledge.search(query, limit);
        Ok(ToolEnvelope::success(
            json!({
                "query": query,
                "results": results,
            }),
            Vec::new(),
            &timer,
        ))
    }
}

// ============================================================================
// SECTION: get_upgrade_guide
// ============================================================================

/// Returns one breaking-change document by slug.
pub struct GetUpgradeGuideTool {
    /// Shared tool context.
    context: ToolContext,
}

impl GetUpgradeGuideTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for GetUpgradeGuideTool {
    fn name(&self) -> &str {
        "get_upgrade_guide"
    }

    fn description(&self) -> &str {
        "Fetch the breaking-change document for one edition slug."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "slug": {
                    "type": "string",
                    "description": "Breaking-change document slug (for example rust-2024).",
                },
            },
            "required": ["slug"],
        })
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        let Some(slug) = payload.get("slug").and_then(Value::as_str) else {
            return Ok(invalid_request("parameter \"slug\" is required", &timer));
        };
        match self.context.knowledge.breaking_change_doc(slug) {
            Ok(document) => Ok(ToolEnvelope::success(
                json!({ "document": document }),
                Vec::new(),
                &timer,
            )),
            Err(err) => Ok(knowledge_failure(&err, &timer)),
        }
    }
}

// ============================================================================
// SECTION: get_breaking_change_details
// ============================================================================

/// Returns one breaking-change entry by slug and change identifier.
pub struct GetBreakingChangeDetailsTool {
    /// Shared tool context.
    context: ToolContext,
}

impl GetBreakingChangeDetailsTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for GetBreakingChangeDetailsTool {
    fn name(&self) -> &str {
        "get_breaking_change_details"
    }

    fn description(&self) -> &str {
        "Fetch one breaking-change entry with its remediation guidance."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "slug": {
                    "type": "string",
                    "description": "Breaking-change document slug.",
                },
                "change_id": {
                    "type": "string",
                    "description": "Entry identifier within the document.",
                },
            },
            "required": ["slug", "change_id"],
        })
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        let Some(slug) = payload.get("slug").and_then(Value::as_str) else {
            return Ok(invalid_request("parameter \"slug\" is required", &timer));
        };
        let Some(change_id) = payload.get("change_id").and_then(Value::as_str) else {
            return Ok(invalid_request("parameter \"change_id\" is required", &timer));
        };
        match self.context.knowledge.breaking_change_entry(slug, change_id) {
            Ok(entry) => Ok(ToolEnvelope::success(
                json!({
                    "slug": slug,
                    "entry": entry,
                }),
                Vec::new(),
                &timer,
            )),
            Err(err) => Ok(knowledge_failure(&err, &timer)),
        }
    }
}

// ============================================================================
// SECTION: list_deprecated_features
// ============================================================================

/// Lists every corpus entry marking a deprecated feature.
pub struct ListDeprecatedFeaturesTool {
    /// Shared tool context.
    context: ToolContext,
}

impl ListDeprecatedFeaturesTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for ListDeprecatedFeaturesTool {
    fn name(&self) -> &str {
        "list_deprecated_features"
    }

    fn description(&self) -> &str {
        "List deprecated features across every edition document."
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let _ = payload;
        let timer = ToolTimer::start();
        match self.context.knowledge.deprecated_features() {
            Ok(deprecated) => {
                let features: Vec<Value> = deprecated
                    .into_iter()
                    .map(|(slug, entry)| {
                        json!({
                            "slug": slug,
                            "entry": entry,
                        })
                    })
                    .collect();
                Ok(ToolEnvelope::success(
                    json!({ "deprecated_features": features }),
                    Vec::new(),
                    &timer,
                ))
            }
            Err(err) => Ok(knowledge_failure(&err, &timer)),
        }
    }
}

// ============================================================================
// SECTION: get_upgrade_path
// ============================================================================

/// Returns an upgrade path by identifier or edition pair.
pub struct GetUpgradePathTool {
    /// Shared tool context.
    context: ToolContext,
}

impl GetUpgradePathTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for GetUpgradePathTool {
    fn name(&self) -> &str {
        "get_upgrade_path"
    }

    fn description(&self) -> &str {
        "Fetch the step-by-step upgrade path between two editions."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "identifier": {
                    "type": "string",
                    "description": "Path identifier (for example 2021-to-2024).",
                },
                "from": {
                    "type": "string",
                    "description": "Source edition (used with \"to\").",
                },
                "to": {
                    "type": "string",
                    "description": "Target edition (used with \"from\").",
                },
            },
        })
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        let identifier = match payload.get("identifier").and_then(Value::as_str) {
            Some(identifier) => identifier.to_string(),
            None => {
                let from = payload.get("from").and_then(Value::as_str);
                let to = payload.get("to").and_then(Value::as_str);
                match (from, to) {
                    (Some(from), Some(to)) => format!("{from}-to-{to}"),
                    _ => {
                        return Ok(invalid_request(
                            "parameter \"identifier\" or the \"from\"/\"to\" pair is required",
                            &timer,
                        ));
                    }
                }
            }
        };
        match self.context.knowledge.upgrade_path(&identifier) {
            Ok(path) => Ok(ToolEnvelope::success(
                json!({
                    "identifier": identifier,
                    "path": path,
                }),
                Vec::new(),
                &timer,
            )),
            Err(err) => Ok(knowledge_failure(&err, &timer)),
        }
    }
}
