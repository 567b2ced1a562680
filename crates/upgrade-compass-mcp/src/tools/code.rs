// crates/upgrade-compass-mcp/src/tools/code.rs
// ============================================================================
// Module: Code Scanning Tools
// Description: Pattern search and breaking-change scans over a project tree.
// Purpose: Surface upgrade-relevant evidence from project sources.
// Dependencies: upgrade-compass-core
// ============================================================================

//! ## Overview
//! These tools drive the filesystem scanner: `find_usage_patterns` evaluates
//! one knowledge base pattern or a caller-supplied regex/glob combination,
//! and `scan_breaking_changes` sweeps every applicable pattern for a broad
//! migration report. Scanners are call-scoped; each invocation builds its
//! own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use upgrade_compass_core::FilesystemScanner;
use upgrade_compass_core::PatternDoc;
use upgrade_compass_core::ToolEnvelope;
use upgrade_compass_core::ToolError;
use upgrade_compass_core::ToolTimer;
use upgrade_compass_core::scan::DEFAULT_MAX_MATCHES;
use upgrade_compass_core::scan::escape_literal;
use upgrade_compass_core::tool::Tool;

use crate::tools::ToolContext;
use crate::tools::invalid_request;
use crate::tools::knowledge_failure;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default glob applied to custom regex searches.
const DEFAULT_CUSTOM_GLOB: &str = "**/*.rs";

// ============================================================================
// SECTION: find_usage_patterns
// ============================================================================

/// Searches the project for one knowledge base pattern or a custom regex.
pub struct FindUsagePatternsTool {
    /// Shared tool context.
    context: ToolContext,
}

impl FindUsagePatternsTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for FindUsagePatternsTool {
    fn name(&self) -> &str {
        "find_usage_patterns"
    }

    fn description(&self) -> &str {
        "Search the project for usage patterns defined in the knowledge base or custom \
         regex/glob combinations."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Knowledge base pattern id, or a regex for custom searches.",
                },
                "glob": {
                    "type": "string",
                    "description": "File glob for custom searches (defaults to **/*.rs).",
                },
                "project_path": {
                    "type": "string",
                    "description": "Project root to scan (defaults to the configured root).",
                },
            },
            "required": ["pattern"],
        })
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        let Some(pattern_id) = payload.get("pattern").and_then(Value::as_str) else {
            return Ok(invalid_request("parameter \"pattern\" is required", &timer));
        };
        let scanner = match self.context.scanner(payload) {
            Ok(scanner) => scanner,
            Err(message) => return Ok(invalid_request(&message, &timer)),
        };

        let known_ids = match self.context.knowledge.list_pattern_ids() {
            Ok(ids) => ids,
            Err(err) => return Ok(knowledge_failure(&err, &timer)),
        };

        let mut warnings = Vec::new();
        let results = if known_ids.iter().any(|id| id == pattern_id) {
            let pattern = match self.context.knowledge.pattern(pattern_id) {
                Ok(pattern) => pattern,
                Err(err) => return Ok(knowledge_failure(&err, &timer)),
            };
            vec![json!({
                "pattern_id": pattern_id,
                "matches": analyze_pattern(&scanner, &pattern),
            })]
        } else {
            let glob = payload
                .get("glob")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_CUSTOM_GLOB)
                .to_string();
            let matches = search_with_regex(&scanner, &glob, pattern_id);
            if matches.is_empty() {
                warnings
                    .push(format!("No matches found for regex {pattern_id} within {glob}."));
            }
            vec![json!({
                "pattern_id": null,
                "regex": pattern_id,
                "glob": glob,
                "matches": matches,
            })]
        };

        Ok(ToolEnvelope::success(json!({ "results": results }), warnings, &timer))
    }
}

// ============================================================================
// SECTION: scan_breaking_changes
// ============================================================================

/// Sweeps every applicable knowledge base pattern over the project.
pub struct ScanBreakingChangesTool {
    /// Shared tool context.
    context: ToolContext,
}

impl ScanBreakingChangesTool {
    /// Creates the tool.
    #[must_use]
    pub const fn new(context: ToolContext) -> Self {
        Self {
            context,
        }
    }
}

impl Tool for ScanBreakingChangesTool {
    fn name(&self) -> &str {
        "scan_breaking_changes"
    }

    fn description(&self) -> &str {
        "Scan the project for every detectable upgrade pattern, optionally filtered to \
         the editions being migrated."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "editions": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Only run patterns applying to these editions.",
                },
                "project_path": {
                    "type": "string",
                    "description": "Project root to scan (defaults to the configured root).",
                },
            },
        })
    }

    fn execute(&self, payload: &Value) -> Result<ToolEnvelope, ToolError> {
        let timer = ToolTimer::start();
        let scanner = match self.context.scanner(payload) {
            Ok(scanner) => scanner,
            Err(message) => return Ok(invalid_request(&message, &timer)),
        };
        let editions: Option<Vec<String>> = payload.get("editions").and_then(Value::as_array).map(
            |values| {
                values.iter().filter_map(Value::as_str).map(str::to_string).collect()
            },
        );

        let pattern_ids = match self.context.knowledge.list_pattern_ids() {
            Ok(ids) => ids,
            Err(err) => return Ok(knowledge_failure(&err, &timer)),
        };

        let mut warnings = Vec::new();
        let mut findings = Vec::new();
        let mut scanned = 0_usize;
        for pattern_id in &pattern_ids {
            let pattern = match self.context.knowledge.pattern(pattern_id) {
                Ok(pattern) => pattern,
                Err(err) => {
                    warnings.push(format!("Skipped pattern {pattern_id}: {err}"));
                    continue;
                }
            };
            if let Some(filter) = &editions {
                let applies = pattern
                    .applies_to_editions
                    .iter()
                    .any(|edition| filter.contains(edition));
                if !applies {
                    continue;
                }
            }
            scanned += 1;
            let matches = analyze_pattern(&scanner, &pattern);
            if matches.is_empty() {
                continue;
            }
            findings.push(json!({
                "pattern_id": pattern_id,
                "name": pattern.name,
                "severity": pattern.severity,
                "replacement": pattern.replacement,
                "matches": matches,
            }));
        }

        Ok(ToolEnvelope::success(
            json!({
                "findings": findings,
                "patterns_scanned": scanned,
            }),
            warnings,
            &timer,
        ))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Evaluates one knowledge base pattern against the project.
///
/// Files are selected by the pattern's globs (or the whole tree when none are
/// declared); regex and escaped literal content patterns provide evidence.
/// Files with no evidence are dropped when any content pattern exists.
fn analyze_pattern(scanner: &FilesystemScanner, pattern: &PatternDoc) -> Vec<Value> {
    let mut regexes: Vec<String> = pattern.detection.regex_patterns.clone();
    regexes.extend(pattern.detection.content_patterns.iter().map(|text| escape_literal(text)));

    let files = if pattern.detection.file_patterns.is_empty() {
        scanner.all_files().to_vec()
    } else {
        scanner.find_by_patterns(&pattern.detection.file_patterns)
    };

    let mut results = Vec::new();
    for path in files {
        let evidence = scanner.find_regex_matches(&path, &regexes, DEFAULT_MAX_MATCHES);
        if !regexes.is_empty() && evidence.is_empty() {
            continue;
        }
        results.push(json!({
            "file": scanner.to_relative_path(&path),
            "evidence": evidence,
        }));
    }
    results
}

/// Runs one custom regex against files selected by a glob.
fn search_with_regex(scanner: &FilesystemScanner, glob: &str, regex: &str) -> Vec<Value> {
    let paths = scanner.find_by_patterns(&[glob.to_string()]);
    let mut results = Vec::new();
    for path in paths {
        let evidence =
            scanner.find_regex_matches(&path, &[regex.to_string()], DEFAULT_MAX_MATCHES);
        if evidence.is_empty() {
            continue;
        }
        results.push(json!({
            "file": scanner.to_relative_path(&path),
            "evidence": evidence,
        }));
    }
    results
}
