// crates/upgrade-compass-core/src/search.rs
// ============================================================================
// Module: Knowledge Search Index
// Description: Token-scored lexical search over the upgrade knowledge base.
// Purpose: Rank breaking changes and patterns for documentation lookups.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The index flattens breaking-change entries and usage patterns into token
//! strings at construction time. A query scores one point per term contained
//! in an entry's tokens; results order by score descending, then kind, then
//! title, so identical inputs always rank identically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::knowledge::BreakingChangeDoc;
use crate::knowledge::PatternDoc;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum summary length in characters.
const SUMMARY_MAX_CHARS: usize = 200;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Entry kind (`breaking_change` or `pattern`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Stable entry identifier.
    pub id: String,
    /// Entry title.
    pub title: String,
    /// Truncated description.
    pub summary: String,
    /// Kind-specific metadata.
    pub metadata: Value,
    /// Number of query terms matched.
    pub score: usize,
}

/// A flattened, searchable entry.
#[derive(Debug, Clone)]
struct IndexEntry {
    /// Entry kind (`breaking_change` or `pattern`).
    kind: String,
    /// Stable entry identifier.
    id: String,
    /// Entry title.
    title: String,
    /// Truncated description.
    summary: String,
    /// Kind-specific metadata.
    metadata: Value,
    /// Lowercased token haystack.
    tokens: String,
}

/// Lexical search index over the knowledge base.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    /// Flattened entries.
    entries: Vec<IndexEntry>,
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl SearchIndex {
    /// Builds the index from loaded corpus documents.
    #[must_use]
    pub fn build(
        breaking_changes: &[&BreakingChangeDoc],
        patterns: impl Iterator<Item = (String, PatternDoc)>,
    ) -> Self {
        let mut entries = Vec::new();
        for doc in breaking_changes {
            for change in &doc.entries {
                let identifier = format!("{}::{}", doc.slug, change.id);
                let metadata = json!({
                    "slug": doc.slug.clone(),
                    "edition": doc.edition.clone(),
                    "severity": change.severity.clone(),
                    "category": change.category.clone(),
                });
                entries.push(make_entry(
                    "breaking_change",
                    &identifier,
                    &change.title,
                    &change.description,
                    metadata,
                    &[
                        change.id.as_str(),
                        change.severity.as_str(),
                        change.category.as_str(),
                        doc.edition.as_str(),
                    ],
                ));
            }
        }
        for (pattern_id, pattern) in patterns {
            let metadata = json!({
                "category": pattern.category.clone(),
                "severity": pattern.severity.clone(),
                "applies_to_editions": pattern.applies_to_editions.clone(),
            });
            let mut extra: Vec<&str> =
                pattern.applies_to_editions.iter().map(String::as_str).collect();
            extra.push(&pattern.category);
            entries.push(make_entry(
                "pattern",
                &pattern_id,
                &pattern.name,
                &pattern.description,
                metadata,
                &extra,
            ));
        }
        Self {
            entries,
        }
    }

    /// Returns ranked hits for a whitespace-separated query.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let trimmed = query.trim();
        if trimmed.is_empty() || limit == 0 {
            return Vec::new();
        }
        let terms: Vec<String> =
            trimmed.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let score =
                    terms.iter().filter(|term| entry.tokens.contains(term.as_str())).count();
                (score > 0).then(|| SearchHit {
                    kind: entry.kind.clone(),
                    id: entry.id.clone(),
                    title: entry.title.clone(),
                    summary: entry.summary.clone(),
                    metadata: entry.metadata.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|left, right| {
            right
                .score
                .cmp(&left.score)
                .then_with(|| left.kind.cmp(&right.kind))
                .then_with(|| left.title.cmp(&right.title))
        });
        hits.truncate(limit);
        hits
    }

    /// Returns the number of indexed entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds one index entry with its token haystack.
fn make_entry(
    kind: &str,
    id: &str,
    title: &str,
    description: &str,
    metadata: Value,
    extra_tokens: &[&str],
) -> IndexEntry {
    let summary = summarize(description);
    let mut token_source = format!("{title} {summary}");
    for token in extra_tokens {
        if !token.is_empty() {
            token_source.push(' ');
            token_source.push_str(token);
        }
    }
    IndexEntry {
        kind: kind.to_string(),
        id: id.to_string(),
        title: title.to_string(),
        summary,
        metadata,
        tokens: token_source.to_lowercase(),
    }
}

/// Truncates a description to the summary length.
fn summarize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SUMMARY_MAX_CHARS {
        return trimmed.to_string();
    }
    let clipped: String = trimmed.chars().take(SUMMARY_MAX_CHARS - 3).collect();
    format!("{}...", clipped.trim_end())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
