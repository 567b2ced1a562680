// crates/upgrade-compass-mcp/src/resources.rs
// ============================================================================
// Module: Resource Catalog
// Description: Static read-only resource descriptors built from the corpus.
// Purpose: Serve knowledge base indexes through `resources/list` and
//          `resources/read`.
// Dependencies: upgrade-compass-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Resources are built once at startup by an explicit builder that walks the
//! knowledge base, so the advertised set is statically known. Lookups by URI
//! return `Option`; the dispatcher maps a miss to its protocol error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;
use upgrade_compass_core::KnowledgeBase;
use upgrade_compass_core::KnowledgeError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// URI prefix for knowledge base resources.
pub const RESOURCE_URI_PREFIX: &str = "compass://knowledge-base/";
/// MIME type for JSON resource bodies.
const RESOURCE_MIME_TYPE: &str = "application/json";

// ============================================================================
// SECTION: Types
// ============================================================================

/// One read-only resource with its pre-rendered body.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Stable resource URI.
    pub uri: String,
    /// Short resource name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the body.
    pub mime_type: String,
    /// Pre-rendered body text.
    pub text: String,
}

/// Catalog of resources built at startup.
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    /// Descriptors in listing order.
    descriptors: Vec<ResourceDescriptor>,
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl ResourceCatalog {
    /// Builds the catalog from the knowledge base.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the corpus cannot be loaded.
    pub fn from_knowledge_base(knowledge: &KnowledgeBase) -> Result<Self, KnowledgeError> {
        let mut descriptors = Vec::new();

        let summary = knowledge.summary()?;
        descriptors.push(descriptor(
            "summary",
            "Knowledge base summary",
            "Corpus version, coverage, and entry counts.",
            &summary,
        )?);

        let mut patterns = Vec::new();
        for pattern_id in knowledge.list_pattern_ids()? {
            let pattern = knowledge.pattern(&pattern_id)?;
            patterns.push(json!({
                "id": pattern_id,
                "name": pattern.name,
                "category": pattern.category,
                "severity": pattern.severity,
            }));
        }
        descriptors.push(descriptor(
            "patterns",
            "Usage pattern index",
            "Identifiers and categories for every detectable usage pattern.",
            &json!({ "patterns": patterns }),
        )?);

        let mut changes = Vec::new();
        for slug in knowledge.list_slugs()? {
            let doc = knowledge.breaking_change_doc(&slug)?;
            changes.push(json!({
                "slug": doc.slug,
                "edition": doc.edition,
                "title": doc.title,
                "entry_count": doc.entries.len(),
            }));
        }
        descriptors.push(descriptor(
            "breaking-changes",
            "Breaking change index",
            "Breaking-change documents keyed by edition slug.",
            &json!({ "documents": changes }),
        )?);

        let mut paths = Vec::new();
        for identifier in knowledge.list_upgrade_path_ids()? {
            let path = knowledge.upgrade_path(&identifier)?;
            paths.push(json!({
                "identifier": identifier,
                "from_edition": path.from_edition,
                "to_edition": path.to_edition,
                "summary": path.summary,
            }));
        }
        descriptors.push(descriptor(
            "upgrade-paths",
            "Upgrade path index",
            "Supported edition-to-edition upgrade paths.",
            &json!({ "upgrade_paths": paths }),
        )?);

        Ok(Self {
            descriptors,
        })
    }

    /// Returns listing entries (without bodies) for `resources/list`.
    #[must_use]
    pub fn describe(&self) -> Vec<Value> {
        self.descriptors
            .iter()
            .map(|resource| {
                json!({
                    "uri": resource.uri,
                    "name": resource.name,
                    "description": resource.description,
                    "mimeType": resource.mime_type,
                })
            })
            .collect()
    }

    /// Returns the resource registered under a URI.
    #[must_use]
    pub fn read(&self, uri: &str) -> Option<&ResourceDescriptor> {
        self.descriptors.iter().find(|resource| resource.uri == uri)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds one descriptor with a pretty-rendered JSON body.
fn descriptor(
    slug: &str,
    name: &str,
    description: &str,
    body: &Value,
) -> Result<ResourceDescriptor, KnowledgeError> {
    let text = serde_json::to_string_pretty(body).map_err(|err| KnowledgeError::Parse {
        file: format!("{RESOURCE_URI_PREFIX}{slug}"),
        reason: err.to_string(),
    })?;
    Ok(ResourceDescriptor {
        uri: format!("{RESOURCE_URI_PREFIX}{slug}"),
        name: name.to_string(),
        description: description.to_string(),
        mime_type: RESOURCE_MIME_TYPE.to_string(),
        text,
    })
}
