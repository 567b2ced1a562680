// crates/upgrade-compass-mcp/src/prompts.rs
// ============================================================================
// Module: Prompt Catalog
// Description: Static prompt descriptors advertised by `prompts/list`.
// Purpose: Offer reusable upgrade-workflow prompts to protocol clients.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Prompts are a fixed descriptor list assembled by an explicit builder.
//! They carry no server-side execution; clients fill the declared arguments
//! themselves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One declared prompt argument.
#[derive(Debug, Clone, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Argument description.
    pub description: String,
    /// Whether the argument must be supplied.
    pub required: bool,
}

/// One advertised prompt.
#[derive(Debug, Clone, Serialize)]
pub struct PromptDescriptor {
    /// Stable prompt name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared arguments.
    pub arguments: Vec<PromptArgument>,
}

/// Catalog of prompts built at startup.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    /// Descriptors in listing order.
    descriptors: Vec<PromptDescriptor>,
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl PromptCatalog {
    /// Builds the default prompt set.
    #[must_use]
    pub fn default_prompts() -> Self {
        Self {
            descriptors: vec![
                PromptDescriptor {
                    name: "upgrade_foundation".to_string(),
                    description: "Establish a pre-upgrade baseline: tests, metrics, \
                                  backups, and a clean working tree."
                        .to_string(),
                    arguments: vec![argument(
                        "target_edition",
                        "Edition the upgrade is aiming for.",
                        true,
                    )],
                },
                PromptDescriptor {
                    name: "breaking_change_review".to_string(),
                    description: "Review one breaking change against scan evidence and \
                                  plan the mechanical fixes."
                        .to_string(),
                    arguments: vec![
                        argument("slug", "Breaking-change document slug.", true),
                        argument("change_id", "Entry identifier within the document.", true),
                    ],
                },
                PromptDescriptor {
                    name: "dependency_upgrade".to_string(),
                    description: "Plan dependency requirement bumps that unblock an \
                                  edition migration."
                        .to_string(),
                    arguments: vec![argument(
                        "crate_name",
                        "Dependency to plan the bump for.",
                        false,
                    )],
                },
            ],
        }
    }

    /// Returns the descriptors in listing order.
    #[must_use]
    pub fn describe(&self) -> &[PromptDescriptor] {
        &self.descriptors
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds one prompt argument.
fn argument(name: &str, description: &str, required: bool) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        description: description.to_string(),
        required,
    }
}
