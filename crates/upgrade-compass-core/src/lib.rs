// crates/upgrade-compass-core/src/lib.rs
// ============================================================================
// Module: Upgrade Compass Core
// Description: Cache, scanner, knowledge base, and tool contracts.
// Purpose: Provide the analysis primitives shared by the MCP server and CLI.
// Dependencies: regex, serde, serde_json, thiserror, toml
// ============================================================================

//! ## Overview
//! Upgrade Compass core holds the primitives every server capability depends
//! on: the bounded TTL cache, the security-hardened filesystem scanner, the
//! upgrade knowledge base with its search index, Cargo manifest inspection,
//! and the tool contract (trait plus result envelope) exposed over MCP.
//! Security posture: scan targets and tool payloads are untrusted and must be
//! validated at these boundaries.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod envelope;
pub mod knowledge;
pub mod manifest;
pub mod scan;
pub mod search;
pub mod tool;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::BoundedCache;
pub use cache::CacheError;
pub use cache::CacheStats;
pub use cache::ManualTimeSource;
pub use cache::SystemTimeSource;
pub use cache::TimeSource;
pub use envelope::EnvelopeFault;
pub use envelope::EnvelopeTimings;
pub use envelope::ToolEnvelope;
pub use envelope::ToolTimer;
pub use knowledge::BreakingChange;
pub use knowledge::BreakingChangeDoc;
pub use knowledge::CorpusLoader;
pub use knowledge::KnowledgeBase;
pub use knowledge::KnowledgeError;
pub use knowledge::PatternDoc;
pub use knowledge::UpgradePath;
pub use manifest::ManifestError;
pub use manifest::ManifestInspector;
pub use manifest::ManifestSummary;
pub use manifest::ProjectAnalysis;
pub use scan::FilesystemScanner;
pub use scan::ProjectContext;
pub use scan::ScanError;
pub use scan::ScanMatch;
pub use search::SearchHit;
pub use search::SearchIndex;
pub use tool::Tool;
pub use tool::ToolDescriptor;
pub use tool::ToolError;
