// crates/upgrade-compass-core/src/knowledge.rs
// ============================================================================
// Module: Upgrade Knowledge Base
// Description: Corpus loader and lookup service for upgrade guidance.
// Purpose: Serve patterns, breaking changes, and upgrade paths to tools.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The knowledge base holds the documentation corpus backing every lookup
//! tool: usage patterns with detection rules, breaking-change documents per
//! edition, and upgrade paths between editions. The default corpus is
//! embedded at compile time; a directory with the same file layout may be
//! supplied instead. Document loads are memoized through a
//! [`crate::cache::BoundedCache`]. Missing identifiers are typed
//! [`KnowledgeError::NotFound`] values, not panics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::cache::BoundedCache;
use crate::cache::CacheError;
use crate::search::SearchHit;
use crate::search::SearchIndex;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Embedded corpus index.
const EMBEDDED_INDEX: &str = include_str!("../../../knowledge-base/index.json");
/// Embedded usage patterns.
const EMBEDDED_PATTERNS: &str = include_str!("../../../knowledge-base/patterns.json");
/// Embedded upgrade paths.
const EMBEDDED_UPGRADE_PATHS: &str =
    include_str!("../../../knowledge-base/upgrade-paths.json");
/// Embedded breaking-change documents, keyed by slug.
const EMBEDDED_BREAKING_CHANGES: &[(&str, &str)] = &[
    ("rust-2021", include_str!("../../../knowledge-base/breaking-changes/rust-2021.json")),
    ("rust-2024", include_str!("../../../knowledge-base/breaking-changes/rust-2024.json")),
];

/// Largest corpus file accepted from an on-disk override, in bytes.
const MAX_CORPUS_FILE_BYTES: u64 = 256 * 1024;
/// Knowledge cache time-to-live in seconds.
const KNOWLEDGE_CACHE_TTL_SECS: u64 = 3600;
/// Knowledge cache entry ceiling.
const KNOWLEDGE_CACHE_MAX_ENTRIES: usize = 200;
/// Knowledge cache per-value byte ceiling.
const KNOWLEDGE_CACHE_MAX_VALUE_BYTES: usize = 512 * 1024;

// ============================================================================
// SECTION: Corpus Types
// ============================================================================

/// Corpus index metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeIndex {
    /// Corpus version label.
    pub knowledge_base_version: String,
    /// Last update date (`YYYY-MM-DD`).
    pub last_updated: String,
    /// Rust editions the corpus covers.
    pub editions_covered: Vec<String>,
}

/// Detection rules for a usage pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternDetection {
    /// Glob patterns selecting candidate files.
    #[serde(default)]
    pub file_patterns: Vec<String>,
    /// Regex patterns run against file contents.
    #[serde(default)]
    pub regex_patterns: Vec<String>,
    /// Literal strings matched verbatim in file contents.
    #[serde(default)]
    pub content_patterns: Vec<String>,
}

/// A usage pattern document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDoc {
    /// Human-readable pattern name.
    pub name: String,
    /// What the pattern detects and why it matters.
    pub description: String,
    /// Pattern category label.
    pub category: String,
    /// Severity label.
    pub severity: String,
    /// Editions the pattern applies to.
    #[serde(default)]
    pub applies_to_editions: Vec<String>,
    /// Detection rules.
    pub detection: PatternDetection,
    /// Suggested replacement, when one exists.
    #[serde(default)]
    pub replacement: Option<String>,
}

/// One breaking change inside an edition document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakingChange {
    /// Stable change identifier within its document.
    pub id: String,
    /// Change title.
    pub title: String,
    /// Change description.
    pub description: String,
    /// Severity label.
    pub severity: String,
    /// Category label (`deprecation` marks deprecated features).
    pub category: String,
}

/// A breaking-change document for one edition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakingChangeDoc {
    /// Stable document slug.
    pub slug: String,
    /// Edition the document covers.
    pub edition: String,
    /// Document title.
    pub title: String,
    /// Document summary.
    pub summary: String,
    /// Individual changes.
    pub entries: Vec<BreakingChange>,
}

/// One step inside an upgrade path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeStep {
    /// Step title.
    pub title: String,
    /// Step description.
    pub description: String,
    /// Pattern identifiers worth scanning for during this step.
    #[serde(default)]
    pub pattern_ids: Vec<String>,
}

/// An upgrade path between two editions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradePath {
    /// Source edition.
    pub from_edition: String,
    /// Target edition.
    pub to_edition: String,
    /// Path summary.
    pub summary: String,
    /// Ordered upgrade steps.
    pub steps: Vec<UpgradeStep>,
}

/// Container file for upgrade paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UpgradePathsFile {
    /// Paths keyed by identifier (for example `2021-to-2024`).
    upgrade_paths: BTreeMap<String, UpgradePath>,
}

// ============================================================================
// SECTION: Corpus Loader
// ============================================================================

/// Where corpus documents are read from.
#[derive(Debug, Clone)]
enum CorpusSource {
    /// Compile-time embedded corpus.
    Embedded,
    /// On-disk corpus directory with the embedded layout.
    Directory(PathBuf),
}

/// Loads corpus documents from the embedded defaults or a directory.
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    /// Active corpus source.
    source: CorpusSource,
}

impl CorpusLoader {
    /// Creates a loader over the embedded corpus.
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            source: CorpusSource::Embedded,
        }
    }

    /// Creates a loader over an on-disk corpus directory.
    #[must_use]
    pub const fn directory(path: PathBuf) -> Self {
        Self {
            source: CorpusSource::Directory(path),
        }
    }

    /// Loads the corpus index.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the index is unreadable or malformed.
    pub fn load_index(&self) -> Result<KnowledgeIndex, KnowledgeError> {
        self.parse("index.json", &self.read("index.json", EMBEDDED_INDEX)?)
    }

    /// Loads every usage pattern keyed by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the document is unreadable or
    /// malformed.
    pub fn load_patterns(&self) -> Result<BTreeMap<String, PatternDoc>, KnowledgeError> {
        self.parse("patterns.json", &self.read("patterns.json", EMBEDDED_PATTERNS)?)
    }

    /// Loads every breaking-change document keyed by slug.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when a document is unreadable or malformed.
    pub fn load_breaking_change_docs(
        &self,
    ) -> Result<BTreeMap<String, BreakingChangeDoc>, KnowledgeError> {
        let mut docs = BTreeMap::new();
        match &self.source {
            CorpusSource::Embedded => {
                for (slug, raw) in EMBEDDED_BREAKING_CHANGES {
                    let doc: BreakingChangeDoc =
                        self.parse(&format!("breaking-changes/{slug}.json"), raw)?;
                    docs.insert(doc.slug.clone(), doc);
                }
            }
            CorpusSource::Directory(base) => {
                let dir = base.join("breaking-changes");
                let reader = fs::read_dir(&dir).map_err(|err| KnowledgeError::Io {
                    file: dir.to_string_lossy().into_owned(),
                    reason: err.to_string(),
                })?;
                let mut paths: Vec<PathBuf> =
                    reader.flatten().map(|entry| entry.path()).collect();
                paths.sort();
                for path in paths {
                    if path.extension().is_none_or(|ext| ext != "json") {
                        continue;
                    }
                    let label = path.to_string_lossy().into_owned();
                    let raw = read_bounded(&path, &label)?;
                    let doc: BreakingChangeDoc = self.parse(&label, &raw)?;
                    docs.insert(doc.slug.clone(), doc);
                }
            }
        }
        Ok(docs)
    }

    /// Loads every upgrade path keyed by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the document is unreadable or
    /// malformed.
    pub fn load_upgrade_paths(&self) -> Result<BTreeMap<String, UpgradePath>, KnowledgeError> {
        let file: UpgradePathsFile = self.parse(
            "upgrade-paths.json",
            &self.read("upgrade-paths.json", EMBEDDED_UPGRADE_PATHS)?,
        )?;
        Ok(file.upgrade_paths)
    }

    /// Reads a top-level corpus file from the active source.
    fn read(&self, name: &str, embedded: &str) -> Result<String, KnowledgeError> {
        match &self.source {
            CorpusSource::Embedded => Ok(embedded.to_string()),
            CorpusSource::Directory(base) => {
                let path = base.join(name);
                read_bounded(&path, name)
            }
        }
    }

    /// Parses a corpus document, labeling parse failures with the file name.
    fn parse<T: for<'de> Deserialize<'de>>(
        &self,
        label: &str,
        raw: &str,
    ) -> Result<T, KnowledgeError> {
        serde_json::from_str(raw).map_err(|err| KnowledgeError::Parse {
            file: label.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Reads an on-disk corpus file, enforcing the size ceiling first.
fn read_bounded(path: &std::path::Path, label: &str) -> Result<String, KnowledgeError> {
    let metadata = fs::metadata(path).map_err(|err| KnowledgeError::Io {
        file: label.to_string(),
        reason: err.to_string(),
    })?;
    if metadata.len() > MAX_CORPUS_FILE_BYTES {
        return Err(KnowledgeError::TooLarge(label.to_string()));
    }
    fs::read_to_string(path).map_err(|err| KnowledgeError::Io {
        file: label.to_string(),
        reason: err.to_string(),
    })
}

// ============================================================================
// SECTION: Knowledge Base Service
// ============================================================================

/// Lookup service over the corpus with memoized document loads.
pub struct KnowledgeBase {
    /// Corpus loader.
    loader: CorpusLoader,
    /// Search index built at construction.
    index: SearchIndex,
    /// Memoization cache for document loads.
    cache: Mutex<BoundedCache>,
}

impl KnowledgeBase {
    /// Builds the service and its search index from a loader.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the corpus cannot be loaded.
    pub fn new(loader: CorpusLoader) -> Result<Self, KnowledgeError> {
        let docs = loader.load_breaking_change_docs()?;
        let patterns = loader.load_patterns()?;
        let doc_refs: Vec<&BreakingChangeDoc> = docs.values().collect();
        let index = SearchIndex::build(&doc_refs, patterns.into_iter());
        let cache = BoundedCache::new(
            KNOWLEDGE_CACHE_TTL_SECS,
            KNOWLEDGE_CACHE_MAX_ENTRIES,
            KNOWLEDGE_CACHE_MAX_VALUE_BYTES,
        )?;
        Ok(Self {
            loader,
            index,
            cache: Mutex::new(cache),
        })
    }

    /// Builds the service over the embedded corpus.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the embedded corpus is malformed.
    pub fn embedded() -> Result<Self, KnowledgeError> {
        Self::new(CorpusLoader::embedded())
    }

    /// Returns a summary of the corpus.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the corpus cannot be loaded.
    pub fn summary(&self) -> Result<Value, KnowledgeError> {
        let loader = self.loader.clone();
        let entry_count = self.index.entry_count();
        self.with_cache(|cache| {
            cache.remember("summary", None, || {
                let index = loader.load_index()?;
                let patterns = loader.load_patterns()?;
                let docs = loader.load_breaking_change_docs()?;
                Ok(json!({
                    "knowledge_base_version": index.knowledge_base_version,
                    "last_updated": index.last_updated,
                    "editions_covered": index.editions_covered,
                    "pattern_count": patterns.len(),
                    "breaking_change_document_count": docs.len(),
                    "search_entry_count": entry_count,
                }))
            })
        })
    }

    /// Searches the corpus.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        self.index.search(query, limit)
    }

    /// Returns a usage pattern by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::NotFound`] for unknown identifiers.
    pub fn pattern(&self, pattern_id: &str) -> Result<PatternDoc, KnowledgeError> {
        let patterns = self.loader.load_patterns()?;
        patterns.get(pattern_id).cloned().ok_or_else(|| KnowledgeError::NotFound {
            kind: "pattern",
            identifier: pattern_id.to_string(),
        })
    }

    /// Returns every pattern identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the corpus cannot be loaded.
    pub fn list_pattern_ids(&self) -> Result<Vec<String>, KnowledgeError> {
        Ok(self.loader.load_patterns()?.into_keys().collect())
    }

    /// Returns a breaking-change document by slug, memoized.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::NotFound`] for unknown slugs.
    pub fn breaking_change_doc(&self, slug: &str) -> Result<BreakingChangeDoc, KnowledgeError> {
        let key = format!("breaking-change-doc:{slug}");
        let loader = self.loader.clone();
        let slug_owned = slug.to_string();
        let value = self.with_cache(|cache| {
            cache.remember(&key, None, || {
                let docs = loader.load_breaking_change_docs()?;
                let doc = docs.get(&slug_owned).ok_or_else(|| KnowledgeError::NotFound {
                    kind: "breaking change document",
                    identifier: slug_owned.clone(),
                })?;
                serde_json::to_value(doc).map_err(|err| KnowledgeError::Parse {
                    file: format!("breaking-changes/{slug_owned}.json"),
                    reason: err.to_string(),
                })
            })
        })?;
        serde_json::from_value(value).map_err(|err| KnowledgeError::Parse {
            file: format!("breaking-changes/{slug}.json"),
            reason: err.to_string(),
        })
    }

    /// Returns one breaking-change entry by slug and change identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::NotFound`] for unknown identifiers.
    pub fn breaking_change_entry(
        &self,
        slug: &str,
        change_id: &str,
    ) -> Result<BreakingChange, KnowledgeError> {
        let doc = self.breaking_change_doc(slug)?;
        doc.entries.iter().find(|entry| entry.id == change_id).cloned().ok_or_else(|| {
            KnowledgeError::NotFound {
                kind: "breaking change entry",
                identifier: format!("{slug}::{change_id}"),
            }
        })
    }

    /// Returns every breaking-change document slug.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the corpus cannot be loaded.
    pub fn list_slugs(&self) -> Result<Vec<String>, KnowledgeError> {
        Ok(self.loader.load_breaking_change_docs()?.into_keys().collect())
    }

    /// Returns every entry whose category marks a deprecated feature.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the corpus cannot be loaded.
    pub fn deprecated_features(&self) -> Result<Vec<(String, BreakingChange)>, KnowledgeError> {
        let docs = self.loader.load_breaking_change_docs()?;
        let mut deprecated = Vec::new();
        for doc in docs.values() {
            for entry in &doc.entries {
                if entry.category == "deprecation" {
                    deprecated.push((doc.slug.clone(), entry.clone()));
                }
            }
        }
        Ok(deprecated)
    }

    /// Returns an upgrade path by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::NotFound`] for unknown identifiers.
    pub fn upgrade_path(&self, identifier: &str) -> Result<UpgradePath, KnowledgeError> {
        let paths = self.loader.load_upgrade_paths()?;
        paths.get(identifier).cloned().ok_or_else(|| KnowledgeError::NotFound {
            kind: "upgrade path",
            identifier: identifier.to_string(),
        })
    }

    /// Returns the upgrade path between two editions.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::NotFound`] when no path connects them.
    pub fn upgrade_path_between(
        &self,
        from_edition: &str,
        to_edition: &str,
    ) -> Result<UpgradePath, KnowledgeError> {
        self.upgrade_path(&format!("{from_edition}-to-{to_edition}"))
    }

    /// Returns every upgrade path identifier.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError`] when the corpus cannot be loaded.
    pub fn list_upgrade_path_ids(&self) -> Result<Vec<String>, KnowledgeError> {
        Ok(self.loader.load_upgrade_paths()?.into_keys().collect())
    }

    /// Runs a closure against the memoization cache.
    fn with_cache<T>(
        &self,
        operation: impl FnOnce(&mut BoundedCache) -> Result<T, KnowledgeError>,
    ) -> Result<T, KnowledgeError> {
        let mut cache = self.cache.lock().map_err(|_| KnowledgeError::CachePoisoned)?;
        operation(&mut cache)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Knowledge base errors.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// A corpus file could not be read.
    #[error("knowledge corpus file {file} is unreadable: {reason}")]
    Io {
        /// File label.
        file: String,
        /// Underlying reason.
        reason: String,
    },
    /// A corpus file could not be parsed.
    #[error("knowledge corpus file {file} failed to parse: {reason}")]
    Parse {
        /// File label.
        file: String,
        /// Underlying reason.
        reason: String,
    },
    /// A corpus file exceeds the size ceiling.
    #[error("knowledge corpus file {0} exceeds the size limit")]
    TooLarge(String),
    /// An identifier was not found in the corpus.
    #[error("{kind} \"{identifier}\" was not found in the knowledge base")]
    NotFound {
        /// Kind of entity looked up.
        kind: &'static str,
        /// Identifier that missed.
        identifier: String,
    },
    /// The memoization cache mutex was poisoned.
    #[error("knowledge cache lock poisoned")]
    CachePoisoned,
    /// A cache operation failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions."
    )]

    use super::KnowledgeBase;
    use super::KnowledgeError;

    #[test]
    fn embedded_corpus_loads_and_summarizes() {
        let base = KnowledgeBase::embedded().unwrap();
        let summary = base.summary().unwrap();
        assert!(summary["pattern_count"].as_u64().unwrap() > 0);
        assert!(summary["breaking_change_document_count"].as_u64().unwrap() >= 2);
        assert!(summary["search_entry_count"].as_u64().unwrap() > 0);
    }

    #[test]
    fn pattern_lookup_hits_and_misses() {
        let base = KnowledgeBase::embedded().unwrap();
        let ids = base.list_pattern_ids().unwrap();
        assert!(!ids.is_empty());
        let pattern = base.pattern(&ids[0]).unwrap();
        assert!(!pattern.name.is_empty());
        let missing = base.pattern("no-such-pattern");
        assert!(matches!(missing, Err(KnowledgeError::NotFound { .. })));
    }

    #[test]
    fn breaking_change_entries_resolve_by_slug_and_id() {
        let base = KnowledgeBase::embedded().unwrap();
        let doc = base.breaking_change_doc("rust-2021").unwrap();
        assert_eq!(doc.edition, "2021");
        let first = &doc.entries[0];
        let entry = base.breaking_change_entry("rust-2021", &first.id).unwrap();
        assert_eq!(entry.title, first.title);
        let missing = base.breaking_change_entry("rust-2021", "absent");
        assert!(matches!(missing, Err(KnowledgeError::NotFound { .. })));
    }

    #[test]
    fn upgrade_paths_resolve_by_identifier_and_editions() {
        let base = KnowledgeBase::embedded().unwrap();
        let ids = base.list_upgrade_path_ids().unwrap();
        assert!(ids.contains(&"2021-to-2024".to_string()));
        let path = base.upgrade_path_between("2021", "2024").unwrap();
        assert_eq!(path.from_edition, "2021");
        assert!(!path.steps.is_empty());
    }

    #[test]
    fn deprecated_features_filter_by_category() {
        let base = KnowledgeBase::embedded().unwrap();
        let deprecated = base.deprecated_features().unwrap();
        assert!(deprecated.iter().all(|(_, entry)| entry.category == "deprecation"));
        assert!(!deprecated.is_empty());
    }

    #[test]
    fn search_finds_known_entries() {
        let base = KnowledgeBase::embedded().unwrap();
        let hits = base.search("closure", 5);
        assert!(!hits.is_empty());
    }
}
