// crates/upgrade-compass-core/src/manifest.rs
// ============================================================================
// Module: Manifest Inspection
// Description: Cargo.toml parsing and edition/dependency heuristics.
// Purpose: Summarize a project's manifest for the analysis tools.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! The inspector reads a project's `Cargo.toml` and extracts the facts the
//! analysis tools report on: package identity, edition, minimum supported
//! Rust version, and dependency tables. The analyzer layers version
//! heuristics on top, suggesting the next upgrade path when the crate is not
//! on the latest edition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use toml::Value as TomlValue;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Editions in release order.
pub const KNOWN_EDITIONS: &[&str] = &["2015", "2018", "2021", "2024"];
/// Edition assumed when the manifest does not declare one.
pub const DEFAULT_EDITION: &str = "2015";
/// Largest manifest the inspector will read, in bytes.
const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;
/// Dependency tables inspected in a manifest.
const DEPENDENCY_TABLES: &[(&str, DependencyKind)] = &[
    ("dependencies", DependencyKind::Normal),
    ("dev-dependencies", DependencyKind::Dev),
    ("build-dependencies", DependencyKind::Build),
];

// ============================================================================
// SECTION: Types
// ============================================================================

/// Dependency table a requirement was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// `[dependencies]`.
    Normal,
    /// `[dev-dependencies]`.
    Dev,
    /// `[build-dependencies]`.
    Build,
}

/// One declared dependency.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyInfo {
    /// Crate name.
    pub name: String,
    /// Declared version requirement, or a placeholder for path/git entries.
    pub requirement: String,
    /// Table the dependency came from.
    pub kind: DependencyKind,
    /// Whether the entry delegates to `workspace = true`.
    pub workspace: bool,
}

/// Summary of one parsed manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary {
    /// Package name when the manifest declares one.
    pub package_name: Option<String>,
    /// Declared edition when present.
    pub edition: Option<String>,
    /// Declared minimum supported Rust version when present.
    pub rust_version: Option<String>,
    /// Whether the manifest declares a `[workspace]` table.
    pub is_workspace_root: bool,
    /// Declared dependencies across all inspected tables.
    pub dependencies: Vec<DependencyInfo>,
}

/// Edition heuristics derived from a manifest summary.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectAnalysis {
    /// Effective edition (declared or the default).
    pub edition: String,
    /// Declared minimum supported Rust version when present.
    pub rust_version: Option<String>,
    /// Latest edition the knowledge base covers.
    pub latest_edition: String,
    /// Whether the project is already on the latest edition.
    pub up_to_date: bool,
    /// Suggested upgrade path identifier when one applies.
    pub suggested_upgrade_path: Option<String>,
    /// Count of `[dependencies]` entries.
    pub dependency_count: usize,
    /// Count of `[dev-dependencies]` entries.
    pub dev_dependency_count: usize,
}

/// Reads and summarizes Cargo manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestInspector;

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl ManifestInspector {
    /// Reads and summarizes the `Cargo.toml` under a project root.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when the manifest is missing, oversized,
    /// unreadable, or malformed.
    pub fn inspect_root(root: &Path) -> Result<ManifestSummary, ManifestError> {
        Self::inspect(&root.join("Cargo.toml"))
    }

    /// Reads and summarizes one manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when the manifest is missing, oversized,
    /// unreadable, or malformed.
    pub fn inspect(path: &Path) -> Result<ManifestSummary, ManifestError> {
        let metadata = fs::metadata(path)
            .map_err(|_| ManifestError::NotFound(path.to_string_lossy().into_owned()))?;
        if metadata.len() > MAX_MANIFEST_BYTES {
            return Err(ManifestError::TooLarge(path.to_string_lossy().into_owned()));
        }
        let raw = fs::read_to_string(path).map_err(|err| ManifestError::Io {
            path: path.to_string_lossy().into_owned(),
            reason: err.to_string(),
        })?;
        let parsed: TomlValue = toml::from_str(&raw).map_err(|err: toml::de::Error| {
            ManifestError::Parse {
                path: path.to_string_lossy().into_owned(),
                reason: err.to_string(),
            }
        })?;

        let package = parsed.get("package");
        let mut dependencies = Vec::new();
        for (table, kind) in DEPENDENCY_TABLES {
            if let Some(entries) = parsed.get(table).and_then(TomlValue::as_table) {
                for (name, spec) in entries {
                    dependencies.push(dependency_info(name, spec, *kind));
                }
            }
        }

        Ok(ManifestSummary {
            package_name: string_field(package, "name"),
            edition: string_field(package, "edition"),
            rust_version: string_field(package, "rust-version"),
            is_workspace_root: parsed.get("workspace").is_some(),
            dependencies,
        })
    }
}

impl ProjectAnalysis {
    /// Derives edition heuristics from a manifest summary.
    #[must_use]
    pub fn from_summary(summary: &ManifestSummary) -> Self {
        let edition =
            summary.edition.clone().unwrap_or_else(|| DEFAULT_EDITION.to_string());
        let latest = KNOWN_EDITIONS.last().copied().unwrap_or(DEFAULT_EDITION);
        let suggested = KNOWN_EDITIONS
            .iter()
            .position(|known| **known == edition)
            .and_then(|position| KNOWN_EDITIONS.get(position + 1))
            .map(|next| format!("{edition}-to-{next}"));
        Self {
            up_to_date: edition == latest,
            suggested_upgrade_path: suggested,
            latest_edition: latest.to_string(),
            rust_version: summary.rust_version.clone(),
            dependency_count: summary
                .dependencies
                .iter()
                .filter(|dep| dep.kind == DependencyKind::Normal)
                .count(),
            dev_dependency_count: summary
                .dependencies
                .iter()
                .filter(|dep| dep.kind == DependencyKind::Dev)
                .count(),
            edition,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts a string field from the `[package]` table.
fn string_field(package: Option<&TomlValue>, field: &str) -> Option<String> {
    package
        .and_then(|table| table.get(field))
        .and_then(TomlValue::as_str)
        .map(str::to_string)
}

/// Builds dependency info from one table entry.
fn dependency_info(name: &str, spec: &TomlValue, kind: DependencyKind) -> DependencyInfo {
    let (requirement, workspace) = match spec {
        TomlValue::String(version) => (version.clone(), false),
        TomlValue::Table(table) => {
            let workspace =
                table.get("workspace").and_then(TomlValue::as_bool).unwrap_or(false);
            let requirement = table
                .get("version")
                .and_then(TomlValue::as_str)
                .map_or_else(
                    || {
                        if workspace {
                            "workspace".to_string()
                        } else if table.contains_key("path") {
                            "path".to_string()
                        } else if table.contains_key("git") {
                            "git".to_string()
                        } else {
                            "*".to_string()
                        }
                    },
                    str::to_string,
                );
            (requirement, workspace)
        }
        _ => ("*".to_string(), false),
    };
    DependencyInfo {
        name: name.to_string(),
        requirement,
        kind,
        workspace,
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Manifest inspection errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No manifest exists at the path.
    #[error("manifest {0} was not found")]
    NotFound(String),
    /// The manifest exceeds the size ceiling.
    #[error("manifest {0} exceeds the size limit")]
    TooLarge(String),
    /// The manifest could not be read.
    #[error("manifest {path} is unreadable: {reason}")]
    Io {
        /// Manifest path.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// The manifest could not be parsed.
    #[error("manifest {path} failed to parse: {reason}")]
    Parse {
        /// Manifest path.
        path: String,
        /// Underlying reason.
        reason: String,
    },
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

    use std::fs;

    use tempfile::TempDir;

    use super::DependencyKind;
    use super::ManifestError;
    use super::ManifestInspector;
    use super::ProjectAnalysis;

    /// Writes a manifest into a fresh project directory.
    fn project_with_manifest(contents: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.toml"), contents).unwrap();
        dir
    }

    #[test]
    fn inspects_package_and_dependency_tables() {
        let dir = project_with_manifest(
            r#"
[package]
name = "probe"
edition = "2021"
rust-version = "1.75"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
local-helper = { path = "../helper" }

[dev-dependencies]
tempfile = "3"
"#,
        );
        let summary = ManifestInspector::inspect_root(dir.path()).unwrap();
        assert_eq!(summary.package_name.as_deref(), Some("probe"));
        assert_eq!(summary.edition.as_deref(), Some("2021"));
        assert_eq!(summary.rust_version.as_deref(), Some("1.75"));
        assert!(!summary.is_workspace_root);
        assert_eq!(summary.dependencies.len(), 3);
        let serde_dep =
            summary.dependencies.iter().find(|dep| dep.name == "serde").unwrap();
        assert_eq!(serde_dep.requirement, "1.0");
        assert_eq!(serde_dep.kind, DependencyKind::Normal);
        let local =
            summary.dependencies.iter().find(|dep| dep.name == "local-helper").unwrap();
        assert_eq!(local.requirement, "path");
    }

    #[test]
    fn missing_manifest_is_a_typed_error() {
        let dir = TempDir::new().unwrap();
        let result = ManifestInspector::inspect_root(dir.path());
        assert!(matches!(result, Err(ManifestError::NotFound(_))));
    }

    #[test]
    fn analysis_suggests_the_next_edition_path() {
        let dir = project_with_manifest("[package]\nname = \"probe\"\nedition = \"2018\"\n");
        let summary = ManifestInspector::inspect_root(dir.path()).unwrap();
        let analysis = ProjectAnalysis::from_summary(&summary);
        assert_eq!(analysis.edition, "2018");
        assert!(!analysis.up_to_date);
        assert_eq!(analysis.suggested_upgrade_path.as_deref(), Some("2018-to-2021"));
    }

    #[test]
    fn analysis_defaults_to_the_2015_edition() {
        let dir = project_with_manifest("[package]\nname = \"probe\"\n");
        let summary = ManifestInspector::inspect_root(dir.path()).unwrap();
        let analysis = ProjectAnalysis::from_summary(&summary);
        assert_eq!(analysis.edition, "2015");
        assert_eq!(analysis.suggested_upgrade_path.as_deref(), Some("2015-to-2018"));
    }

    #[test]
    fn latest_edition_is_up_to_date_with_no_suggestion() {
        let dir = project_with_manifest("[package]\nname = \"probe\"\nedition = \"2024\"\n");
        let summary = ManifestInspector::inspect_root(dir.path()).unwrap();
        let analysis = ProjectAnalysis::from_summary(&summary);
        assert!(analysis.up_to_date);
        assert!(analysis.suggested_upgrade_path.is_none());
    }
}
