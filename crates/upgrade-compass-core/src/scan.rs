// crates/upgrade-compass-core/src/scan.rs
// ============================================================================
// Module: Pattern Scanner
// Description: Rooted, exclusion-filtered file enumeration and safe matching.
// Purpose: Evaluate glob and regex patterns over a project tree without
//          letting hostile patterns or oversized files stall a scan.
// Dependencies: regex, serde, thiserror
// ============================================================================

//! ## Overview
//! The scanner walks a canonicalized project root, skipping any path whose
//! components hit the exclusion predicate, and memoizes the file list for its
//! lifetime. Globs are translated to anchored case-insensitive regexes;
//! content patterns are validated before compilation because they may
//! originate from semi-trusted documentation content or user input. A single
//! catastrophic pattern must not be able to hang the whole scan, so the
//! nested-quantifier ReDoS shape is rejected outright and every other failure
//! (oversized file, unreadable file, invalid pattern) degrades to a silent
//! skip.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use regex::RegexBuilder;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Directory names excluded from scans by default.
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["target", ".git", "node_modules", "vendor"];
/// Largest file the scanner will read, in bytes.
pub const MAX_SCAN_FILE_BYTES: u64 = 1024 * 1024;
/// Default cap on matches accumulated across patterns per file.
pub const DEFAULT_MAX_MATCHES: usize = 3;

/// Detector for the quantified-group-followed-by-quantifier ReDoS shape.
static NESTED_QUANTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\([^)]*[*+]\)[*+]").ok());

// ============================================================================
// SECTION: Project Context
// ============================================================================

/// A rooted project tree with a component-wise exclusion predicate.
///
/// # Invariants
/// - `root` is canonicalized and refers to an existing directory.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    /// Canonicalized project root.
    root: PathBuf,
    /// Path components excluded from scans.
    excluded: BTreeSet<String>,
}

impl ProjectContext {
    /// Creates a context rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidRoot`] when the path cannot be resolved to
    /// a directory.
    pub fn new(
        root: &Path,
        excluded: impl IntoIterator<Item = String>,
    ) -> Result<Self, ScanError> {
        let resolved = fs::canonicalize(root)
            .map_err(|_| ScanError::InvalidRoot(root.to_path_buf()))?;
        if !resolved.is_dir() {
            return Err(ScanError::InvalidRoot(root.to_path_buf()));
        }
        Ok(Self {
            root: resolved,
            excluded: excluded.into_iter().collect(),
        })
    }

    /// Creates a context with the default exclusion list.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidRoot`] when the path cannot be resolved to
    /// a directory.
    pub fn with_default_exclusions(root: &Path) -> Result<Self, ScanError> {
        Self::new(root, DEFAULT_EXCLUDED_DIRS.iter().map(ToString::to_string))
    }

    /// Returns the canonicalized project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns whether any component of the relative path is excluded.
    #[must_use]
    pub fn is_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|component| {
            component
                .as_os_str()
                .to_str()
                .is_some_and(|name| self.excluded.contains(name))
        })
    }
}

// ============================================================================
// SECTION: Scan Matches
// ============================================================================

/// A single content match produced by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanMatch {
    /// Root-relative path of the matched file.
    pub file: String,
    /// 1-based line number of the match.
    pub line: usize,
    /// Trimmed matched text.
    pub evidence: String,
}

// ============================================================================
// SECTION: Filesystem Scanner
// ============================================================================

/// Enumerates and matches files under a [`ProjectContext`].
///
/// The file list is computed once and reused for the scanner's lifetime; the
/// scanner is call-scoped and not designed for concurrent mutation.
#[derive(Debug)]
pub struct FilesystemScanner {
    /// Project root and exclusion predicate.
    context: ProjectContext,
    /// Memoized recursive file listing.
    all_files: OnceCell<Vec<PathBuf>>,
}

impl FilesystemScanner {
    /// Creates a scanner over the given context.
    #[must_use]
    pub fn new(context: ProjectContext) -> Self {
        Self {
            context,
            all_files: OnceCell::new(),
        }
    }

    /// Returns every non-excluded file under the root, memoized.
    pub fn all_files(&self) -> &[PathBuf] {
        self.all_files.get_or_init(|| {
            let mut files = Vec::new();
            self.walk(self.context.root(), &mut files);
            files
        })
    }

    /// Returns files whose root-relative path matches any glob, de-duplicated
    /// in first-seen order.
    #[must_use]
    pub fn find_by_patterns(&self, globs: &[String]) -> Vec<PathBuf> {
        if globs.is_empty() {
            return Vec::new();
        }
        let regexes: Vec<Regex> =
            globs.iter().filter_map(|glob| Self::glob_to_regex(glob)).collect();
        let mut seen = BTreeSet::new();
        let mut matches = Vec::new();
        for path in self.all_files() {
            let relative = self.to_relative_path(path);
            if regexes.iter().any(|regex| regex.is_match(&relative)) && seen.insert(path.clone()) {
                matches.push(path.clone());
            }
        }
        matches
    }

    /// Runs validated content patterns against one file, accumulating at most
    /// `max_matches` matches across all patterns.
    ///
    /// Missing files, files over [`MAX_SCAN_FILE_BYTES`], unreadable content,
    /// and unsafe or invalid patterns are skipped silently so a broad scan
    /// degrades gracefully.
    #[must_use]
    pub fn find_regex_matches(
        &self,
        path: &Path,
        patterns: &[String],
        max_matches: usize,
    ) -> Vec<ScanMatch> {
        if patterns.is_empty() {
            return Vec::new();
        }
        let Ok(metadata) = fs::metadata(path) else {
            return Vec::new();
        };
        if !metadata.is_file() || metadata.len() > MAX_SCAN_FILE_BYTES {
            return Vec::new();
        }
        let Ok(contents) = fs::read_to_string(path) else {
            return Vec::new();
        };

        let file = self.to_relative_path(path);
        let mut matches = Vec::new();
        for pattern in patterns {
            let Some(regex) = Self::compile_content_pattern(pattern) else {
                continue;
            };
            for found in regex.find_iter(&contents) {
                matches.push(ScanMatch {
                    file: file.clone(),
                    line: offset_to_line(&contents, found.start()),
                    evidence: found.as_str().trim().to_string(),
                });
                if matches.len() >= max_matches {
                    return matches;
                }
            }
        }
        matches
    }

    /// Strips the root prefix from an absolute path.
    ///
    /// Paths outside the root are returned unchanged, never rejected.
    #[must_use]
    pub fn to_relative_path(&self, path: &Path) -> String {
        path.strip_prefix(self.context.root()).map_or_else(
            |_| normalize_separators(&path.to_string_lossy()),
            |relative| normalize_separators(&relative.to_string_lossy()),
        )
    }

    /// Recursively collects files, pruning excluded directories.
    fn walk(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let Ok(reader) = fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<PathBuf> = reader.flatten().map(|entry| entry.path()).collect();
        entries.sort();
        for entry in entries {
            let Ok(relative) = entry.strip_prefix(self.context.root()) else {
                continue;
            };
            if self.context.is_excluded(relative) {
                continue;
            }
            if entry.is_dir() {
                self.walk(&entry, files);
            } else if entry.is_file() {
                files.push(entry);
            }
        }
    }

    /// Translates a glob into an anchored, case-insensitive regex.
    ///
    /// `**` matches across separators (a leading `**/` also matches zero
    /// directories), `*` within a component, `?` a single character;
    /// separators are normalized to `/`.
    fn glob_to_regex(glob: &str) -> Option<Regex> {
        let normalized = normalize_separators(glob);
        let trimmed = normalized.trim_start_matches('/');
        let escaped = regex::escape(trimmed);
        let translated = escaped
            .replace(r"\*\*/", "(?:.*/)?")
            .replace(r"\*\*", ".*")
            .replace(r"\*", "[^/]*")
            .replace(r"\?", ".");
        RegexBuilder::new(&format!("^{translated}$")).case_insensitive(true).build().ok()
    }

    /// Validates and compiles a content pattern.
    ///
    /// Rejects empty patterns, the nested-quantifier ReDoS shape, and
    /// anything that fails a trial compile.
    fn compile_content_pattern(pattern: &str) -> Option<Regex> {
        if pattern.is_empty() {
            return None;
        }
        if NESTED_QUANTIFIER.as_ref().is_some_and(|detector| detector.is_match(pattern)) {
            return None;
        }
        RegexBuilder::new(pattern).multi_line(true).build().ok()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Normalizes path separators to `/`.
fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Escapes a literal string for use as a content pattern.
#[must_use]
pub fn escape_literal(text: &str) -> String {
    regex::escape(text)
}

/// Converts a byte offset to a 1-based line number.
fn offset_to_line(contents: &str, offset: usize) -> usize {
    contents.as_bytes()[..offset].iter().filter(|byte| **byte == b'\n').count() + 1
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Scanner construction errors; match-time failures are silent skips.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The project root does not resolve to a directory.
    #[error("project root {0} is not a directory")]
    InvalidRoot(PathBuf),
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
    use std::path::Path;

    use tempfile::TempDir;

    use super::DEFAULT_MAX_MATCHES;
    use super::FilesystemScanner;
    use super::ProjectContext;

    /// Creates a project tree with a file at each relative path.
    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (relative, contents) in files {
            let path = dir.path().join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
        dir
    }

    /// Builds a scanner with default exclusions over a tree.
    fn scanner(root: &Path) -> FilesystemScanner {
        FilesystemScanner::new(ProjectContext::with_default_exclusions(root).unwrap())
    }

    #[test]
    fn all_files_skips_excluded_components_and_memoizes() {
        let dir = project(&[
            ("src/main.rs", "fn main() {}"),
            ("target/debug/out.rs", "ignored"),
            (".git/config", "ignored"),
            ("README.md", "docs"),
        ]);
        let scanner = scanner(dir.path());
        let first: Vec<String> =
            scanner.all_files().iter().map(|path| scanner.to_relative_path(path)).collect();
        assert_eq!(first, vec!["README.md", "src/main.rs"]);
        // Repeat calls reuse the memoized listing.
        assert_eq!(scanner.all_files().len(), 2);
    }

    #[test]
    fn single_star_does_not_cross_separators() {
        let dir = project(&[("a.rs", ""), ("sub/b.rs", "")]);
        let scanner = scanner(dir.path());
        let shallow: Vec<String> = scanner
            .find_by_patterns(&["*.rs".to_string()])
            .iter()
            .map(|path| scanner.to_relative_path(path))
            .collect();
        assert_eq!(shallow, vec!["a.rs"]);
        let deep: Vec<String> = scanner
            .find_by_patterns(&["**/*.rs".to_string()])
            .iter()
            .map(|path| scanner.to_relative_path(path))
            .collect();
        assert_eq!(deep, vec!["a.rs", "sub/b.rs"]);
    }

    #[test]
    fn glob_matching_is_case_insensitive_and_deduplicated() {
        let dir = project(&[("Build.RS", "")]);
        let scanner = scanner(dir.path());
        let matches =
            scanner.find_by_patterns(&["*.rs".to_string(), "build.*".to_string()]);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn question_mark_matches_exactly_one_character() {
        let dir = project(&[("a1.rs", ""), ("a12.rs", "")]);
        let scanner = scanner(dir.path());
        let matches: Vec<String> = scanner
            .find_by_patterns(&["a?.rs".to_string()])
            .iter()
            .map(|path| scanner.to_relative_path(path))
            .collect();
        assert_eq!(matches, vec!["a1.rs"]);
    }

    #[test]
    fn regex_matches_report_one_based_lines_and_trimmed_evidence() {
        let dir = project(&[("src/lib.rs", "// intro\n  pub struct Probe {}\n")]);
        let scanner = scanner(dir.path());
        let path = dir.path().join("src/lib.rs");
        let matches = scanner.find_regex_matches(
            &path,
            &[r"pub\s+struct\s+\w+".to_string()],
            DEFAULT_MAX_MATCHES,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line, 2);
        assert_eq!(matches[0].evidence, "pub struct Probe");
        assert_eq!(matches[0].file, "src/lib.rs");
    }

    #[test]
    fn nested_quantifier_patterns_are_rejected() {
        let dir = project(&[("src/lib.rs", "aaaaaaaaaaaaaaaaaaaaaaaa")]);
        let scanner = scanner(dir.path());
        let path = dir.path().join("src/lib.rs");
        for pattern in ["(a+)+", "(a*)*", "(ab+)+c"] {
            let matches =
                scanner.find_regex_matches(&path, &[pattern.to_string()], DEFAULT_MAX_MATCHES);
            assert!(matches.is_empty(), "pattern {pattern:?} must be rejected");
        }
    }

    #[test]
    fn empty_and_invalid_patterns_are_skipped() {
        let dir = project(&[("src/lib.rs", "fn probe() {}")]);
        let scanner = scanner(dir.path());
        let path = dir.path().join("src/lib.rs");
        let matches = scanner.find_regex_matches(
            &path,
            &[String::new(), "([unclosed".to_string(), r"fn\s+probe".to_string()],
            DEFAULT_MAX_MATCHES,
        );
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].evidence, "fn probe");
    }

    #[test]
    fn match_accumulation_stops_at_the_cap_across_patterns() {
        let dir = project(&[("src/lib.rs", "x\nx\nx\nx\ny\n")]);
        let scanner = scanner(dir.path());
        let path = dir.path().join("src/lib.rs");
        let matches =
            scanner.find_regex_matches(&path, &["x".to_string(), "y".to_string()], 3);
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|found| found.evidence == "x"));
    }

    #[test]
    fn missing_and_oversized_files_yield_no_matches() {
        let dir = project(&[]);
        let scanner = scanner(dir.path());
        let missing = dir.path().join("absent.rs");
        assert!(
            scanner
                .find_regex_matches(&missing, &["x".to_string()], DEFAULT_MAX_MATCHES)
                .is_empty()
        );
        let big = dir.path().join("big.rs");
        fs::write(&big, "a".repeat(1024 * 1024 + 1)).unwrap();
        assert!(
            scanner
                .find_regex_matches(&big, &["a".to_string()], DEFAULT_MAX_MATCHES)
                .is_empty()
        );
    }

    #[test]
    fn paths_outside_the_root_are_returned_unchanged() {
        let dir = project(&[]);
        let scanner = scanner(dir.path());
        let outside = Path::new("/somewhere/else/file.rs");
        assert_eq!(scanner.to_relative_path(outside), "/somewhere/else/file.rs");
    }
}
