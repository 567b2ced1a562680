// crates/upgrade-compass-cli/src/register.rs
// ============================================================================
// Module: Client Registration
// Description: Writers for MCP client configuration files.
// Purpose: Merge an Upgrade Compass server entry into IDE/agent configs.
// Dependencies: serde_json, toml, thiserror
// ============================================================================

//! ## Overview
//! Client configuration targets come in two shapes: JSON files with a server
//! map under a configurable key (`mcpServers` by convention) and TOML files
//! with a `[mcp_servers.<name>]` table. The writer merges one server entry
//! into an existing file, preserving unrelated content, and creates the file
//! (with parent directories) when absent. Unparseable existing files fail
//! closed rather than being overwritten.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use toml::Value as TomlValue;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Client configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientConfigFormat {
    /// JSON with a server map under a configurable key.
    Json,
    /// TOML with a server table under a configurable key.
    Toml,
}

impl ClientConfigFormat {
    /// Default server-map key for the format.
    #[must_use]
    pub const fn default_key(self) -> &'static str {
        match self {
            Self::Json => "mcpServers",
            Self::Toml => "mcp_servers",
        }
    }
}

/// One server entry to merge into a client configuration.
#[derive(Debug, Clone)]
pub struct ServerEntry {
    /// Entry name inside the server map.
    pub name: String,
    /// Command the client should spawn.
    pub command: String,
    /// Arguments passed to the command.
    pub args: Vec<String>,
}

/// Merges server entries into client configuration files.
#[derive(Debug, Clone)]
pub struct ClientConfigWriter {
    /// Target file path.
    path: PathBuf,
    /// Target file format.
    format: ClientConfigFormat,
    /// Server-map key inside the file.
    key: String,
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

impl ClientConfigWriter {
    /// Creates a writer for one target file.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidTarget`] when the path extension does
    /// not match the format.
    pub fn new(
        path: PathBuf,
        format: ClientConfigFormat,
        key: Option<String>,
    ) -> Result<Self, RegisterError> {
        let expected = match format {
            ClientConfigFormat::Json => "json",
            ClientConfigFormat::Toml => "toml",
        };
        let matches_format =
            path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext == expected);
        if !matches_format {
            return Err(RegisterError::InvalidTarget(path.to_string_lossy().into_owned()));
        }
        Ok(Self {
            path,
            key: key.unwrap_or_else(|| format.default_key().to_string()),
            format,
        })
    }

    /// Merges one server entry into the target file and returns its path.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] when the existing file cannot be parsed or
    /// the merged file cannot be written.
    pub fn write(&self, entry: &ServerEntry) -> Result<PathBuf, RegisterError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| RegisterError::Io {
                    path: self.path.to_string_lossy().into_owned(),
                    reason: err.to_string(),
                })?;
            }
        }
        let rendered = match self.format {
            ClientConfigFormat::Json => self.merge_json(entry)?,
            ClientConfigFormat::Toml => self.merge_toml(entry)?,
        };
        fs::write(&self.path, rendered).map_err(|err| RegisterError::Io {
            path: self.path.to_string_lossy().into_owned(),
            reason: err.to_string(),
        })?;
        Ok(self.path.clone())
    }

    /// Merges the entry into a JSON server map.
    fn merge_json(&self, entry: &ServerEntry) -> Result<String, RegisterError> {
        let mut document = match self.read_existing()? {
            Some(raw) => serde_json::from_str::<Value>(&raw).map_err(|err| {
                RegisterError::Parse {
                    path: self.path.to_string_lossy().into_owned(),
                    reason: err.to_string(),
                }
            })?,
            None => json!({}),
        };
        let Value::Object(root) = &mut document else {
            return Err(RegisterError::Parse {
                path: self.path.to_string_lossy().into_owned(),
                reason: "top-level value is not an object".to_string(),
            });
        };
        let servers = root.entry(self.key.clone()).or_insert_with(|| json!({}));
        let Value::Object(map) = servers else {
            return Err(RegisterError::Parse {
                path: self.path.to_string_lossy().into_owned(),
                reason: format!("key \"{}\" is not an object", self.key),
            });
        };
        map.insert(
            entry.name.clone(),
            json!({
                "command": entry.command.clone(),
                "args": entry.args.clone(),
            }),
        );
        serde_json::to_string_pretty(&document).map_err(|err| RegisterError::Parse {
            path: self.path.to_string_lossy().into_owned(),
            reason: err.to_string(),
        })
    }

    /// Merges the entry into a TOML server table.
    fn merge_toml(&self, entry: &ServerEntry) -> Result<String, RegisterError> {
        let mut document: toml::Table = match self.read_existing()? {
            Some(raw) => raw.parse().map_err(|err: toml::de::Error| RegisterError::Parse {
                path: self.path.to_string_lossy().into_owned(),
                reason: err.to_string(),
            })?,
            None => toml::Table::new(),
        };
        let servers = document
            .entry(self.key.clone())
            .or_insert_with(|| TomlValue::Table(toml::Table::new()));
        let TomlValue::Table(map) = servers else {
            return Err(RegisterError::Parse {
                path: self.path.to_string_lossy().into_owned(),
                reason: format!("key \"{}\" is not a table", self.key),
            });
        };
        let mut server = toml::Table::new();
        server.insert("command".to_string(), TomlValue::String(entry.command.clone()));
        server.insert(
            "args".to_string(),
            TomlValue::Array(entry.args.iter().cloned().map(TomlValue::String).collect()),
        );
        map.insert(entry.name.clone(), TomlValue::Table(server));
        toml::to_string_pretty(&document).map_err(|err| RegisterError::Parse {
            path: self.path.to_string_lossy().into_owned(),
            reason: err.to_string(),
        })
    }

    /// Reads the existing file, treating blank content as absent.
    fn read_existing(&self) -> Result<Option<String>, RegisterError> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| RegisterError::Io {
            path: self.path.to_string_lossy().into_owned(),
            reason: err.to_string(),
        })?;
        if raw.trim().is_empty() { Ok(None) } else { Ok(Some(raw)) }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Client registration errors.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The target path does not match the selected format.
    #[error("target {0} does not match the selected format")]
    InvalidTarget(String),
    /// The target file could not be read or written.
    #[error("cannot access {path}: {reason}")]
    Io {
        /// Target path.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// The existing file could not be parsed or re-rendered.
    #[error("cannot update {path}: {reason}")]
    Parse {
        /// Target path.
        path: String,
        /// Underlying reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Tests
// ============================================================================
