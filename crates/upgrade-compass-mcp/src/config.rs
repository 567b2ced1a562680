// crates/upgrade-compass-mcp/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Configuration loading and validation for Upgrade Compass.
// Purpose: Provide strict config parsing with explicit, passed-by-handle
//          instances instead of process-wide mutable state.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file selected by explicit path, the
//! `UPGRADE_COMPASS_CONFIG` environment variable, or `upgrade-compass.toml`
//! in the working directory, falling back to built-in defaults when no file
//! exists. Files over the size cap or with invalid values fail closed. The
//! loaded value is an owned handle with no global state or reset hooks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use upgrade_compass_core::scan::DEFAULT_EXCLUDED_DIRS;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "upgrade-compass.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "UPGRADE_COMPASS_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;
/// Default heartbeat interval in seconds.
const DEFAULT_HEARTBEAT_SECS: u64 = 30;
/// Default tool execution limit in seconds (0 disables).
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;
/// Default cache entry time-to-live in seconds.
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
/// Default cache entry ceiling.
const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;
/// Default cache per-value byte ceiling.
const DEFAULT_CACHE_MAX_VALUE_BYTES: usize = 1024 * 1024;
/// Default maximum HTTP request body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Maximum allowed tool execution limit in seconds.
const MAX_TOOL_TIMEOUT_SECS: u64 = 600;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Transport selection for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    Stdio,
    /// JSON-RPC over an HTTP POST endpoint.
    Http,
}

/// Server transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Selected transport.
    #[serde(default = "default_transport")]
    pub transport: ServerTransport,
    /// Bind address for the HTTP transport.
    #[serde(default)]
    pub bind: Option<String>,
    /// Idle heartbeat interval in seconds (clamped to a 10s minimum).
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
    /// Maximum HTTP request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Override for the operating instructions returned by `initialize`.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Optional audit log file path (defaults to stderr events).
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

/// Tool execution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    /// Advisory tool execution limit in seconds (0 disables).
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Default entry time-to-live in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum number of entries.
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// Maximum serialized size of a single value in bytes.
    #[serde(default = "default_cache_max_value_bytes")]
    pub max_value_bytes: usize,
}

/// Scan configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Directory names excluded from project scans.
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,
}

/// Knowledge base configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgeConfig {
    /// Corpus directory overriding the embedded defaults.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Analyzed project configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// Default project root used when a tool payload omits `project_path`.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Upgrade Compass configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CompassConfig {
    /// Server transport configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Tool execution configuration.
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Scan configuration.
    #[serde(default)]
    pub scan: ScanConfig,
    /// Knowledge base configuration.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    /// Analyzed project configuration.
    #[serde(default)]
    pub project: ProjectConfig,
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default transport selection.
const fn default_transport() -> ServerTransport {
    ServerTransport::Stdio
}

/// Default heartbeat interval.
const fn default_heartbeat_secs() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}

/// Default HTTP body cap.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default tool execution limit.
const fn default_tool_timeout_secs() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

/// Default cache time-to-live.
const fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

/// Default cache entry ceiling.
const fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

/// Default cache per-value byte ceiling.
const fn default_cache_max_value_bytes() -> usize {
    DEFAULT_CACHE_MAX_VALUE_BYTES
}

/// Default scan exclusions.
fn default_excluded_dirs() -> Vec<String> {
    DEFAULT_EXCLUDED_DIRS.iter().map(ToString::to_string).collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            bind: None,
            heartbeat_interval_secs: default_heartbeat_secs(),
            max_body_bytes: default_max_body_bytes(),
            instructions: None,
            audit_log: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            max_entries: default_cache_max_entries(),
            max_value_bytes: default_cache_max_value_bytes(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: default_excluded_dirs(),
        }
    }
}

impl Default for CompassConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tools: ToolsConfig::default(),
            cache: CacheConfig::default(),
            scan: ScanConfig::default(),
            knowledge: KnowledgeConfig::default(),
            project: ProjectConfig::default(),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl CompassConfig {
    /// Loads configuration from the resolved path or built-in defaults.
    ///
    /// Resolution order: explicit path, [`CONFIG_ENV_VAR`], then
    /// `upgrade-compass.toml` in the working directory. A missing default
    /// file yields the built-in defaults; an explicit or env-selected path
    /// must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is missing (for explicit
    /// paths), oversized, unreadable, malformed, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        let selected: Option<PathBuf> = path.map(Path::to_path_buf).or(env_path);

        let config = match selected {
            Some(file) => Self::load_file(&file)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_NAME);
                if default_path.is_file() {
                    Self::load_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads and parses one configuration file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let label = path.to_string_lossy().into_owned();
        let metadata =
            fs::metadata(path).map_err(|_| ConfigError::NotFound(label.clone()))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::TooLarge(label));
        }
        let raw = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: label.clone(),
            reason: err.to_string(),
        })?;
        toml::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: label,
            reason: err.to_string(),
        })
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a constraint fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.transport == ServerTransport::Http && self.server.bind.is_none() {
            return Err(ConfigError::Invalid(
                "server.bind is required for the http transport".to_string(),
            ));
        }
        if self.cache.max_entries == 0 || self.cache.max_value_bytes == 0 {
            return Err(ConfigError::Invalid("cache bounds must be non-zero".to_string()));
        }
        if self.tools.timeout_secs > MAX_TOOL_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "tools.timeout_secs must be at most {MAX_TOOL_TIMEOUT_SECS}"
            )));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The selected config file does not exist.
    #[error("config file {0} was not found")]
    NotFound(String),
    /// The config file exceeds the size cap.
    #[error("config file {0} exceeds the size limit")]
    TooLarge(String),
    /// The config file could not be read.
    #[error("config file {path} is unreadable: {reason}")]
    Io {
        /// Config path.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// The config file could not be parsed.
    #[error("config file {path} failed to parse: {reason}")]
    Parse {
        /// Config path.
        path: String,
        /// Underlying reason.
        reason: String,
    },
    /// A cross-field constraint failed.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
