// crates/upgrade-compass-cli/src/main.rs
// ============================================================================
// Module: Upgrade Compass CLI Entry Point
// Description: Command dispatcher for the MCP server and client registration.
// Purpose: Provide a safe CLI for serving and registering Upgrade Compass.
// Dependencies: clap, upgrade-compass-mcp, tokio, thiserror
// ============================================================================

//! ## Overview
//! The CLI starts the MCP server (`serve`), merges an Upgrade Compass entry
//! into MCP client configuration files (`register`), and validates
//! configuration files (`config validate`). Security posture: inputs are
//! untrusted and must be validated.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod register;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use thiserror::Error;
use upgrade_compass_mcp::CompassConfig;
use upgrade_compass_mcp::McpServer;

use crate::register::ClientConfigFormat;
use crate::register::ClientConfigWriter;
use crate::register::ServerEntry;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "upgrade-compass", version, about = "Rust upgrade analysis MCP server")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Upgrade Compass MCP server.
    Serve(ServeCommand),
    /// Register the server with an MCP client configuration file.
    Register(RegisterCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to upgrade-compass.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration for the `register` command.
#[derive(Args, Debug)]
struct RegisterCommand {
    /// Client configuration file to update.
    #[arg(long, value_name = "PATH")]
    target: PathBuf,
    /// Configuration file format.
    #[arg(long, value_enum, default_value_t = RegisterFormat::Json)]
    format: RegisterFormat,
    /// Server-map key inside the file (defaults to the format convention).
    #[arg(long, value_name = "KEY")]
    key: Option<String>,
    /// Server entry name.
    #[arg(long, value_name = "NAME", default_value = "upgrade-compass")]
    name: String,
    /// Command the client should spawn (defaults to this executable).
    #[arg(long, value_name = "COMMAND")]
    command: Option<String>,
    /// Arguments passed to the command (repeatable).
    #[arg(long = "arg", value_name = "ARG", action = ArgAction::Append)]
    args: Vec<String>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate an Upgrade Compass configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to upgrade-compass.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Client configuration formats selectable on the command line.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum RegisterFormat {
    /// JSON client configuration.
    Json,
    /// TOML client configuration.
    Toml,
}

impl From<RegisterFormat> for ClientConfigFormat {
    fn from(format: RegisterFormat) -> Self {
        match format {
            RegisterFormat::Json => Self::Json,
            RegisterFormat::Toml => Self::Toml,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            let _ = write_stderr_line(&format!("upgrade-compass: {err}"));
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Register(command) => command_register(command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = CompassConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    let server = tokio::task::spawn_blocking(move || McpServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("init failed: {err}")))?;
    server
        .serve()
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Register Command
// ============================================================================

/// Executes the `register` command.
fn command_register(command: RegisterCommand) -> CliResult<ExitCode> {
    let spawn_command = match command.command {
        Some(explicit) => explicit,
        None => env::current_exe()
            .map_err(|err| CliError::new(format!("cannot resolve executable path: {err}")))?
            .to_string_lossy()
            .into_owned(),
    };
    let args =
        if command.args.is_empty() { vec!["serve".to_string()] } else { command.args };
    let writer =
        ClientConfigWriter::new(command.target, command.format.into(), command.key)
            .map_err(|err| CliError::new(err.to_string()))?;
    let written = writer
        .write(&ServerEntry {
            name: command.name,
            command: spawn_command,
            args,
        })
        .map_err(|err| CliError::new(err.to_string()))?;
    write_stdout_line(&format!("Registered Upgrade Compass in {}", written.display()))
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    write_stdout_line("Restart your IDE/agent to load the new configuration.")
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = CompassConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    write_stdout_line("Configuration is valid.")
        .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(message.as_bytes())?;
    stdout.write_all(b"\n")?;
    stdout.flush()
}

/// Writes one line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr().lock();
    stderr.write_all(message.as_bytes())?;
    stderr.write_all(b"\n")?;
    stderr.flush()
}
