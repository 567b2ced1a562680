// crates/upgrade-compass-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: Server assembly and stdio/HTTP transports.
// Purpose: Drive the dispatcher over newline-delimited stdio or HTTP.
// Dependencies: upgrade-compass-core, axum, tokio
// ============================================================================

//! ## Overview
//! The stdio transport runs as two cooperating tasks: a blocking reader that
//! feeds complete lines into a channel, and a select loop that races the
//! channel against an idle deadline. The observable behavior matches a
//! non-blocking poll loop: trimmed lines, skipped empties, immediate flush
//! after every response, one heartbeat notification per elapsed idle
//! interval, and loop exit at end of input with all handles released. The
//! HTTP transport is a single POST endpoint delivering one message per
//! request to the same dispatcher.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::json;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use upgrade_compass_core::CorpusLoader;
use upgrade_compass_core::KnowledgeBase;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::StderrAuditSink;
use crate::config::CompassConfig;
use crate::config::ServerTransport;
use crate::dispatcher::RequestDispatcher;
use crate::prompts::PromptCatalog;
use crate::registry::ToolRegistry;
use crate::resources::ResourceCatalog;
use crate::tools::ToolContext;
use crate::tools::register_default_tools;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Smallest accepted heartbeat interval in seconds.
pub const MIN_HEARTBEAT_SECS: u64 = 10;
/// Method name used for idle heartbeat notifications.
pub const HEARTBEAT_METHOD: &str = "notifications/heartbeat";
/// Capacity of the reader-to-loop line channel.
const LINE_CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: CompassConfig,
    /// Dispatcher shared across the transport.
    dispatcher: Arc<RequestDispatcher>,
    /// Audit sink for server lifecycle events.
    audit: Arc<dyn AuditSink>,
}

impl McpServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when configuration or corpus loading fails.
    pub fn from_config(config: CompassConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;

        let audit: Arc<dyn AuditSink> = match &config.server.audit_log {
            Some(path) => Arc::new(
                FileAuditSink::open(path)
                    .map_err(|err| McpServerError::Init(err.to_string()))?,
            ),
            None => Arc::new(StderrAuditSink),
        };

        let loader = config
            .knowledge
            .path
            .as_ref()
            .map_or_else(CorpusLoader::embedded, |path| CorpusLoader::directory(path.clone()));
        let knowledge =
            Arc::new(KnowledgeBase::new(loader).map_err(|err| McpServerError::Init(err.to_string()))?);

        let context = ToolContext {
            knowledge: Arc::clone(&knowledge),
            default_root: config.project.root.clone(),
            excluded_dirs: config.scan.excluded_dirs.clone(),
        };
        let mut registry = ToolRegistry::new(Arc::clone(&audit), config.tools.timeout_secs);
        register_default_tools(&mut registry, &context);

        let resources = ResourceCatalog::from_knowledge_base(&knowledge)
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let prompts = PromptCatalog::default_prompts();
        let dispatcher = Arc::new(RequestDispatcher::new(
            registry,
            resources,
            prompts,
            config.server.instructions.clone(),
        ));

        Ok(Self {
            config,
            dispatcher,
            audit,
        })
    }

    /// Returns the dispatcher, for transports hosted externally.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<RequestDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Serves requests using the configured transport.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the transport fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        match self.config.server.transport {
            ServerTransport::Stdio => {
                self.audit.emit(&AuditEvent::ServerStarted {
                    transport: "stdio",
                });
                let result = serve_stdio(
                    &self.dispatcher,
                    self.config.server.heartbeat_interval_secs,
                )
                .await;
                self.audit.emit(&AuditEvent::ServerStopped {
                    transport: "stdio",
                });
                result
            }
            ServerTransport::Http => {
                self.audit.emit(&AuditEvent::ServerStarted {
                    transport: "http",
                });
                let result = serve_http(&self.config, Arc::clone(&self.dispatcher)).await;
                self.audit.emit(&AuditEvent::ServerStopped {
                    transport: "http",
                });
                result
            }
        }
    }
}

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// Serves newline-delimited JSON-RPC over stdin/stdout.
async fn serve_stdio(
    dispatcher: &Arc<RequestDispatcher>,
    heartbeat_secs: u64,
) -> Result<(), McpServerError> {
    let (line_tx, line_rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);
    let reader = tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line_tx.blocking_send(line).is_err() {
                break;
            }
        }
        // Dropping the sender signals end of input to the loop.
    });

    let writer = tokio::io::stdout();
    let result =
        run_message_loop(Arc::clone(dispatcher), line_rx, writer, heartbeat_secs).await;
    reader.abort();
    result
}

/// Drives the dispatcher over a line channel and an output stream.
///
/// Both the reader feeding `lines` and the heartbeat deadline are raced in
/// one select loop; traffic and heartbeats each reset the idle clock. The
/// loop ends when the line channel closes (end of input), releasing the
/// writer on every path.
pub async fn run_message_loop<W>(
    dispatcher: Arc<RequestDispatcher>,
    mut lines: mpsc::Receiver<String>,
    mut writer: W,
    heartbeat_secs: u64,
) -> Result<(), McpServerError>
where
    W: AsyncWrite + Unpin,
{
    let heartbeat = Duration::from_secs(heartbeat_secs.max(MIN_HEARTBEAT_SECS));
    let mut last_activity = Instant::now();

    loop {
        let idle_deadline = last_activity + heartbeat;
        tokio::select! {
            received = lines.recv() => {
                let Some(raw) = received else {
                    break;
                };
                let line = raw.trim();
                if line.is_empty() {
                    continue;
                }
                last_activity = Instant::now();
                if let Some(response) = dispatcher.handle_raw(line).await {
                    write_line(&mut writer, &response).await?;
                }
            }
            () = tokio::time::sleep_until(idle_deadline) => {
                write_line(&mut writer, &heartbeat_notification()).await?;
                last_activity = Instant::now();
            }
        }
    }
    writer.flush().await.map_err(|_| McpServerError::Transport("stdio flush failed".to_string()))
}

/// Writes one message followed by a line terminator and flushes immediately.
async fn write_line<W>(writer: &mut W, message: &str) -> Result<(), McpServerError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(message.as_bytes())
        .await
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|_| McpServerError::Transport("stdio write failed".to_string()))?;
    writer.flush().await.map_err(|_| McpServerError::Transport("stdio write failed".to_string()))
}

/// Builds one heartbeat notification carrying a unix-seconds timestamp.
fn heartbeat_notification() -> String {
    let timestamp =
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());
    json!({
        "jsonrpc": "2.0",
        "method": HEARTBEAT_METHOD,
        "params": { "timestamp": timestamp },
    })
    .to_string()
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Shared state for the HTTP handler.
#[derive(Clone)]
struct HttpState {
    /// Dispatcher shared across connections.
    dispatcher: Arc<RequestDispatcher>,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
}

/// Serves JSON-RPC over an HTTP POST endpoint.
async fn serve_http(
    config: &CompassConfig,
    dispatcher: Arc<RequestDispatcher>,
) -> Result<(), McpServerError> {
    let bind = config
        .server
        .bind
        .as_ref()
        .ok_or_else(|| McpServerError::Config("bind address required".to_string()))?;
    let addr: SocketAddr =
        bind.parse().map_err(|_| McpServerError::Config("invalid bind address".to_string()))?;
    let state = Arc::new(HttpState {
        dispatcher,
        max_body_bytes: config.server.max_body_bytes,
    });
    let app = Router::new().route("/rpc", post(handle_http)).with_state(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|_| McpServerError::Transport("http server failed".to_string()))
}

/// Handles one HTTP JSON-RPC request.
async fn handle_http(State(state): State<Arc<HttpState>>, body: Bytes) -> impl IntoResponse {
    if body.len() > state.max_body_bytes {
        let error = json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": { "code": -32600, "message": "request body too large" },
        });
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            [(header::CONTENT_TYPE, "application/json")],
            error.to_string(),
        );
    }
    let payload = String::from_utf8_lossy(&body);
    match state.dispatcher.handle_raw(&payload).await {
        Some(response) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], response)
        }
        None => (
            StatusCode::NO_CONTENT,
            [(header::CONTENT_TYPE, "application/json")],
            String::new(),
        ),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
