//! HTTP front door.
//!
//! Routes:
//! - `GET /mcp/sse` opens a streaming session
//! - `POST /mcp/message` takes one JSON-RPC message (tool invocations)
//! - `GET /health` liveness probe
//! - `GET /` and `GET /static/{*path}` bundled assets

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::server::{McpServer, SERVER_NAME};
use crate::sse::SessionManager;

/// Page served for `/`.
const LANDING_PAGE: &str = "test.html";

/// Assets compiled into the binary: (path under /static, content type, body).
const ASSETS: &[(&str, &str, &str)] = &[(
    "test.html",
    "text/html; charset=utf-8",
    include_str!("../static/test.html"),
)];

/// Fatal HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The server stopped with an I/O error.
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// State shared by every request.
#[derive(Clone)]
pub struct AppState {
    server: Arc<McpServer>,
    sessions: Arc<SessionManager>,
}

impl AppState {
    /// Bundle the MCP server and the session manager.
    pub fn new(server: McpServer, sessions: SessionManager) -> Self {
        Self {
            server: Arc::new(server),
            sessions: Arc::new(sessions),
        }
    }

    /// The session manager behind `/mcp/sse`.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    timestamp: String,
    active_sessions: usize,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/mcp/sse", get(sse_handler))
        .route("/mcp/message", post(message_handler))
        .route("/health", get(health_handler))
        .route("/", get(index_handler))
        .route("/static/{*path}", get(static_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    info!(%addr, "Starting MCP server with SSE support");
    info!("SSE endpoint: http://{}/mcp/sse", addr);
    info!("Message endpoint: http://{}/mcp/message", addr);
    info!("Health check: http://{}/health", addr);
    info!("Test page: http://{}/", addr);

    axum::serve(listener, router(state))
        .await
        .map_err(ServerError::Serve)
}

async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.sessions.open();
    debug!(session = session.id(), "Stream client connected");

    Sse::new(session.map(|event| Ok(Event::default().data(event.to_data()))))
}

async fn message_handler(State(state): State<AppState>, body: String) -> Response {
    match state.server.handle_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVER_NAME,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        active_sessions: state.sessions.active_sessions(),
    })
}

async fn index_handler() -> Response {
    asset_response(LANDING_PAGE)
}

async fn static_handler(Path(path): Path<String>) -> Response {
    asset_response(&path)
}

fn asset_response(path: &str) -> Response {
    match ASSETS.iter().find(|(name, _, _)| *name == path) {
        Some((_, content_type, body)) => {
            ([(header::CONTENT_TYPE, *content_type)], *body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 page not found").into_response(),
    }
}
