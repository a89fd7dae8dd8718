//! HTTP tool server.
//!
//! Serves the analytic tools over a small JSON API and over MCP
//! Streamable HTTP, both backed by the same [`ToolRegistry`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/tools/list` | List all tools with parameter schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name |
//! | `*`    | `/mcp` | MCP Streamable HTTP endpoint |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "platform must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `tool_error` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::analytics::Analytics;
use crate::config::Config;
use crate::db;
use crate::mcp::McpBridge;
use crate::migrate;
use crate::traits::{ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

/// Open the store and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let app = router(Analytics::new(pool));
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;

    println!("Tool server listening on http://{}", config.server.bind);
    for tool in ToolRegistry::with_builtins().tools() {
        println!("  POST /tools/{} ({})", tool.name(), tool.description());
    }
    println!("  MCP endpoint: http://{}/mcp", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Routes for the JSON API and the MCP endpoint.
pub fn router(analytics: Analytics) -> Router {
    let tools = Arc::new(ToolRegistry::with_builtins());
    let ctx = ToolContext::new(analytics);

    let bridge = McpBridge::new(tools.clone(), ctx.clone());
    let mcp = StreamableHttpService::new(
        move || Ok(bridge.clone()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .with_state(AppState { tools, ctx })
        .nest_service("/mcp", mcp)
        .layer(cors)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error",
        message: message.into(),
    }
}

/// Map a tool failure to a status: validation problems are the caller's,
/// everything else is ours.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = err.to_string();
    if msg.contains("must not be empty") || msg.contains("invalid") {
        bad_request(format!("{}: {}", tool_name, msg))
    } else {
        tracing::error!(tool = tool_name, error = %msg, "tool failed");
        tool_error(format!("{}: {}", tool_name, msg))
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let tools = state
        .tools
        .tools()
        .iter()
        .map(|t| ToolInfo::of(t.as_ref()))
        .collect();
    Json(ToolListResponse { tools })
}

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let params = crate::traits::validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let result = tool
        .execute(params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}
