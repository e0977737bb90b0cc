//! HTTP and WebSocket gateway for siteforge.
//!
//! Endpoints:
//! - `POST /chat/{session_id}` — submit a prompt; 400 on empty prompt, 409
//!   while a run is active for the session, 200 with the final manifest on
//!   completion, 500 if the run itself fails
//! - `GET  /ws/{session_id}`   — live run events as JSON frames
//! - `GET  /health`            — liveness
//!
//! Built on Axum. The session registries (active runs, environments) are
//! explicit injected state, never ambient globals.

pub mod registry;
mod ws;

pub use registry::{RunGuard, RunRegistry};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use siteforge_agent::AgentLoop;
use siteforge_config::{AppConfig, GatewayConfig};
use siteforge_core::environment::EnvironmentManager;
use siteforge_core::event::EventRouter;
use siteforge_core::identity::Identity;
use siteforge_core::session::{FileManifestEntry, RunStatus};
use siteforge_sandbox::{SandboxClient, SandboxManager};
use siteforge_store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub agent: Arc<AgentLoop>,
    pub environments: Arc<dyn EnvironmentManager>,
    pub events: Arc<EventRouter>,
    pub runs: Arc<RunRegistry>,
}

pub type SharedState = Arc<AppState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let cors = match config.allowed_origin.parse() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::exact(origin))
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]),
        Err(_) => {
            warn!(origin = %config.allowed_origin, "Invalid allowed_origin, CORS left restrictive");
            CorsLayer::new()
        }
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat/{session_id}", post(chat_handler))
        .route("/ws/{session_id}", get(ws::ws_handler))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Builds the provider, sandbox manager, store, event router, and agent
/// loop once and shares them via `Arc`.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = siteforge_providers::build_from_config(&config)?;
    let sandbox_client = SandboxClient::new(config.sandbox.clone())?;
    let environments: Arc<dyn EnvironmentManager> =
        Arc::new(SandboxManager::new(Arc::new(sandbox_client)));
    let store = SessionStore::new(config.data_dir.clone());
    let events = Arc::new(EventRouter::new());

    let identity = match &config.system_prompt_override {
        Some(prompt) => Identity::web_builder().with_system_prompt(prompt),
        None => Identity::web_builder(),
    };

    let agent = Arc::new(
        AgentLoop::new(
            provider,
            &config.model,
            config.temperature,
            environments.clone(),
            store,
            events.clone(),
            identity,
        )
        .with_max_tokens(config.max_tokens)
        .with_max_iterations(config.max_iterations)
        .with_command_timeout(Duration::from_secs(config.sandbox.command_timeout_secs))
        .with_dev_server_port(config.sandbox.dev_server_port),
    );

    let state = Arc::new(AppState {
        agent,
        environments,
        events,
        runs: Arc::new(RunRegistry::new()),
    });

    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    prompt: String,
}

#[derive(Serialize)]
struct ChatResponse {
    status: RunStatus,
    session_id: String,
    file_count: usize,
    files: Vec<FileManifestEntry>,
    environment_id: Option<String>,
    environment_active: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

async fn chat_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let prompt = payload.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Missing or empty prompt",
        ));
    }

    // Atomic check-and-register: at most one run per session.
    let Some(_guard) = state.runs.begin(&session_id) else {
        info!(session_id, "Rejecting concurrent submission");
        return Err(error_response(
            StatusCode::CONFLICT,
            "A run is already active for this session",
        ));
    };

    info!(session_id, prompt_len = prompt.len(), "Run submitted");

    match state.agent.run(&session_id, &prompt).await {
        Ok(outcome) => Ok(Json(ChatResponse {
            status: outcome.status,
            session_id,
            file_count: outcome.files.len(),
            files: outcome.files,
            environment_id: outcome.environment_id,
            environment_active: outcome.environment_active,
        })),
        Err(e) => {
            error!(session_id, error = %e, "Run failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            ))
        }
    }
    // _guard drops here, releasing the session's run slot.
}
