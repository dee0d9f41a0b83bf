use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use surveyor_core::orchestrator::{MissionController, MissionError};
use surveyor_core::query::{self, QueryError};
use surveyor_core::state::{MissionId, MissionRequest};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::NotFound(id) => Self::not_found(format!("mission {id} not found")),
            other => Self::internal(other.into()),
        }
    }
}

impl From<MissionError> for AppError {
    fn from(e: MissionError) -> Self {
        match e {
            e @ (MissionError::MissingTopic | MissionError::InvalidInput(_)) => {
                Self::unprocessable(e.to_string())
            }
            other => Self::internal(other.into()),
        }
    }
}

/// Malformed ids cannot name a stored mission, so they are 404s too.
fn parse_mission_id(raw: &str) -> Result<MissionId, AppError> {
    raw.parse()
        .map_err(|_| AppError::not_found(format!("mission {raw} not found")))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub message: String,
    pub mission_id: MissionId,
    pub status: &'static str,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(controller: Arc<MissionController>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/start-research", post(start_research))
        .route("/research-status/{mission_id}", get(research_status))
        .route("/research-results/{mission_id}", get(research_results))
        .layer(CorsLayer::permissive())
        .with_state(controller)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(controller: Arc<MissionController>, bind: &str, port: u16) -> Result<()> {
    let app = build_router(controller);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("surveyor serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("surveyor serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn start_research(
    State(controller): State<Arc<MissionController>>,
    Json(body): Json<StartRequest>,
) -> Result<axum::response::Response, AppError> {
    let request = MissionRequest::new(&body.topic, body.user_id)
        .map_err(|e| AppError::from(MissionError::from(e)))?;
    let topic = request.topic.to_string();
    let mission_id = controller.start(request).await?;

    let response = StartResponse {
        message: format!("Research mission started for topic: {topic}"),
        mission_id,
        status: "processing",
    };
    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

async fn research_status(
    State(controller): State<Arc<MissionController>>,
    Path(mission_id): Path<String>,
) -> Result<axum::response::Response, AppError> {
    let id = parse_mission_id(&mission_id)?;
    let report = query::mission_status(&**controller.store(), &id).await?;
    Ok(Json(report).into_response())
}

async fn research_results(
    State(controller): State<Arc<MissionController>>,
    Path(mission_id): Path<String>,
) -> Result<axum::response::Response, AppError> {
    let id = parse_mission_id(&mission_id)?;
    let state = query::mission_result(&**controller.store(), &id).await?;
    Ok(Json(state).into_response())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
