//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::director_constants::{APP_NAME, SERVICE_ID};
use crate::model::CameraId;
use crate::services::CamScoreSnapshot;
use crate::state::{Config, ProgramState};
use crate::utils::now_seconds;

use super::response::{api_error, api_ok, api_success};
use super::{ws, AppState};

/// Builds the control API router: `/health`, `/state`, `/config`, `/manual`,
/// `/reset`, `/ws`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(program_state))
        .route("/config", get(config))
        .route("/manual", post(manual))
        .route("/reset", post(reset))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    service: &'static str,
    ready: bool,
    current_cam: Option<CameraId>,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    api_success(HealthResponse {
        service: APP_NAME,
        ready: true,
        current_cam: state.services.program_tracker.current_cam(),
    })
    .into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateResponse {
    program: ProgramState,
    scores: Vec<CamScoreSnapshot>,
}

async fn program_state(State(state): State<AppState>) -> impl IntoResponse {
    api_success(StateResponse {
        program: state.services.decision_engine.snapshot(),
        scores: state.services.decision_engine.latest_scores(),
    })
    .into_response()
}

async fn config(State(state): State<AppState>) -> impl IntoResponse {
    let config: Config = state.services.config.clone();
    api_success(config).into_response()
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ManualRequest {
    #[serde(default)]
    cam_id: Option<CameraId>,
}

async fn manual(
    State(state): State<AppState>,
    body: Option<Json<ManualRequest>>,
) -> impl IntoResponse {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let Some(cam_id) = request.cam_id else {
        state.services.decision_engine.set_manual(None);
        return api_ok().into_response();
    };

    if !state.services.known_cameras.read().contains(&cam_id) {
        return api_error(
            StatusCode::NOT_FOUND,
            format!("camera not found: {}", cam_id),
        )
        .into_response();
    }

    let now = now_seconds();
    if state
        .services
        .decision_engine
        .snapshot()
        .is_in_cooldown(&cam_id, now)
    {
        return api_error(
            StatusCode::CONFLICT,
            format!("camera is in cooldown: {}", cam_id),
        )
        .into_response();
    }

    state.services.decision_engine.set_manual(Some(cam_id));
    api_ok().into_response()
}

async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    state.services.decision_engine.reset();
    api_ok().into_response()
}
