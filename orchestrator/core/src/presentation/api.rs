// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::application::space_manager::SpaceLifecycleService;
use crate::domain::error::SpaceError;
use crate::domain::space::SpaceRequest;

pub struct AppState {
    pub space_service: Arc<dyn SpaceLifecycleService>,
}

pub fn app(service: Arc<dyn SpaceLifecycleService>) -> Router {
    let state = Arc::new(AppState { space_service: service });

    Router::new()
        .route("/health", get(health))
        .route("/spaces/{user}", get(list_spaces).post(create_space))
        .route("/spaces/{user}/{name}", get(get_space).delete(kill_space))
        .route("/spaces/{user}/{name}/stop", post(stop_space))
        .route("/spaces/{user}/{name}/start", post(start_space))
        .route("/spaces/{user}/{name}/restart", post(restart_space))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSpaceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub pubkey: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub ssh_port: u16,
    #[serde(default)]
    pub vscode_port: u16,
}

/// Error response body. `detail` carries captured command output, if any.
fn error_response(err: SpaceError) -> Response {
    let status = match &err {
        SpaceError::NotFound(_) => StatusCode::NOT_FOUND,
        SpaceError::AlreadyExists(instance) => {
            return (StatusCode::CONFLICT, Json(instance.as_ref().clone())).into_response();
        }
        SpaceError::NoNameAvailable(_) | SpaceError::InvalidState { .. } => StatusCode::CONFLICT,
        SpaceError::ImageNotFound(_) | SpaceError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = json!({
        "error": err.to_string(),
        "detail": err.output().unwrap_or_default(),
    });
    (status, Json(body)).into_response()
}

async fn health(headers: HeaderMap) -> Response {
    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));

    if wants_json {
        Json(json!({ "result": "OK" })).into_response()
    } else {
        "OK".into_response()
    }
}

async fn list_spaces(State(state): State<Arc<AppState>>, Path(user): Path<String>) -> Response {
    match state.space_service.list(&user).await {
        Ok(instances) => Json(instances).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_space(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(payload): Json<CreateSpaceRequest>,
) -> Response {
    let request = SpaceRequest {
        user,
        name: payload.name,
        image: payload.image,
        password: payload.password,
        pubkey: payload.pubkey,
        ssh_port: payload.ssh_port,
        vscode_port: payload.vscode_port,
    };

    match state.space_service.create(request).await {
        Ok(created) => {
            let location = format!("/spaces/{}/{}", created.instance.user, created.instance.name);
            (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(created.instance),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn get_space(State(state): State<Arc<AppState>>, Path((user, name)): Path<(String, String)>) -> Response {
    match state.space_service.get(&user, &name, true).await {
        Ok(instance) => Json(instance).into_response(),
        Err(e) => error_response(e),
    }
}

async fn kill_space(State(state): State<Arc<AppState>>, Path((user, name)): Path<(String, String)>) -> Response {
    match state.space_service.kill(&user, &name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn stop_space(State(state): State<Arc<AppState>>, Path((user, name)): Path<(String, String)>) -> Response {
    match state.space_service.stop(&user, &name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn start_space(State(state): State<Arc<AppState>>, Path((user, name)): Path<(String, String)>) -> Response {
    match state.space_service.start(&user, &name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn restart_space(State(state): State<Arc<AppState>>, Path((user, name)): Path<(String, String)>) -> Response {
    match state.space_service.restart(&user, &name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}
