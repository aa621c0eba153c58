use std::sync::Arc;

use anyhow::{Error, Result};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post, put},
};
use serde_json::{Value as JsonValue, json};
use tokio::{net::TcpListener, sync::mpsc};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    clients::health::HealthChecker,
    models::{
        health::HealthStatus,
        settings::{ControlCommand, SettingChange},
    },
};

pub struct AppState {
    health_checker: HealthChecker,
    control: mpsc::UnboundedSender<ControlCommand>,
    settings: mpsc::UnboundedSender<SettingChange>,
}

impl AppState {
    pub fn new(
        control: mpsc::UnboundedSender<ControlCommand>,
        settings: mpsc::UnboundedSender<SettingChange>,
    ) -> Self {
        Self {
            health_checker: HealthChecker::new(control.clone(), settings.clone()),
            control,
            settings,
        }
    }
}

/// Control surface for the running daemon.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/enable", post(enable))
        .route("/disable", post(disable))
        .route("/settings/{key}", put(change_setting))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub async fn run_api_server(port: u16, state: AppState) -> Result<(), Error> {
    let app = router(state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Control server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all();

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Activation is implicit in the daemon running.
async fn enable() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "enabled": true })))
}

async fn disable(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.control.send(ControlCommand::Disable).is_err() {
        warn!("Disable requested but the daemon already stopped");
        return (StatusCode::GONE, Json(json!({ "enabled": false })));
    }
    (StatusCode::ACCEPTED, Json(json!({ "enabled": false })))
}

async fn change_setting(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(value): Json<JsonValue>,
) -> impl IntoResponse {
    let change = SettingChange::new(key, value);
    if state.settings.send(change).is_err() {
        return StatusCode::GONE;
    }
    StatusCode::ACCEPTED
}
