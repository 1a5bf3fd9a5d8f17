//! HTTP surface for the presentation layer.
//!
//! Three routes: select a lookback window (starts an async refresh), read
//! the latest snapshot, and a health probe. The handlers do no aggregation
//! themselves; they hand the fetched documents to the aggregator and publish
//! the result through `DashboardState`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{
    aggregate::{aggregate, AggregateOptions},
    models::{window_in_menu, WINDOW_MENU},
    state::{DashboardState, WindowSnapshot},
    store::RunStoreClient,
};

/// Shared handler state.
pub struct AppState {
    pub store: RunStoreClient,
    pub dashboard: DashboardState,
    pub options: AggregateOptions,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/window", post(select_window))
        .route("/api/dashboard", get(dashboard))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "service": "runlog-backend",
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct WindowRequest {
    pub days: u32,
}

#[derive(Debug, Serialize)]
pub struct WindowAccepted {
    pub days: u32,
    pub generation: u64,
}

async fn select_window(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WindowRequest>,
) -> Result<(StatusCode, Json<WindowAccepted>), (StatusCode, Json<Value>)> {
    if !window_in_menu(request.days) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": format!("days must be one of {WINDOW_MENU:?}"),
            })),
        ));
    }

    let generation = spawn_refresh(state, request.days);
    Ok((
        StatusCode::ACCEPTED,
        Json(WindowAccepted {
            days: request.days,
            generation,
        }),
    ))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Arc<WindowSnapshot>>, (StatusCode, Json<Value>)> {
    match state.dashboard.latest() {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no snapshot yet; select a window first" })),
        )),
    }
}

/// Starts a fetch-and-aggregate task for `days` and returns its generation.
pub fn spawn_refresh(state: Arc<AppState>, days: u32) -> u64 {
    let generation = state.dashboard.begin_refresh();
    tokio::spawn(async move {
        match refresh(&state, days, generation).await {
            Ok(true) => info!(days, generation, "dashboard snapshot applied"),
            Ok(false) => {}
            Err(err) => error!(days, generation, error = %err, "window refresh failed"),
        }
    });
    generation
}

async fn refresh(state: &AppState, days: u32, generation: u64) -> anyhow::Result<bool> {
    let docs = state.store.fetch_documents(days).await?;
    let result = aggregate(&docs, days, state.options)?;
    let snapshot = WindowSnapshot {
        window_days: days,
        generation,
        fetched_at: Utc::now(),
        result,
        docs,
    };
    Ok(state.dashboard.apply(snapshot))
}
