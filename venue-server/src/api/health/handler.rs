//! Health API Handlers

use axum::{Json, extract::State};
use serde::Serialize;

use crate::core::AppState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub venue_id: String,
    pub subscribers: usize,
}

/// GET /api/health - liveness and basic counters
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        venue_id: state.config.venue_id.clone(),
        subscribers: state.dispatcher.subscriber_count(),
    })
}
