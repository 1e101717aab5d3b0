// src/routes/health.rs
//! Health endpoint for the AQI service.
//!
//! `GET /` reports that the process is up and whether the model and scaler
//! made it through startup. It never fails and never touches the model.
//! Sibling module of the `routes` gateway (EMBP): exports only a subrouter.

use axum::{extract::State, routing::get, Json, Router};

use crate::{AppState, HealthResponse};

/// Handle `GET /`.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Backend running",
        model_loaded: state.artifacts.model_loaded(),
        scaler_loaded: state.artifacts.scaler_loaded(),
    })
}

/// Create a subrouter containing the `/` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}
