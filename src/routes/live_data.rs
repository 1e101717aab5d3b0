use axum::{extract::State, routing::get, Json, Router};
use tracing::{error, info};

use crate::{AppState, LiveReading};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/data", get(handler))
}

/// Handle `GET /data`.
///
/// Any upstream failure (timeout, bad status, malformed JSON) degrades to the
/// zeroed "Unavailable" payload with an `error` field.
async fn handler(State(state): State<AppState>) -> Json<LiveReading> {
    // ---
    match state.live.fetch().await {
        Ok(reading) => {
            info!(
                "GET /data - AQI {} ({}), {} history points",
                reading.aqi,
                reading.category,
                reading.history.len()
            );
            Json(reading)
        }
        Err(e) => {
            error!("GET /data - failed to fetch live data: {}", e);
            Json(LiveReading::unavailable(e.to_string()))
        }
    }
}
