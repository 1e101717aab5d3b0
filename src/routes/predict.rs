use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use tracing::{debug, info, warn};

use crate::{AppState, PredictError, PredictRequest, PredictResponse};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/predict", post(handler))
}

/// Handle `POST /predict`.
///
/// Always answers 200: malformed bodies, wrong shapes, missing artifacts and
/// pipeline failures all come back as `{error, predicted_aqi: null}`.
async fn handler(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Json<PredictResponse> {
    // ---
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = PredictError::InvalidBody(rejection.body_text());
            warn!("POST /predict - {}", err);
            return Json(PredictResponse::failed(err.to_string()));
        }
    };

    debug!("POST /predict - {} rows", request.values.len());

    match state.artifacts.predict(&request.values) {
        Ok(aqi) => {
            info!("POST /predict - predicted AQI {:.3}", aqi);
            Json(PredictResponse::ok(aqi))
        }
        Err(e) => {
            warn!("POST /predict - {}", e);
            Json(PredictResponse::failed(e.to_string()))
        }
    }
}
