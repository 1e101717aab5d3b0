use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{error, info};

use crate::{AppState, HistoryFailure};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/history", get(handler))
}

/// Handle `GET /history`.
///
/// Returns every row of the dataset or, if any row fails to convert, only
/// `{error: "History parsing failed", details}`.
async fn handler(State(state): State<AppState>) -> Response {
    // ---
    let records = match &*state.history {
        Ok(table) => table.records(),
        Err(e) => {
            error!("GET /history - dataset not loaded: {}", e);
            return failure(e.to_string());
        }
    };

    match records {
        Ok(records) => {
            info!("GET /history - returning {} records", records.len());
            Json(records).into_response()
        }
        Err(e) => {
            error!("GET /history - {}", e);
            failure(e.to_string())
        }
    }
}

fn failure(details: String) -> Response {
    Json(HistoryFailure {
        error: "History parsing failed",
        details,
    })
    .into_response()
}
