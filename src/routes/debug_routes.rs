// src/routes/debug_routes.rs
//! Lists the paths the service answers on, for quick smoke checks.

use axum::{routing::get, Json, Router};

use crate::ROUTE_PATHS;

async fn list_routes() -> Json<&'static [&'static str]> {
    Json(ROUTE_PATHS)
}

/// Create a subrouter containing the `/debug/routes` route.
///
/// Generic over the application state so it merges with the gateway router.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/debug/routes", get(list_routes))
}
