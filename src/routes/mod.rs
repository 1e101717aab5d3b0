use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{load_artifacts, ArtifactBundle, Config, HistoryError, HistoryTable, LiveDataClient};

mod debug_routes;
mod health;
mod history;
mod live_data;
mod predict;

/// Every path the service answers, as listed by `GET /debug/routes`.
///
/// Must match the subrouters merged in [`router`].
pub const ROUTE_PATHS: &[&str] = &["/", "/predict", "/data", "/history", "/debug/routes"];

// ---

/// Read-only state shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub artifacts: Arc<ArtifactBundle>,
    pub history: Arc<Result<HistoryTable, HistoryError>>,
    pub live: LiveDataClient,
}

impl AppState {
    /// Load artifacts and the history dataset, and build the outbound client.
    ///
    /// Artifact and dataset failures are logged and degrade the matching
    /// endpoints; only a client that cannot be built is fatal.
    pub fn load(cfg: &Config) -> Result<Self> {
        // ---
        let artifacts = load_artifacts(
            &cfg.model_path,
            &cfg.scaler_path,
            cfg.scaling_policy,
            cfg.aqi_target_feature,
        );

        let history = HistoryTable::load(&cfg.history_path);
        match &history {
            Ok(table) => info!("Loaded {} history rows", table.len()),
            Err(e) => error!("History dataset unavailable: {}", e),
        }

        let live = LiveDataClient::new(cfg.live_data_url.clone(), cfg.live_data_timeout())?;

        Ok(Self {
            artifacts: Arc::new(artifacts),
            history: Arc::new(history),
            live,
        })
    }
}

pub fn router(state: AppState, cors_permissive: bool) -> Router {
    // ---
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    // Keep in sync with ROUTE_PATHS.
    let app = Router::new()
        .merge(health::router())
        .merge(predict::router())
        .merge(live_data::router())
        .merge(history::router())
        .merge(debug_routes::router())
        .layer(trace_layer)
        .with_state(state);

    if cors_permissive {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}
