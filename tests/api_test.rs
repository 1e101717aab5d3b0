use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use aqi_forecast::{
    load_artifacts, routes, AppState, HistoryTable, LiveDataClient, ScalingPolicy, ROUTE_PATHS,
};
use axum::{routing::get, Json, Router};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

// ---

/// Small but input-sensitive model: feature 2 (AQI) drives the cell gate.
const MODEL: &str = r#"{
    "timesteps": 5,
    "features": 3,
    "lstm": [{
        "units": 2,
        "kernel": [
            [0.01, 0.0, 0.02, 0.0, 0.01, 0.0, 0.0, 0.0],
            [0.0, 0.01, 0.0, -0.01, 0.0, 0.0, 0.01, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.01, 0.02, 0.0, 0.01]
        ],
        "recurrent_kernel": [
            [0.1, 0.0, 0.0, 0.1, 0.0, 0.1, 0.1, 0.0],
            [0.0, 0.1, 0.1, 0.0, 0.1, 0.0, 0.0, 0.1]
        ],
        "bias": [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]
    }],
    "dense": [{ "kernel": [[0.6], [0.4]], "bias": [0.2] }]
}"#;

const SCALER: &str = r#"{"kind": "min_max", "data_min": [0], "data_max": [300]}"#;

const HISTORY: &str = "\
Timestamp,Avg Temperature ,Avg Humidity,Avg AQI, AQI_Category
2025-02-01 06:00:00,22.5,70,64,Moderate
2025-02-01 07:00:00,23.0,68.5,71.5,Moderate
2025-02-01 08:00:00,24.75,66,49,Good
2025-02-01 09:00:00,26.0,63,102,Unhealthy for Sensitive Groups
";

struct Fixture {
    base: String,
    client: Client,
    _dir: TempDir,
}

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Stand-in for the spreadsheet-backed live-data source.
async fn mock_upstream() -> String {
    let app = Router::new()
        .route(
            "/ok",
            get(|| async {
                Json(json!({
                    "latest": {"temperature": 21.5, "humidity": 60, "aqi": 42, "category": "Good"},
                    "history": []
                }))
            }),
        )
        .route("/malformed", get(|| async { Json(json!({"history": []})) }))
        .route("/not-json", get(|| async { "<html>maintenance</html>" }))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"latest": {}}))
            }),
        );
    serve(app).await
}

async fn start(model: Option<&str>, history: &str, upstream_path: &str) -> Fixture {
    start_with_cors(model, history, upstream_path, true).await
}

async fn start_with_cors(
    model: Option<&str>,
    history: &str,
    upstream_path: &str,
    cors: bool,
) -> Fixture {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let model_path = match model {
        Some(body) => write(dir.path(), "model.json", body),
        None => dir.path().join("missing-model.json"),
    };
    let scaler_path = write(dir.path(), "scaler.json", SCALER);
    let history_path = write(dir.path(), "history.csv", history);

    let upstream = mock_upstream().await;
    let state = AppState {
        artifacts: Arc::new(load_artifacts(
            &model_path,
            &scaler_path,
            ScalingPolicy::InverseOutput,
            2,
        )),
        history: Arc::new(HistoryTable::load(&history_path)),
        live: LiveDataClient::new(format!("{upstream}{upstream_path}"), Duration::from_secs(1))
            .unwrap(),
    };

    let base = serve(routes::router(state, cors)).await;
    Fixture {
        base,
        client: Client::new(),
        _dir: dir,
    }
}

fn window() -> Value {
    json!([
        [22.5, 70.0, 64.0],
        [23.0, 68.5, 71.5],
        [24.75, 66.0, 49.0],
        [26.0, 63.0, 102.0],
        [25.5, 64.0, 95.0]
    ])
}

impl Fixture {
    async fn get(&self, path: &str) -> Result<Value> {
        let resp = self.client.get(format!("{}{}", self.base, path)).send().await?;
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
        Ok(resp.json().await?)
    }

    async fn predict(&self, body: Value) -> Result<Value> {
        let resp = self
            .client
            .post(format!("{}/predict", self.base))
            .json(&body)
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
        Ok(resp.json().await?)
    }
}

#[tokio::test]
async fn health_reports_loaded_artifacts() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    let body = fx.get("/").await?;
    assert_eq!(
        body,
        json!({"status": "Backend running", "model_loaded": true, "scaler_loaded": true})
    );
    Ok(())
}

#[tokio::test]
async fn predict_returns_finite_value() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    let body = fx.predict(json!({ "values": window() })).await?;

    assert!(body.get("error").is_none(), "unexpected error: {body}");
    let aqi = body["predicted_aqi"].as_f64().expect("numeric prediction");
    assert!(aqi.is_finite());
    Ok(())
}

#[tokio::test]
async fn predict_is_deterministic() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    let first = fx.predict(json!({ "values": window() })).await?;
    let second = fx.predict(json!({ "values": window() })).await?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn predict_rejects_wrong_shapes() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;
    let expected = json!({"error": "Input must be shape (5, 3)", "predicted_aqi": null});

    let four_rows = json!([[1, 2, 3], [1, 2, 3], [1, 2, 3], [1, 2, 3]]);
    let four_cols = json!([[1, 2, 3, 4], [1, 2, 3, 4], [1, 2, 3, 4], [1, 2, 3, 4], [1, 2, 3, 4]]);
    let ragged = json!([[1, 2, 3], [1, 2], [1, 2, 3], [1, 2, 3], [1, 2, 3]]);

    for values in [four_rows, four_cols, ragged, json!([])] {
        let body = fx.predict(json!({ "values": values })).await?;
        assert_eq!(body, expected);
    }
    Ok(())
}

#[tokio::test]
async fn predict_reports_malformed_body_in_band() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    let body = fx.predict(json!({ "values": "not a matrix" })).await?;

    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert!(body["predicted_aqi"].is_null());
    Ok(())
}

#[tokio::test]
async fn missing_artifacts_degrade_gracefully() -> Result<()> {
    // ---
    let fx = start(None, HISTORY, "/ok").await;

    let health = fx.get("/").await?;
    assert_eq!(health["model_loaded"], json!(false));
    assert_eq!(health["scaler_loaded"], json!(false));

    let body = fx.predict(json!({ "values": window() })).await?;
    assert_eq!(
        body,
        json!({"error": "Model or scaler not loaded", "predicted_aqi": null})
    );
    Ok(())
}

#[tokio::test]
async fn history_round_trips_dataset() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    let body = fx.get("/history").await?;
    let records = body.as_array().expect("array of records");

    assert_eq!(records.len(), 4);
    assert_eq!(
        records[0],
        json!({
            "timestamp": "2025-02-01 06:00",
            "temperature": 22.5,
            "humidity": 70.0,
            "aqi": 64.0,
            "category": "Moderate"
        })
    );
    assert_eq!(records[3]["category"], "Unhealthy for Sensitive Groups");
    assert_eq!(records[3]["timestamp"], "2025-02-01 09:00");
    Ok(())
}

#[tokio::test]
async fn history_fails_as_a_whole() -> Result<()> {
    // ---
    let broken = format!("{HISTORY}2025-02-01 10:00:00,27.0,sixty,88,Moderate\n");
    let fx = start(Some(MODEL), &broken, "/ok").await;

    let body = fx.get("/history").await?;

    assert_eq!(body["error"], "History parsing failed");
    assert!(body["details"].as_str().is_some_and(|d| d.contains("sixty")));
    Ok(())
}

#[tokio::test]
async fn live_data_is_normalized() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    let body = fx.get("/data").await?;
    assert_eq!(
        body,
        json!({
            "temperature": 21.5,
            "humidity": 60.0,
            "aqi": 42.0,
            "category": "Good",
            "history": []
        })
    );
    Ok(())
}

#[tokio::test]
async fn live_data_failures_degrade_to_defaults() -> Result<()> {
    // ---
    for path in ["/malformed", "/not-json", "/broken", "/slow"] {
        let fx = start(Some(MODEL), HISTORY, path).await;

        let body = fx.get("/data").await?;

        assert_eq!(body["temperature"], json!(0.0), "{path}");
        assert_eq!(body["humidity"], json!(0.0), "{path}");
        assert_eq!(body["aqi"], json!(0.0), "{path}");
        assert_eq!(body["category"], "Unavailable", "{path}");
        assert_eq!(body["history"], json!([]), "{path}");
        assert!(
            body["error"].as_str().is_some_and(|e| !e.is_empty()),
            "{path}: {body}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn debug_routes_lists_every_route() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    let body = fx.get("/debug/routes").await?;
    let listed: Vec<&str> = body
        .as_array()
        .expect("array of paths")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(listed, ROUTE_PATHS);

    for path in ROUTE_PATHS.iter().filter(|p| **p != "/predict") {
        let resp = fx.client.get(format!("{}{}", fx.base, path)).send().await?;
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
    }
    Ok(())
}

#[tokio::test]
async fn unlisted_paths_are_not_mounted() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    for path in ["/health", "/readings", "/debug"] {
        assert!(!ROUTE_PATHS.contains(&path));
        let resp = fx.client.get(format!("{}{}", fx.base, path)).send().await?;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "GET {path}");
    }
    Ok(())
}

#[tokio::test]
async fn cors_is_permissive() -> Result<()> {
    // ---
    let fx = start(Some(MODEL), HISTORY, "/ok").await;

    let resp = fx
        .client
        .get(format!("{}/", fx.base))
        .header("Origin", "https://dashboard.example")
        .send()
        .await?;

    let allow = resp.headers().get("access-control-allow-origin");
    tokio_test::assert_ok!(allow.ok_or("missing CORS header"));
    assert_eq!(allow.unwrap(), "*");
    Ok(())
}

#[tokio::test]
async fn cors_can_be_disabled() -> Result<()> {
    // ---
    let fx = start_with_cors(Some(MODEL), HISTORY, "/ok", false).await;

    let resp = fx
        .client
        .get(format!("{}/", fx.base))
        .header("Origin", "https://dashboard.example")
        .send()
        .await?;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("access-control-allow-origin").is_none());
    Ok(())
}
