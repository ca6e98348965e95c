#![allow(dead_code)]

use axum::{routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::process::Output;

pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Stub sentiment API: "slump" → Sell, "steady" → Hold, anything else → Buy at 0.82.
pub fn stub_api() -> Router {
    Router::new()
        .route(
            "/predict",
            post(|Json(body): Json<Value>| async move {
                let text = body["text"].as_str().unwrap_or("");
                let sentiment = if text.contains("slump") {
                    "Sell"
                } else if text.contains("steady") {
                    "Hold"
                } else {
                    "Buy"
                };
                Json(json!({
                    "sentiment": sentiment,
                    "confidence": 0.82,
                    "probabilities": {"Buy": 0.82, "Hold": 0.1, "Sell": 0.08},
                    "stocks": [{"symbol": "NVDA", "name": "NVIDIA Corporation", "exchange": "NASDAQ", "sector": "Technology"}],
                    "explanation": "Upbeat demand signals."
                }))
            }),
        )
        .route(
            "/predict/batch",
            post(|Json(body): Json<Value>| async move {
                let texts: Vec<String> =
                    serde_json::from_value(body["texts"].clone()).unwrap_or_default();
                let results: Vec<Value> = texts
                    .iter()
                    .map(|t| json!({"text": t, "sentiment": "Hold", "confidence": 0.5}))
                    .collect();
                Json(json!({"count": results.len(), "results": results}))
            }),
        )
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy", "model_loaded": true})) }),
        )
}

pub fn command() -> tokio::process::Command {
    let bin = assert_cmd::cargo::cargo_bin!("newsbadge");
    let mut cmd = tokio::process::Command::new(bin);
    cmd.env_remove("NEWSBADGE_API_URL")
        .env_remove("NEWSBADGE_SETTINGS")
        .env_remove("NEWSBADGE_ENV_FILE")
        .env("RUST_LOG", "warn");
    cmd
}

pub fn stdout_json(out: &Output) -> Value {
    let s = String::from_utf8_lossy(&out.stdout);
    serde_json::from_str(s.trim()).unwrap_or_else(|e| panic!("stdout is not json ({e}): {s}"))
}
