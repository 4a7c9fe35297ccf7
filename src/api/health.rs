use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rpc_endpoint: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Reports the cached endpoint only; probing here would put RPC load on every health poll.
    let rpc_endpoint = state
        .chain
        .current_endpoint()
        .await
        .unwrap_or_else(|| "disconnected".to_string());

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rpc_endpoint,
    })
}
