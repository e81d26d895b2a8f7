use axum::{extract::State, response::IntoResponse, Json};

use crate::{config::Connectivity, AppState};

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let connectivity = match state.config.connectivity {
        Connectivity::Rest => "rest",
        Connectivity::Rpc => "rpc",
    };
    Json(serde_json::json!({
        "status": "ok",
        "connectivity": connectivity,
        "denom": state.config.native_denom,
    }))
}
