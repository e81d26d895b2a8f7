//! # API Module
//!
//! HTTP surface of the relay.
//!
//! ## Available Endpoints
//! - `GET /api/health` - Liveness probe
//! - `POST /api/make_tx` - Build, sign and broadcast a bank transfer
//! - `POST /api/rpc` - JSON-RPC 2.0 command dispatch (`make_tx`, `list_commands`)

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    command::{
        handler::handle_command,
        protocol::{Request, Response},
    },
    AppState,
};

pub mod health;
pub mod make_tx;

/// Builds the application router.
pub fn create_router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/make_tx", post(make_tx::make_tx_handler))
        .route("/rpc", post(rpc_handler));

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// Forward JSON-RPC requests over HTTP to the command handler
async fn rpc_handler(State(state): State<AppState>, Json(req): Json<Request>) -> Json<Response> {
    if let Some(refusal) = req.envelope_error() {
        return Json(refusal);
    }
    Json(handle_command(req, state).await)
}
