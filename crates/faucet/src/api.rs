//! HTTP API for faucet service

use crate::coordinator::{DisbursementCoordinator, FaucetStatus};
use crate::error::{FaucetError, FaucetResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Faucet request body
#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    pub address: Option<String>,
}

/// Successful faucet response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaucetResponse {
    pub success: bool,
    pub transaction_hash: String,
    pub amount: String,
    pub to: String,
    pub message: String,
}

/// Build the faucet router
pub fn router(coordinator: DisbursementCoordinator, cors_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/api/faucet", post(faucet_handler))
        .route("/api/faucet/info", get(info_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found_handler)
        .with_state(coordinator)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        app = app.layer(cors);
        info!("CORS enabled");
    }

    app
}

/// Dispense handler
pub async fn faucet_handler(
    State(coordinator): State<DisbursementCoordinator>,
    payload: Result<Json<FaucetRequest>, JsonRejection>,
) -> FaucetResult<Json<FaucetResponse>> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected faucet request body: {}", rejection);
            return Err(FaucetError::MissingAddress);
        }
    };

    let raw = request.address.unwrap_or_default();
    let disbursement = coordinator.request_disbursement(&raw).await?;
    let to = raw.trim().to_string();

    Ok(Json(FaucetResponse {
        success: true,
        message: format!("Successfully sent {} ETH to {}", disbursement.amount, to),
        transaction_hash: disbursement.tx_hash,
        amount: disbursement.amount,
        to,
    }))
}

/// Faucet info handler
pub async fn info_handler(
    State(coordinator): State<DisbursementCoordinator>,
) -> FaucetResult<Json<FaucetStatus>> {
    Ok(Json(coordinator.status().await?))
}

/// Prometheus metrics
pub async fn metrics_handler(
    State(coordinator): State<DisbursementCoordinator>,
) -> impl IntoResponse {
    match coordinator.metrics().encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => FaucetError::Unexpected(format!("metrics encoding: {}", e)).into_response(),
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": "Endpoint not found"
        })),
    )
}
