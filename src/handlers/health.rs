// handlers/health.rs - GET /health

use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::database::store::StoreError;
use crate::types::ServiceKind;

/// Health body for `service` given the outcome of its store probe
pub fn report(service: ServiceKind, probe: Result<(), StoreError>) -> (StatusCode, Json<Value>) {
    let now = chrono::Utc::now();

    match probe {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "UP",
                "service": service.name(),
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::error!("Health check for {} failed: {}", service, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "DOWN",
                    "service": service.name(),
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}

/// Gateway health; the gateway holds no store
pub async fn gateway() -> (StatusCode, Json<Value>) {
    report(ServiceKind::Gateway, Ok(()))
}
