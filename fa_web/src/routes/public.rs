//! ABOUTME: Public endpoints that need no job or catalog state
//! ABOUTME: Basic health reporting for load balancers and uptime checks

use actix_web::{get, HttpResponse};
use serde_json::json;

/// Service health check
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "public",
    responses(
        (status = 200, description = "Service is healthy"),
    )
)]
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
