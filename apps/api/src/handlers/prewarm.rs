//! Prewarm endpoint to avoid paying the provider's cold start on the first
//! user query

use crate::services::RecommendationService;
use actix_web::{get, web, HttpResponse};
use log::info;
use serde_json::json;

/// Sends one embedding request through the provider. Always answers 200;
/// `status` is `partial` when the provider did not respond correctly.
#[get("/prewarm")]
pub async fn prewarm(recommendation_service: web::Data<RecommendationService>) -> HttpResponse {
    info!("Prewarming API services...");

    let provider_ok = recommendation_service.prewarm().await;
    let (status, message) = if provider_ok {
        ("ok", "Embedding provider is warm")
    } else {
        ("partial", "Embedding provider did not respond correctly")
    };

    HttpResponse::Ok().json(json!({
        "status": status,
        "message": message,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
