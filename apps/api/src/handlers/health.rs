use crate::{models::HealthResponse, services::RecommendationService};
use actix_web::{get, web, HttpResponse};

#[get("/health")]
pub async fn health_check(
    recommendation_service: web::Data<RecommendationService>,
) -> HttpResponse {
    let catalog_items = recommendation_service
        .catalog()
        .all()
        .map(|c| c.len())
        .unwrap_or(0);

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        catalog_items,
    })
}
