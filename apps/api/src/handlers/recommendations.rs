use crate::{
    error::ApiError,
    models::{RecommendationRequest, RecommendationResponse},
    services::RecommendationService,
};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recommend").route(web::post().to(recommend)));
}

/// Returns up to ten assessments for a free-text job description.
///
/// Blank queries are rejected with 400. An embedding provider outage is not
/// an error here: the response is 200 with an empty list.
pub async fn recommend(
    request: Json<RecommendationRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    let recommended_assessments = recommendation_service.recommend(&request.query).await?;

    Ok(HttpResponse::Ok().json(RecommendationResponse {
        recommended_assessments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::recommendation::tests::{catalog_store, TableEmbedder};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;
    use std::sync::Arc;

    fn service() -> web::Data<RecommendationService> {
        web::Data::new(RecommendationService::new(
            Arc::new(TableEmbedder::new(&[("sql analyst", vec![0.2, 1.0, 0.0])])),
            catalog_store(3),
        ))
    }

    #[actix_web::test]
    async fn test_recommend_returns_documented_shape() {
        let app = test::init_service(
            App::new()
                .app_data(service())
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommend")
            .set_json(json!({ "query": "sql analyst" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let items = body["recommended_assessments"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["url"], "https://x.com/item-1");
        assert_eq!(items[0]["adaptive_support"], "No");
        assert_eq!(items[0]["duration"], 30);
        assert_eq!(items[0]["test_type"], json!(["Knowledge & Skills"]));
    }

    #[actix_web::test]
    async fn test_blank_query_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(service())
                .configure(recommendations_config),
        )
        .await;

        for payload in [json!({ "query": "   " }), json!({})] {
            let req = test::TestRequest::post()
                .uri("/recommend")
                .set_json(payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[actix_web::test]
    async fn test_provider_outage_is_empty_ok() {
        let app = test::init_service(
            App::new()
                .app_data(service())
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommend")
            .set_json(json!({ "query": "something the provider rejects" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["recommended_assessments"], json!([]));
    }
}
