use actix_web::web;

use crate::handlers::{health_check, prewarm_endpoint, recommendations_config};

/// Configure all routes for the API
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(prewarm_endpoint)
        .configure(recommendations_config);
}
