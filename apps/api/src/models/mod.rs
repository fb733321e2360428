use serde::{Deserialize, Serialize};

pub use assessment::{CatalogItem, Duration, Recommendation};

mod assessment;

/// Request structure for assessment recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// Free-text job description or requirement
    #[serde(default)]
    pub query: String,
}

/// Response structure for assessment recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommended_assessments: Vec<Recommendation>,
}

/// Health check response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
    pub catalog_items: usize,
}
