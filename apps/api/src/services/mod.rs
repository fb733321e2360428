pub mod catalog;
pub mod evaluator;
pub mod ranker;
pub mod recommendation;

// Re-export public types
pub use catalog::{Catalog, CatalogStore};
pub use evaluator::{EvaluationCase, EvaluationReport, Evaluator};
pub use recommendation::RecommendationService;
