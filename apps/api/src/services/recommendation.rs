use crate::{
    config::MAX_RECOMMENDATIONS,
    error::{ApiError, Result},
    ml::Embedder,
    models::{CatalogItem, Recommendation},
    services::{catalog::CatalogStore, ranker},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const MAX_QUERY_PREVIEW_LENGTH: usize = 70;
const PREWARM_QUERY: &str = "Java developer who can collaborate with business teams";

fn preview(query: &str) -> String {
    query.chars().take(MAX_QUERY_PREVIEW_LENGTH).collect()
}

/// Embeds a query, ranks the catalog against it and returns the best
/// matching assessments.
///
/// Embedding provider failures do not surface as errors: the service logs
/// them and answers with an empty list. An empty list scores zero recall in
/// evaluation, which is the intended signal for an outage.
#[derive(Clone)]
pub struct RecommendationService {
    embedder: Arc<dyn Embedder>,
    catalog: Arc<CatalogStore>,
    top_k: usize,
}

impl RecommendationService {
    pub fn new(embedder: Arc<dyn Embedder>, catalog: Arc<CatalogStore>) -> Self {
        Self {
            embedder,
            catalog,
            top_k: MAX_RECOMMENDATIONS,
        }
    }

    /// Overrides the number of returned items, clamped to `1..=10`.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.clamp(1, MAX_RECOMMENDATIONS);
        self
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub async fn recommend(&self, query: &str) -> Result<Vec<Recommendation>> {
        let scored = self.recommend_scored(query).await?;
        Ok(scored
            .iter()
            .map(|(item, _)| Recommendation::from(item))
            .collect())
    }

    /// Like [`recommend`](Self::recommend) but keeps the full catalog item and
    /// similarity score of every result.
    pub async fn recommend_scored(&self, query: &str) -> Result<Vec<(CatalogItem, f32)>> {
        let trimmed_query = query.trim();
        if trimmed_query.is_empty() {
            return Err(ApiError::EmptyQuery);
        }

        // Snapshot taken before the provider call; no lock is held across it
        let catalog = self.catalog.all()?;

        info!("Received query: {}", preview(trimmed_query));

        let embedding = match self.embedder.embed(trimmed_query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!(
                    error = %e,
                    "Embedding provider failed for query '{}', returning no recommendations",
                    preview(trimmed_query)
                );
                return Ok(Vec::new());
            }
        };

        let ranked = match ranker::rank(&embedding, &catalog, self.top_k) {
            Ok(ranked) => ranked,
            Err(e @ ApiError::DimensionMismatch { .. }) => {
                // A provider answering with the wrong model is a provider failure
                error!(error = %e, "Embedding does not match catalog, returning no recommendations");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        debug!(
            "Top scores: {:?}",
            ranked
                .iter()
                .take(3)
                .map(|s| (s.item.name.as_str(), s.score))
                .collect::<Vec<_>>()
        );
        info!("Returning {} recommendations", ranked.len());

        Ok(ranked
            .into_iter()
            .map(|s| (s.item.clone(), s.score))
            .collect())
    }

    /// Sends one embedding request so the provider connection is warm before
    /// the first user query. Returns whether the provider answered.
    pub async fn prewarm(&self) -> bool {
        info!("Warming up embedding provider ({})", self.embedder.model_info());
        match self.embedder.embed(PREWARM_QUERY).await {
            Ok(embedding) => {
                if let Ok(catalog) = self.catalog.all() {
                    if catalog.dimension() != embedding.len() {
                        warn!(
                            "Provider dimension {} does not match catalog dimension {}",
                            embedding.len(),
                            catalog.dimension()
                        );
                        return false;
                    }
                }
                true
            }
            Err(e) => {
                warn!("Prewarm embedding request failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::catalog::{tests::item, Catalog};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder backed by a lookup table; unknown texts fail.
    pub(crate) struct TableEmbedder {
        pub table: HashMap<String, Vec<f32>>,
        pub calls: AtomicUsize,
    }

    impl TableEmbedder {
        pub(crate) fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| ApiError::ProviderFailure(format!("no embedding for '{}'", text)))
        }
    }

    pub(crate) fn catalog_store(n: usize) -> Arc<CatalogStore> {
        // Item i points along axis i of an n-dimensional space.
        let items = (0..n)
            .map(|i| {
                let mut v = vec![0.0; n];
                v[i] = 1.0;
                item(&format!("https://x.com/item-{}", i), v)
            })
            .collect();
        Arc::new(CatalogStore::with_catalog(
            Catalog::from_items(items).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_recommend_returns_top_ten_in_rank_order() {
        let mut query = vec![0.0; 12];
        for (i, v) in query.iter_mut().enumerate() {
            *v = 12.0 - i as f32;
        }
        let embedder = Arc::new(TableEmbedder::new(&[("data analyst", query)]));
        let service = RecommendationService::new(embedder, catalog_store(12));

        let result = service.recommend("  data analyst ").await.unwrap();
        assert_eq!(result.len(), 10);
        assert_eq!(result[0].url, "https://x.com/item-0");
        assert_eq!(result[9].url, "https://x.com/item-9");
        assert_eq!(result[0].remote_support, "Yes");
    }

    #[tokio::test]
    async fn test_empty_query_never_reaches_provider() {
        let embedder = Arc::new(TableEmbedder::new(&[]));
        let service = RecommendationService::new(embedder.clone(), catalog_store(3));

        for query in ["", "   ", "\n\t"] {
            assert!(matches!(
                service.recommend(query).await,
                Err(ApiError::EmptyQuery)
            ));
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_fails_open_to_empty_list() {
        let embedder = Arc::new(TableEmbedder::new(&[]));
        let service = RecommendationService::new(embedder.clone(), catalog_store(3));

        let result = service.recommend("unknown query").await.unwrap();
        assert!(result.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_fails_open_to_empty_list() {
        let embedder = Arc::new(TableEmbedder::new(&[("q", vec![1.0, 0.0])]));
        let service = RecommendationService::new(embedder, catalog_store(3));
        assert!(service.recommend("q").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unloaded_catalog_is_refused() {
        let embedder = Arc::new(TableEmbedder::new(&[("q", vec![1.0])]));
        let store = Arc::new(CatalogStore::new("unused.json"));
        let service = RecommendationService::new(embedder.clone(), store);

        assert!(matches!(
            service.recommend("q").await,
            Err(ApiError::NotLoaded)
        ));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_top_k_is_clamped_and_scores_are_exposed() {
        let embedder = Arc::new(TableEmbedder::new(&[("q", vec![0.0, 1.0, 0.0])]));
        let service = RecommendationService::new(embedder, catalog_store(3)).with_top_k(2);

        let scored = service.recommend_scored("q").await.unwrap();
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].0.id, "https://x.com/item-1");
        assert!((scored[0].1 - 1.0).abs() < 1e-6);

        let service = service.with_top_k(50);
        assert_eq!(service.recommend("q").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_prewarm_reports_provider_health() {
        let healthy = Arc::new(TableEmbedder::new(&[(PREWARM_QUERY, vec![1.0, 0.0, 0.0])]));
        assert!(RecommendationService::new(healthy, catalog_store(3)).prewarm().await);

        let broken = Arc::new(TableEmbedder::new(&[]));
        assert!(!RecommendationService::new(broken, catalog_store(3)).prewarm().await);
    }
}
