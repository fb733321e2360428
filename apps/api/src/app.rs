use crate::{
    config::Config,
    error::Result,
    ml::{Embedder, OpenAiEmbedder},
    routes::api_routes,
    services::{CatalogStore, RecommendationService},
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use std::net::TcpListener;
use std::sync::Arc;

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Loads the catalog and builds the recommendation service. A corrupt or
    /// missing catalog stops startup here, before any port is bound.
    pub fn build_service(&self) -> Result<RecommendationService> {
        let catalog = Arc::new(CatalogStore::new(&self.config.catalog_path));
        catalog.load()?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(&self.config.embedding)?);

        Ok(RecommendationService::new(embedder, catalog).with_top_k(self.config.top_k))
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        let recommendation_service = self.build_service()?;

        let bind_address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}", bind_address);

        Self::serve(recommendation_service, listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let recommendation_service = self.build_service()?;
        Self::serve(recommendation_service, listener).await
    }

    async fn serve(service: RecommendationService, listener: TcpListener) -> Result<()> {
        let recommendation_service = web::Data::new(service);

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(recommendation_service.clone())
                .configure(api_routes)
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::error::ApiError;
    use std::path::PathBuf;

    fn config(catalog_path: PathBuf, port: u16) -> Config {
        Config {
            host: "127.0.0.1".into(),
            port,
            catalog_path,
            top_k: 10,
            embedding: EmbeddingConfig {
                api_key: "test-key".into(),
                base_url: "http://127.0.0.1:9/v1".into(),
                model: "test-model".into(),
                timeout_secs: 1,
                max_attempts: 1,
                retry_delay_ms: 0,
            },
        }
    }

    #[test]
    fn test_build_service_rejects_missing_and_corrupt_catalogs() {
        let missing = Application::new(&config(PathBuf::from("/nonexistent/catalog.json"), 0));
        assert!(matches!(
            missing.build_service(),
            Err(ApiError::CorruptCatalog(_))
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"[{"name":"A","url":"https://x.com/a","test_type":"K","embedding":[1.0]},
                {"name":"B","url":"https://x.com/b","test_type":"K","embedding":[1.0,0.0]}]"#,
        )
        .unwrap();
        let corrupt = Application::new(&config(file.path().to_path_buf(), 0));
        assert!(matches!(
            corrupt.build_service(),
            Err(ApiError::CorruptCatalog(_))
        ));
    }

    #[test]
    fn test_build_service_loads_valid_catalog() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"[{"name":"A","url":"https://x.com/a","test_type":"K","embedding":[1.0,0.0]}]"#,
        )
        .unwrap();
        let application = Application::new(&config(file.path().to_path_buf(), 0));
        let service = application.build_service().unwrap();
        assert_eq!(service.catalog().all().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_corrupt_catalog_fails_before_port_is_bound() {
        // Port already taken: a bind attempt would surface as an I/O error.
        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();

        let application =
            Application::new(&config(PathBuf::from("/nonexistent/catalog.json"), port));
        assert!(matches!(
            application.run().await,
            Err(ApiError::CorruptCatalog(_))
        ));
    }
}
