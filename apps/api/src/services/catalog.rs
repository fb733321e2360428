use crate::{
    error::{ApiError, Result},
    models::CatalogItem,
};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};
use tracing::{info, warn};
use url::Url;

/// Canonical form of an item identifier.
///
/// URLs compare equal regardless of scheme/host case, default port,
/// query string, fragment, path case and trailing slashes. Anything that
/// does not parse as a URL is trimmed and lowercased.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();

    match Url::parse(trimmed) {
        Ok(url) if url.has_host() => {
            let host = url.host_str().unwrap_or_default();
            let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
            let path = url.path().trim_end_matches('/').to_lowercase();
            format!("{}://{}{}{}", url.scheme(), host, port, path)
        }
        _ => trimmed.trim_end_matches('/').to_lowercase(),
    }
}

/// Validated, immutable set of catalog items.
#[derive(Debug)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    dimension: usize,
}

impl Catalog {
    /// Validates the items and freezes them into a catalog.
    ///
    /// Missing ids default to the item url. Fails with `CorruptCatalog` on an
    /// empty catalog, a missing embedding, inconsistent dimensions, a
    /// duplicate id or an item without test types.
    pub fn from_items(mut items: Vec<CatalogItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(ApiError::CorruptCatalog("catalog has no items".into()));
        }

        let mut seen = HashSet::with_capacity(items.len());
        let mut dimension = None;

        for (index, item) in items.iter_mut().enumerate() {
            if item.id.trim().is_empty() {
                item.id = item.url.clone();
            }
            if item.id.trim().is_empty() {
                return Err(ApiError::CorruptCatalog(format!(
                    "item #{} has neither id nor url",
                    index
                )));
            }

            if item.embedding.is_empty() {
                return Err(ApiError::CorruptCatalog(format!(
                    "item '{}' is missing an embedding",
                    item.id
                )));
            }

            match dimension {
                None => dimension = Some(item.embedding.len()),
                Some(d) if d != item.embedding.len() => {
                    return Err(ApiError::CorruptCatalog(format!(
                        "item '{}' has embedding dimension {}, expected {}",
                        item.id,
                        item.embedding.len(),
                        d
                    )));
                }
                Some(_) => {}
            }

            if item.test_type.is_empty() {
                return Err(ApiError::CorruptCatalog(format!(
                    "item '{}' has no test type",
                    item.id
                )));
            }

            if !seen.insert(normalize_id(&item.id)) {
                return Err(ApiError::CorruptCatalog(format!(
                    "duplicate item id '{}'",
                    item.id
                )));
            }
        }

        Ok(Self {
            items,
            dimension: dimension.unwrap_or_default(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ApiError::CorruptCatalog(format!("cannot read {}: {}", path.display(), e))
        })?;
        let items: Vec<CatalogItem> = serde_json::from_str(&raw).map_err(|e| {
            ApiError::CorruptCatalog(format!("cannot parse {}: {}", path.display(), e))
        })?;
        Self::from_items(items)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Embedding dimension shared by every item.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Holds the catalog loaded from disk. Readers get a shared snapshot; a
/// reload replaces the snapshot as a whole.
pub struct CatalogStore {
    path: PathBuf,
    current: RwLock<Option<Arc<Catalog>>>,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    /// Store that is already loaded with the given catalog.
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            path: PathBuf::new(),
            current: RwLock::new(Some(Arc::new(catalog))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the catalog file, then swaps it in. A failed load
    /// leaves the previous snapshot (if any) in place.
    pub fn load(&self) -> Result<Arc<Catalog>> {
        let catalog = Arc::new(Catalog::from_path(&self.path)?);

        match self.current.write() {
            Ok(mut guard) => *guard = Some(catalog.clone()),
            Err(poisoned) => {
                warn!("Catalog lock was poisoned, replacing snapshot anyway");
                *poisoned.into_inner() = Some(catalog.clone());
            }
        }

        info!(
            items = catalog.len(),
            dimension = catalog.dimension(),
            "Loaded catalog from {}",
            self.path.display()
        );
        Ok(catalog)
    }

    /// Current snapshot, or `NotLoaded` before the first successful load.
    pub fn all(&self) -> Result<Arc<Catalog>> {
        let guard = self
            .current
            .read()
            .map_err(|_| ApiError::InternalError("catalog lock poisoned".into()))?;
        guard.clone().ok_or(ApiError::NotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.all().is_ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Duration;
    use std::io::Write;

    pub(crate) fn item(id: &str, embedding: Vec<f32>) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            name: format!("Assessment {}", id),
            url: id.to_string(),
            description: String::new(),
            duration: Duration::Minutes(30),
            test_type: vec!["Knowledge & Skills".to_string()],
            adaptive_support: false,
            remote_support: true,
            embedding,
        }
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("https://x.com/a/"), normalize_id("https://x.com/a"));
        assert_eq!(normalize_id("https://X.COM/a"), normalize_id("https://x.com/a"));
        assert_eq!(
            normalize_id("HTTPS://x.com:443/A//?utm=1#top"),
            "https://x.com/a"
        );
        assert_ne!(normalize_id("https://x.com/a"), normalize_id("https://x.com/b"));
        assert_eq!(normalize_id("  Java-8/ "), "java-8");
    }

    #[test]
    fn test_from_items_defaults_id_to_url() {
        let mut it = item("https://x.com/a", vec![1.0, 0.0]);
        it.id.clear();
        let catalog = Catalog::from_items(vec![it]).unwrap();
        assert_eq!(catalog.items()[0].id, "https://x.com/a");
        assert_eq!(catalog.dimension(), 2);
    }

    #[test]
    fn test_corrupt_catalogs_are_rejected() {
        let cases = vec![
            vec![],
            vec![item("a", vec![])],
            vec![item("a", vec![1.0, 0.0]), item("b", vec![1.0])],
            vec![
                item("https://x.com/a/", vec![1.0]),
                item("https://X.com/a", vec![0.5]),
            ],
            {
                let mut it = item("a", vec![1.0]);
                it.test_type.clear();
                vec![it]
            },
        ];

        for items in cases {
            assert!(matches!(
                Catalog::from_items(items),
                Err(ApiError::CorruptCatalog(_))
            ));
        }
    }

    #[test]
    fn test_all_before_load_is_not_loaded() {
        let store = CatalogStore::new("does-not-matter.json");
        assert!(matches!(store.all(), Err(ApiError::NotLoaded)));
        assert!(!store.is_loaded());
    }

    #[test]
    fn test_load_from_file_and_failed_reload_keeps_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let items = vec![item("a", vec![1.0, 0.0]), item("b", vec![0.0, 1.0])];
        write!(file, "{}", serde_json::to_string(&items).unwrap()).unwrap();

        let store = CatalogStore::new(file.path());
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(store.all().unwrap().items()[1].id, "b");

        // Corrupt the file on disk; the old snapshot must survive.
        std::fs::write(file.path(), "[{\"name\": \"broken\"}]").unwrap();
        assert!(matches!(store.load(), Err(ApiError::CorruptCatalog(_))));
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_file_is_corrupt_catalog() {
        let store = CatalogStore::new("/nonexistent/catalog.json");
        assert!(matches!(store.load(), Err(ApiError::CorruptCatalog(_))));
    }
}
