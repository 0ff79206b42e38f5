//! Process-wide catalog snapshot
//!
//! Loaded once at startup and shared by every request. Readers get an
//! `Arc<Catalog>` and never observe a partially refreshed catalog.

use canvas_core::{traits::CatalogSource, AppResult, Catalog};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Immutable catalog behind an explicit refresh
pub struct CatalogCache {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogCache {
    /// Wrap an already loaded catalog
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Load the catalog from `source`
    #[instrument(skip(source))]
    pub async fn load<C: CatalogSource + ?Sized>(source: &C) -> AppResult<Self> {
        let catalog = source.load_catalog().await?;
        if catalog.is_empty() {
            warn!("Catalog is empty, every generation request will be rejected");
        }
        Ok(Self::new(catalog))
    }

    /// Snapshot in use right now
    pub fn current(&self) -> Arc<Catalog> {
        self.current.read().clone()
    }

    /// Reload from `source` and swap the snapshot
    ///
    /// Requests already holding the old snapshot finish with it.
    #[instrument(skip(self, source))]
    pub async fn refresh<C: CatalogSource + ?Sized>(&self, source: &C) -> AppResult<Arc<Catalog>> {
        let fresh = Arc::new(source.load_catalog().await?);
        *self.current.write() = fresh.clone();
        info!(
            styles = fresh.styles.len(),
            colors = fresh.colors.len(),
            sizes = fresh.sizes.len(),
            "Catalog refreshed"
        );
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_db::MemoryStore;

    #[tokio::test]
    async fn test_load_from_store() {
        let store = MemoryStore::new();
        let cache = CatalogCache::load(&store).await.unwrap();
        assert_eq!(cache.current().cost_for("1024x1792"), Some(4));
    }

    #[tokio::test]
    async fn test_refresh_swaps_snapshot() {
        let cache = CatalogCache::new(Catalog::default());
        let before = cache.current();

        let store = MemoryStore::new().with_catalog(Catalog::new(
            ["anime"],
            ["neon"],
            [("256x256", 1)],
        ));
        cache.refresh(&store).await.unwrap();

        assert_eq!(before.cost_for("512x512"), Some(1));
        assert_eq!(cache.current().cost_for("512x512"), None);
        assert_eq!(cache.current().cost_for("256x256"), Some(1));
    }
}
