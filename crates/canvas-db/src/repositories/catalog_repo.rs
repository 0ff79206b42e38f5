//! Catalog source backed by the `styles`, `colors` and `sizes` tables

use super::{db_error, PgStore};
use canvas_core::{traits::CatalogSource, AppResult, Catalog};
use async_trait::async_trait;
use tracing::{info, instrument};

#[async_trait]
impl CatalogSource for PgStore {
    #[instrument(skip(self))]
    async fn load_catalog(&self) -> AppResult<Catalog> {
        let styles: Vec<(String,)> = sqlx::query_as("SELECT id FROM styles")
            .fetch_all(self.pool())
            .await
            .map_err(|e| db_error("Failed to load styles", e))?;

        let colors: Vec<(String,)> = sqlx::query_as("SELECT id FROM colors")
            .fetch_all(self.pool())
            .await
            .map_err(|e| db_error("Failed to load colors", e))?;

        let sizes: Vec<(String, i64)> = sqlx::query_as("SELECT id, cost FROM sizes")
            .fetch_all(self.pool())
            .await
            .map_err(|e| db_error("Failed to load sizes", e))?;

        let catalog = Catalog::new(
            styles.into_iter().map(|(id,)| id),
            colors.into_iter().map(|(id,)| id),
            sizes,
        );

        info!(
            "Loaded catalog: {} styles, {} colors, {} sizes",
            catalog.styles.len(),
            catalog.colors.len(),
            catalog.sizes.len()
        );

        Ok(catalog)
    }
}
