//! Shared application state
//!
//! One instance is built at startup and handed to every worker through
//! `web::Data`.

use canvas_core::{config::AppConfig, traits::ImageGenerator, traits::LedgerStore};
use canvas_services::{
    CatalogCache, CreditLedger, GenerationLifecycle, ReportService, RetryPolicy,
};
use std::sync::Arc;
use std::time::Duration;

/// Services the handlers work against
pub struct AppState<S: LedgerStore> {
    /// Backing store, used directly for health probes
    pub store: Arc<S>,
    /// Credit balance and history
    pub ledger: Arc<CreditLedger<S>>,
    /// Generation request orchestration
    pub lifecycle: Arc<GenerationLifecycle<S>>,
    /// Weekly report generation and lookup
    pub reports: Arc<ReportService<S>>,
    /// Catalog snapshot shared with the lifecycle
    pub catalog: Arc<CatalogCache>,
    /// Backend name reported by the health probe
    pub backend: &'static str,
}

impl<S: LedgerStore + 'static> AppState<S> {
    /// Wire every service over `store` using the application configuration
    pub fn from_config(
        store: Arc<S>,
        catalog: Arc<CatalogCache>,
        generator: Arc<dyn ImageGenerator>,
        config: &AppConfig,
        backend: &'static str,
    ) -> Self {
        let ledger = Arc::new(CreditLedger::new(
            store.clone(),
            RetryPolicy::from_config(&config.generation),
        ));

        let lifecycle = Arc::new(
            GenerationLifecycle::new(store.clone(), ledger.clone(), catalog.clone(), generator)
                .with_timeout(Duration::from_secs(config.generation.timeout_secs)),
        );

        let reports = Arc::new(ReportService::new(
            store.clone(),
            config.reports.thresholds,
        ));

        Self {
            store,
            ledger,
            lifecycle,
            reports,
            catalog,
            backend,
        }
    }
}
