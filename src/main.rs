//! Canvas Billing Server
//!
//! Credit ledger, generation request lifecycle and weekly usage reports for
//! the simulated image generation service.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use canvas_api::AppState;
use canvas_core::{traits::LedgerStore, AppConfig};
use canvas_db::{create_pool, run_migrations, MemoryStore, PgStore};
use canvas_services::{CatalogCache, SimulatedGenerator, WeeklySchedule};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "canvas_billing={0},canvas_api={0},canvas_services={0},canvas_db={0},canvas_core={0},actix_web=info,sqlx=warn",
            log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Canvas Billing v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if config.database.url.is_none() {
        config.database.url = env::var("DATABASE_URL").ok();
    }

    if config.uses_database() {
        info!("Connecting to database...");
        let pool = create_pool(&config.database)
            .await
            .context("Failed to create database pool")?;

        if config.database.run_migrations {
            run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
        }

        info!(
            "Database connection established with {} max connections",
            config.database.max_connections
        );

        serve(Arc::new(PgStore::new(pool)), config, "postgres").await
    } else {
        warn!("No database configured, using the in-memory backend");
        let store = MemoryStore::seeded(config.memory.seed_users.clone()).await;
        serve(Arc::new(store), config, "memory").await
    }
}

/// Wire the services over `store` and run the HTTP server and scheduler
async fn serve<S: LedgerStore>(
    store: Arc<S>,
    config: AppConfig,
    backend: &'static str,
) -> anyhow::Result<()> {
    let catalog = CatalogCache::load(store.as_ref())
        .await
        .context("Failed to load catalog")?;

    let generator = Arc::new(SimulatedGenerator::new(config.generation.failure_rate));
    info!(
        failure_rate = generator.failure_rate(),
        "Simulated image generator ready"
    );

    let state = web::Data::new(AppState::from_config(
        store,
        Arc::new(catalog),
        generator,
        &config,
        backend,
    ));

    if config.reports.schedule_enabled {
        tokio::spawn(WeeklySchedule::default().run(state.reports.clone()));
    } else {
        info!("Weekly report schedule disabled");
    }

    let bind_addr = config.server_addr();
    info!(
        "Starting HTTP server on {} with {} workers ({} backend)",
        bind_addr, config.server.workers, backend
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(canvas_api::configure::<S>)
            // Root redirect to health
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(config.server.workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
