use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use style_feed_service::config::{Config, LogFormat};
use style_feed_service::handlers::{configure, AppState};
use style_feed_service::{build_index, load_catalog, ProfileStore, RecommenderEngine};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration before logging so the log format can be honored
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(config.app.log_format);

    tracing::info!(
        "Starting style-feed-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Environment: {}", config.app.env);

    // The service must not start without products
    let catalog = load_catalog(&config.catalog)
        .map(Arc::new)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load catalog");
            e
        })
        .context("Failed to load catalog")?;

    let index = build_index(Arc::clone(&catalog), &config.engine);
    tracing::info!(
        products = catalog.len(),
        dim = catalog.dim(),
        index = index.name(),
        exact = index.is_exact(),
        "Catalog ready"
    );

    let engine = Arc::new(RecommenderEngine::new(
        catalog,
        index,
        Arc::new(ProfileStore::new()),
        &config.engine,
    ));
    let state = web::Data::new(AppState { engine });

    let bind_addr = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("HTTP server listening on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await
    .context("HTTP server error")
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info".into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_thread_names(true)
                    .with_target(true),
            )
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}
