//! Movie Catalog Service
//!
//! Port: 8000 (`CATALOG_SERVICE_PORT`)

use actix_web::{middleware::Logger, web, App, HttpServer};
use movie_catalog_core::{init_logging, LogConfig};
use movie_catalog_service::{configure_routes, AppState, CatalogConfig};
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = CatalogConfig::load()?;

    init_logging(&LogConfig {
        service_name: "catalog-service".to_string(),
        level: config.service.log_level.clone(),
        format: config.service.log_format,
    })?;

    let bind_addr = format!("{}:{}", config.service.host, config.service.port);
    info!("Starting Catalog Service on {}", bind_addr);

    // Initialize service components
    let catalog = movie_catalog_service::init_service(&config).await?;

    let app_state = web::Data::new(AppState {
        catalog,
        auth_token: config.service.auth_token.clone(),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(configure_routes)
            .wrap(Logger::default())
    })
    .workers(config.service.workers)
    .client_request_timeout(config.service.request_timeout)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
