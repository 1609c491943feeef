use std::sync::Arc;

use anyhow::Result;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use marketplace_orderservice::{
    api::HttpCatalog,
    app_state::AppState,
    bootstrap,
    config::Config,
    db,
    repository::PgOrderRepository,
    routes,
    services::orders::OrderService,
    swagger,
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();
    bootstrap::init_tracing();

    let config = Config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    let pool = db::create_pool(&config.database).await?;
    let catalog = HttpCatalog::new(reqwest::Client::new(), &config.api.catalog_service_url);
    let service = OrderService::new(
        Arc::new(PgOrderRepository::new(pool)),
        Arc::new(catalog),
    );
    let state = AppState::new(service, &config.auth);

    let (router, mut openapi) = routes::orders::routes_with_openapi(&state).split_for_parts();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("Marketplace OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let app = router.merge(swagger_ui).with_state(state);

    tracing::info!("Bootstrapping...");
    bootstrap::serve("OrderService", app, &config.server).await
}
