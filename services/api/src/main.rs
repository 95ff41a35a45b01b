use anyhow::Result;
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use common::token::TokenVerifier;
use tracing::info;

mod config;
mod error;
mod middleware;
mod models;
mod repositories;
mod routes;
mod services;
mod state;

use crate::{config::AppConfig, repositories::PgStore, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    common::telemetry::init_tracing("api=debug,common=info,tower_http=info");

    info!("Starting API service");
    let config = AppConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    let verifier = TokenVerifier::new(&config.jwt());
    let app_state = AppState::new(PgStore::new(pool), verifier, config.default_page_size);

    // Start the web server
    let app = routes::create_router(app_state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
