//! Farm forms API server

use farm_forms_api::{app_router, seed, AppState, Config, PgFormStore};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables first so .env RUST_LOG is available to tracing
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| format!("Failed to connect to database: {}", e))?;

    seed::init_database(&pool).await?;

    let state = AppState::new(PgFormStore::new(pool));
    let app = app_router(state, &config.api_secret);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server running on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
