//! Storefront - Main Application Entry Point
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database & Auth**: hosted platform over its REST APIs
//! - **Payments**: hosted checkout, confirmed by signed webhooks
//! - **Pages**: Tera templates, JSON for `/api/v1`
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Build HTTP clients for the hosted services and compile templates
//! 3. Build HTTP router with routes and middleware
//! 4. Start server on configured port

use storefront::{app_state::AppState, config::Config, routes::build_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(public_base_url = %config.public_base_url, "Configuration loaded");

    let port = config.server_port;
    let state = AppState::hosted(config)?;
    tracing::info!("Hosted service clients ready");

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
