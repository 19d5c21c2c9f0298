//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, without the background expiry sweep.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the HTTP surface (with
//! OpenAPI/Swagger UI). The workspace's main `lis-run` binary also runs the sample expiry sweep.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the LIS REST API server.
///
/// # Environment Variables
/// - `LIS_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `LIS_API_KEY`: When set, required in the `x-api-key` header of every `/api/v1` request
/// - plus the core variables read by [`api_rest::config_from_env`]
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the data directory cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("lis_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("LIS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("LIS_API_KEY").ok().filter(|k| !k.is_empty());

    let cfg = api_rest::config_from_env()?;
    tracing::info!(
        policy = ?cfg.transition_policy(),
        persistent = cfg.data_dir().is_some(),
        "-- Starting LIS REST API on {}",
        addr
    );
    let state = api_rest::build_state(cfg, api_key)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, api_rest::app(state)).await?;

    Ok(())
}
