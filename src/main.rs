use chrono::Utc;
use lis_core::{EntityId, LabServices};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the LIS application
///
/// Runs two tasks concurrently and stops when either ends:
/// - the REST server (with Swagger UI) on port 3000 (configurable via LIS_REST_ADDR)
/// - the sample expiry sweep, which expires overdue samples on a fixed interval
///
/// # Environment Variables
/// - `LIS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `LIS_API_KEY`: When set, required in the `x-api-key` header of every `/api/v1` request
/// - `LIS_EXPIRY_SWEEP_SECS`: Seconds between expiry sweeps (default: 300)
/// - `LIS_DATA_DIR`, `LIS_TRANSITION_POLICY`, `LIS_SAMPLE_EXPIRY_DAYS`: core configuration
///
/// # Returns
/// * `Ok(())` - If the server shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lis_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("lis_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("LIS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("LIS_API_KEY").ok().filter(|k| !k.is_empty());
    let sweep_every = Duration::from_secs(
        std::env::var("LIS_EXPIRY_SWEEP_SECS")
            .ok()
            .map(|v| v.trim().parse::<u64>())
            .transpose()?
            .filter(|secs| *secs > 0)
            .unwrap_or(300),
    );

    let cfg = api_rest::config_from_env()?;
    tracing::info!(
        policy = ?cfg.transition_policy(),
        persistent = cfg.data_dir().is_some(),
        "++ Starting LIS REST on {}",
        rest_addr
    );
    tracing::info!("++ Expiry sweep every {:?}", sweep_every);

    let state = api_rest::build_state(cfg, api_key)?;
    let sweep = tokio::spawn(expiry_sweep(state.services().clone(), sweep_every));

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let rest_server = axum::serve(listener, api_rest::app(state)).into_future();

    tokio::select! {
        served = rest_server => served.map_err(anyhow::Error::from),
        swept = sweep => swept.map_err(anyhow::Error::from),
    }
}

/// Expires overdue samples every `period`, recording the system identity as actor.
///
/// A failed sweep is logged and retried on the next tick.
async fn expiry_sweep(services: LabServices, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let samples = services.samples.clone();
        let swept = tokio::task::spawn_blocking(move || {
            samples.expire_overdue_samples(Utc::now(), EntityId::system())
        })
        .await;
        match swept {
            Ok(Ok(expired)) if !expired.is_empty() => {
                tracing::info!(count = expired.len(), "expiry sweep finished");
            }
            Ok(Ok(_)) => tracing::debug!("expiry sweep found nothing overdue"),
            Ok(Err(e)) => tracing::error!("expiry sweep failed: {}", e),
            Err(e) => tracing::error!("expiry sweep task panicked: {}", e),
        }
    }
}
