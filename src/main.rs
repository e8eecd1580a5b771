use clap::Parser;
use mapa_astral_gateway::chart::SwissEphemeris;
use mapa_astral_gateway::config::Args;
use mapa_astral_gateway::{
    app_router, build_cache_backend, build_geocoder, build_state, init_tracing, shutdown_signal,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so clap sees its values as environment
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args);

    let backend = build_cache_backend(&args)?;
    let geocoder = build_geocoder(&args)?;
    let (state, workers) = build_state(&args, backend, geocoder, Arc::new(SwissEphemeris::new()));
    let app = app_router(state, &args);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(name = %args.app_name, version = %args.app_version, "listening on {}", addr);
    tracing::info!(
        rate_limit = args.rate_limit.max_requests,
        window_secs = args.rate_limit.window.as_secs(),
        workers = args.chart_workers,
        "chart endpoint limits"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal()?)
    .await?;

    // Router (and with it the pool handle and Redis pool) is gone by now,
    // so the workers drain what is queued and exit.
    let drain = async {
        for worker in workers {
            let _ = worker.await;
        }
    };
    if tokio::time::timeout(WORKER_DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("chart workers still busy, exiting anyway");
    }
    tracing::info!("shutdown complete");
    Ok(())
}
