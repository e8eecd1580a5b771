pub mod cache;
pub mod chart;
pub mod config;
pub mod error;
pub mod geocoding;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod worker;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::{
    compression::{CompressionLayer, predicate::SizeAbove},
    cors::{AllowHeaders, AllowMethods, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cache::{CacheBackend, CacheStore, MemoryBackend, RedisBackend, build_redis_pool};
use crate::chart::{ChartEngine, ChartGenerator};
use crate::config::{Args, CacheBackendKind};
use crate::geocoding::{GeoNamesClient, Geocoder};
use crate::handlers::{chart_handler, health_handler, metrics_handler, place_handler, root_handler};
use crate::rate_limit::{RateLimiter, rate_limit_middleware};
use crate::state::AppState;
use crate::worker::ChartWorkerPool;

// Responses smaller than this go out uncompressed
const COMPRESSION_MIN_BYTES: u16 = 1000;

pub fn init_tracing(args: &Args) {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if args.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Cache backend selected by configuration. The Redis pool is created here,
/// once per process, and lives as long as the returned backend.
pub fn build_cache_backend(args: &Args) -> anyhow::Result<Arc<dyn CacheBackend>> {
    Ok(match args.cache_backend {
        CacheBackendKind::Redis => {
            let pool = build_redis_pool(
                &args.redis_url(),
                args.redis_max_connections,
                args.redis_connect_timeout(),
            )?;
            tracing::info!(
                host = %args.redis_host,
                port = args.redis_port,
                db = args.redis_db,
                max_connections = args.redis_max_connections,
                "redis cache pool created"
            );
            Arc::new(RedisBackend::new(pool))
        }
        CacheBackendKind::Memory => {
            tracing::info!("using in-process cache");
            Arc::new(MemoryBackend::new())
        }
    })
}

/// Wires the shared state from its collaborators. Must run inside a tokio
/// runtime since it starts the chart workers.
pub fn build_state(
    args: &Args,
    backend: Arc<dyn CacheBackend>,
    geocoder: Arc<dyn Geocoder>,
    engine: Arc<dyn ChartEngine>,
) -> (Arc<AppState>, Vec<JoinHandle<()>>) {
    let (charts, workers) = ChartWorkerPool::start(
        ChartGenerator::new(engine),
        args.chart_workers,
        args.chart_queue,
    );

    let state = Arc::new(AppState {
        app_name: args.app_name.clone(),
        app_version: args.app_version.clone(),
        cache: CacheStore::new(backend, args.localidade_ttl(), args.mapa_ttl()),
        geocoder,
        charts,
        rate_limiter: RateLimiter::new(args.rate_limit),
    });
    (state, workers)
}

/// Resolves on Ctrl-C or SIGTERM. The SIGTERM handler is installed before
/// this returns, so a signal sent right after the call is not lost.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            terminate.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }
        tracing::info!("shutdown signal received");
    })
}

pub fn build_geocoder(args: &Args) -> anyhow::Result<Arc<dyn Geocoder>> {
    if args.geonames_username.is_empty() {
        tracing::warn!("GEONAMES_USERNAME is empty, place lookups will fail");
    }
    let client = GeoNamesClient::new(&args.geonames_base_url, &args.geonames_username)?;
    Ok(Arc::new(client))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn app_router(state: Arc<AppState>, args: &Args) -> Router {
    let api = Router::new()
        .route(
            "/mapa-astral",
            post(chart_handler).layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            )),
        )
        .route("/localidades/{*place}", get(place_handler));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(CompressionLayer::new().compress_when(SizeAbove::new(COMPRESSION_MIN_BYTES)))
        .layer(cors_layer(&args.cors_origins))
        .layer(TraceLayer::new_for_http())
}
