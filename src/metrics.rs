use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: CounterVec = register_counter_vec!(
        "mapa_astral_requests_total",
        "Total number of API requests",
        &["endpoint"]
    )
    .unwrap();
    pub static ref CACHE_HITS: CounterVec = register_counter_vec!(
        "mapa_astral_cache_hits_total",
        "Total cache hits",
        &["kind"]
    )
    .unwrap();
    pub static ref CACHE_MISSES: CounterVec = register_counter_vec!(
        "mapa_astral_cache_misses_total",
        "Total cache misses",
        &["kind"]
    )
    .unwrap();
    pub static ref CACHE_ERRORS: Counter = register_counter!(
        "mapa_astral_cache_errors_total",
        "Cache operations that failed and were skipped"
    )
    .unwrap();
    pub static ref GEOCODER_CALLS: CounterVec = register_counter_vec!(
        "mapa_astral_geocoder_calls_total",
        "Outbound geocoding calls by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref RATE_LIMITED: Counter = register_counter!(
        "mapa_astral_rate_limited_total",
        "Requests rejected by the rate limiter"
    )
    .unwrap();
    pub static ref CHART_COMPUTE_SECONDS: Histogram = register_histogram!(
        "mapa_astral_chart_compute_seconds",
        "Chart computation time in seconds"
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "mapa_astral_request_latency_seconds",
        "Chart request latency in seconds"
    )
    .unwrap();
}

// Prometheus text exposition of the default registry
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
