use std::sync::Arc;

use crate::cache::CacheStore;
use crate::geocoding::Geocoder;
use crate::rate_limit::RateLimiter;
use crate::worker::ChartWorkerPool;

// app's shared state
pub struct AppState {
    pub app_name: String,
    pub app_version: String,
    pub cache: CacheStore,
    pub geocoder: Arc<dyn Geocoder>,
    pub charts: ChartWorkerPool,
    pub rate_limiter: RateLimiter, // chart endpoint only
}
