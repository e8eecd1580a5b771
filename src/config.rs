use clap::{Parser, ValueEnum};
use std::time::Duration;
use thiserror::Error;

// CLI argument structure, every flag can also come from the environment / .env
#[derive(Parser, Debug, Clone)]
#[command(name = "mapa-astral-gateway")]
#[command(about = "Birth chart API with cached geocoding")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "APP_NAME", default_value = "API Mapa Astral")]
    pub app_name: String,

    #[arg(long, env = "APP_VERSION", default_value = "1.0.0")]
    pub app_version: String,

    // Raises the default log level to debug
    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,

    // "text" or "json"
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[arg(long, env = "GEONAMES_USERNAME", default_value = "")]
    pub geonames_username: String,

    #[arg(long, env = "GEONAMES_BASE_URL", default_value = "http://api.geonames.org")]
    pub geonames_base_url: String,

    #[arg(long, env = "CACHE_BACKEND", value_enum, default_value_t = CacheBackendKind::Redis)]
    pub cache_backend: CacheBackendKind,

    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    pub redis_host: String,

    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,

    #[arg(long, env = "REDIS_DB", default_value_t = 0)]
    pub redis_db: u32,

    #[arg(long, env = "REDIS_MAX_CONNECTIONS", default_value_t = 20)]
    pub redis_max_connections: u32,

    // Max wait for a Redis connection before the call counts as a miss
    #[arg(long, env = "REDIS_CONNECT_TIMEOUT_MS", default_value_t = 1000)]
    pub redis_connect_timeout_ms: u64,

    // Coordinates TTL in seconds (30 days)
    #[arg(long, env = "CACHE_LOCALIDADE_TTL", default_value_t = 2_592_000)]
    pub cache_localidade_ttl: u64,

    // Chart TTL in seconds (7 days)
    #[arg(long, env = "CACHE_MAPA_TTL", default_value_t = 604_800)]
    pub cache_mapa_ttl: u64,

    // Comma-separated origins, "*" allows any
    #[arg(
        long,
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://localhost:8000"
    )]
    pub cors_origins: Vec<String>,

    // Rate limit on the chart endpoint, e.g. "10/minute"
    #[arg(long, env = "RATE_LIMIT", default_value = "10/minute", value_parser = parse_rate_limit)]
    pub rate_limit: RateLimit,

    // Number of chart workers
    #[arg(long, env = "CHART_WORKERS", default_value_t = 4)]
    pub chart_workers: usize,

    // Pending chart jobs before submitters start waiting
    #[arg(long, env = "CHART_QUEUE", default_value_t = 64)]
    pub chart_queue: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

impl Args {
    pub fn redis_url(&self) -> String {
        format!(
            "redis://{}:{}/{}",
            self.redis_host, self.redis_port, self.redis_db
        )
    }

    pub fn redis_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_connect_timeout_ms)
    }

    pub fn localidade_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_localidade_ttl)
    }

    pub fn mapa_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_mapa_ttl)
    }
}

/// Max requests allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitParseError {
    #[error("expected <count>/<period>, got '{0}'")]
    Format(String),
    #[error("invalid request count '{0}'")]
    Count(String),
    #[error("unknown period '{0}', use second, minute, hour or day")]
    Period(String),
}

/// Parses expressions like `10/minute`, `100/hour` or `5/second`.
pub fn parse_rate_limit(expr: &str) -> Result<RateLimit, RateLimitParseError> {
    let (count, period) = expr
        .split_once('/')
        .ok_or_else(|| RateLimitParseError::Format(expr.to_string()))?;

    let max_requests: u32 = count
        .trim()
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| RateLimitParseError::Count(count.to_string()))?;

    let secs = match period.trim().to_ascii_lowercase().as_str() {
        "second" | "seconds" | "s" => 1,
        "minute" | "minutes" | "m" => 60,
        "hour" | "hours" | "h" => 3_600,
        "day" | "days" | "d" => 86_400,
        other => return Err(RateLimitParseError::Period(other.to_string())),
    };

    Ok(RateLimit {
        max_requests,
        window: Duration::from_secs(secs),
    })
}
