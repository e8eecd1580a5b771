mod chart;
mod health;
mod metrics;
mod places;

pub use chart::chart_handler;
pub use health::{health_handler, root_handler};
pub use metrics::metrics_handler;
pub use places::place_handler;
