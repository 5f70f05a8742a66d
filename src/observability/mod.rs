// Observability: logging and metrics

pub mod logging;
pub mod metrics;
pub mod metrics_push;

pub use logging::init_logging;
