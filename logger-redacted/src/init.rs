//! `tracing-subscriber` wiring, selected by `server.mode` the way
//! `config-engine`'s `AppConfig` resolves it.
use crate::config::LoggerConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber. Call once, at process
/// bootstrap, before any listener binds.
pub fn init_tracing(config: &LoggerConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .init();
    }
}
