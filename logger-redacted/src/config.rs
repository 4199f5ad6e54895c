use serde::{Deserialize, Serialize};

/// Logging section of the configuration surface: `server.mode` selects the
/// formatter (JSON in production, compact/ANSI in development); `log_level`
/// feeds the `tracing_subscriber::EnvFilter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub log_level: String,
    pub json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
