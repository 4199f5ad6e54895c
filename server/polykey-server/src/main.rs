use clap::Parser;

/// Polykey key-management gRPC server.
#[derive(Debug, Parser)]
#[command(name = "polykey-server", version, about)]
struct Cli {
    /// Directory containing `default.{yaml,toml,json}` and
    /// `<environment>.{yaml,toml,json}` configuration files.
    #[arg(long, env = "POLYKEY_CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Selects the environment-specific override file and, via
    /// `server.mode`, the logging format.
    #[arg(long, env = "POLYKEY_ENV", default_value = "development")]
    environment: String,

    /// Overrides `server.port` from the loaded configuration.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config_engine::load_config(&cli.config_dir, &cli.environment)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let logger_config = logger_redacted::LoggerConfig {
        log_level: std::env::var("POLYKEY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        json: matches!(config.server.mode, config_engine::ServerMode::Production),
    };
    logger_redacted::init_tracing(&logger_config);

    tracing::info!(port = config.server.port, mode = ?config.server.mode, "configuration loaded");

    let bootstrapped = polykey_server::bootstrap(&config).await?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };

    polykey_server::run(addr, bootstrapped, shutdown).await
}
