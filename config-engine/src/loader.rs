//! Builds the layered `config::Config` source chain and deserializes +
//! validates the result into [`AppConfig`]. Invalid configuration aborts
//! startup before any listener binds; this function is the only place that
//! should be called for that, from the binary's `main`.
use crate::app_config::AppConfig;
use crate::error::{ConfigError, ConfigResult};
use config::{Config, Environment, File};
use validator::Validate;

/// `base_path` points at a directory containing `default.{yaml,toml,json}`
/// and `<environment>.{yaml,toml,json}`; `environment` is typically read
/// from `POLYKEY_ENV` by the caller before this is invoked.
pub fn load_config(base_path: &str, environment: &str) -> ConfigResult<AppConfig> {
    dotenvy::dotenv().ok();

    let builder = Config::builder()
        .add_source(File::with_name(&format!("{base_path}/default")).required(false))
        .add_source(File::with_name(&format!("{base_path}/{environment}")).required(false))
        .add_source(
            Environment::with_prefix("POLYKEY")
                .separator("__")
                .try_parsing(true),
        );

    let raw = builder.build()?;
    let parsed: AppConfig = raw.try_deserialize()?;
    parsed
        .validate()
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    Ok(parsed)
}
