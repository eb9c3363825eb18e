use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("AFFDB_ENV", "development"))?;

    let log_level = or_default("AFFDB_LOG_LEVEL", "info");
    let sources_path = PathBuf::from(or_default("AFFDB_SOURCES_PATH", "./config/sources.yaml"));

    let db_max_connections = parse_u32("AFFDB_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_u32("AFFDB_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "AFFDB_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }
    let db_acquire_timeout_secs = parse_u64("AFFDB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let http_request_timeout_secs = parse_u64("AFFDB_HTTP_REQUEST_TIMEOUT_SECS", "30")?;
    let http_user_agent = or_default("AFFDB_HTTP_USER_AGENT", "affdb/0.1 (catalog-ingest)");
    let inter_request_delay_ms = parse_u64("AFFDB_INTER_REQUEST_DELAY_MS", "1000")?;
    let max_retries = parse_u32("AFFDB_MAX_RETRIES", "3")?;
    let retry_delay_ms = parse_u64("AFFDB_RETRY_DELAY_MS", "2000")?;
    let min_quality_score = parse_u32("AFFDB_MIN_QUALITY_SCORE", "3")?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        sources_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_request_timeout_secs,
        http_user_agent,
        inter_request_delay_ms,
        max_retries,
        retry_delay_ms,
        min_quality_score,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(ConfigError::InvalidEnvVar {
            var: "AFFDB_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
