use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Desktop Chrome user agent used when `SHOPSCOUT_USER_AGENT` is unset.
///
/// Several storefronts serve an empty listing shell to the default
/// `HeadlessChrome` agent.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but cannot be parsed.
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
/// Returns `ConfigError` if a variable is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
        }
    };

    let non_empty = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let env = parse_environment(&or_default("SHOPSCOUT_ENV", "development"))?;
    let log_level = or_default("SHOPSCOUT_LOG_LEVEL", "info");
    let sites_path = PathBuf::from(or_default("SHOPSCOUT_SITES_PATH", "./config/sites.yaml"));
    let browser_path = non_empty("SHOPSCOUT_BROWSER_PATH").map(PathBuf::from);
    let browser_headless = parse_bool("SHOPSCOUT_BROWSER_HEADLESS", "true")?;
    let user_agent = non_empty("SHOPSCOUT_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.into());

    let navigation_timeout_secs = parse_u64("SHOPSCOUT_NAVIGATION_TIMEOUT_SECS", "30")?;
    if navigation_timeout_secs == 0 {
        return Err(invalid(
            "SHOPSCOUT_NAVIGATION_TIMEOUT_SECS",
            "must be greater than zero".into(),
        ));
    }
    let settle_delay_ms = parse_u64("SHOPSCOUT_SETTLE_DELAY_MS", "2000")?;
    let politeness_delay_ms = parse_u64("SHOPSCOUT_POLITENESS_DELAY_MS", "1000")?;
    let max_concurrent_sites = parse_usize("SHOPSCOUT_MAX_CONCURRENT_SITES", "4")?.max(1);

    let relevance_url = non_empty("SHOPSCOUT_RELEVANCE_URL");
    let relevance_timeout_secs = parse_u64("SHOPSCOUT_RELEVANCE_TIMEOUT_SECS", "60")?;

    Ok(AppConfig {
        env,
        log_level,
        sites_path,
        browser_path,
        browser_headless,
        user_agent,
        navigation_timeout_secs,
        settle_delay_ms,
        politeness_delay_ms,
        max_concurrent_sites,
        relevance_url,
        relevance_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHOPSCOUT_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
