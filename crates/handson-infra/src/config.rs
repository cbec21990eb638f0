//! Configuration loader for Hands On AI.
//!
//! Reads `handson.toml` from the data directory (`~/.handson/` by default) or
//! an explicit path, then applies `HANDSON_*` environment overrides.

use std::path::{Path, PathBuf};

use handson_types::config::GlobalConfig;
use handson_types::error::ConfigError;

/// File name looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "handson.toml";

const ENV_PREFIX: &str = "HANDSON_";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `HANDSON_DATA_DIR` environment variable
/// 2. `~/.handson`
/// 3. `.handson` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HANDSON_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".handson");
    }

    PathBuf::from(".handson")
}

/// Load `.env` from the working directory (or a parent), if there is one.
///
/// Returns the path that was loaded.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(err) if err.not_found() => None,
        Err(err) => {
            tracing::warn!("Failed to load .env: {err}");
            None
        }
    }
}

/// Load configuration and apply environment overrides.
///
/// - `path` given: the file must exist and parse.
/// - No `path`: `{data_dir}/handson.toml`, with defaults when it is missing.
pub async fn load_config(path: Option<&Path>, data_dir: &Path) -> Result<GlobalConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path).await?,
        None => {
            let default_path = data_dir.join(CONFIG_FILE_NAME);
            if tokio::fs::try_exists(&default_path).await.unwrap_or(false) {
                read_config_file(&default_path).await?
            } else {
                tracing::debug!(
                    "No {CONFIG_FILE_NAME} found at {}, using defaults",
                    default_path.display()
                );
                GlobalConfig::default()
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

async fn read_config_file(path: &Path) -> Result<GlobalConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    let config = toml::from_str::<GlobalConfig>(&content).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    tracing::debug!(
        providers = config.providers.len(),
        "Loaded configuration from {}",
        path.display()
    );
    Ok(config)
}

/// Apply `HANDSON_*` overrides on top of file values.
///
/// `lookup` returns the value of an environment variable; unset keys leave
/// the config untouched.
pub fn apply_env_overrides<F>(config: &mut GlobalConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| {
        let key = format!("{ENV_PREFIX}{name}");
        lookup(&key).map(|value| (key, value.trim().to_string()))
    };
    let dispatch = &mut config.dispatch;

    if let Some((_, value)) = get("ENABLED_PROVIDERS") {
        dispatch.enabled_providers = value
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some((key, value)) = get("PARALLEL_EXECUTION") {
        dispatch.parallel_execution = parse_bool(&key, &value)?;
    }
    if let Some((key, value)) = get("USE_ROUND_ROBIN") {
        dispatch.use_round_robin = parse_bool(&key, &value)?;
    }
    if let Some((key, value)) = get("MAX_REQUESTS_PER_DAY") {
        dispatch.max_requests_per_day = parse_value(&key, &value)?;
    }
    if let Some((key, value)) = get("MAX_TOKENS_PER_DAY") {
        dispatch.max_tokens_per_day = parse_value(&key, &value)?;
    }
    if let Some((key, value)) = get("MAX_COST_PER_DAY_USD") {
        dispatch.max_cost_per_day_usd = parse_value(&key, &value)?;
    }
    if let Some((_, value)) = get("BOARD_EVALUATOR_PROVIDER") {
        dispatch.board_evaluator_provider = (!value.is_empty()).then_some(value);
    }
    if let Some((_, value)) = get("BOARD_EVALUATOR_MODEL") {
        dispatch.board_evaluator_model = (!value.is_empty()).then_some(value);
    }
    if let Some((key, value)) = get("REQUEST_TIMEOUT_SECS") {
        dispatch.request_timeout_secs = parse_value(&key, &value)?;
    }
    if let Some((key, value)) = get("DEFAULT_MAX_TOKENS") {
        dispatch.default_max_tokens = parse_value(&key, &value)?;
    }
    if let Some((key, value)) = get("DEFAULT_TEMPERATURE") {
        dispatch.default_temperature = if value.is_empty() {
            None
        } else {
            Some(parse_value(&key, &value)?)
        };
    }

    Ok(())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
