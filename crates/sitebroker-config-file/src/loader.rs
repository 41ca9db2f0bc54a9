//! Configuration sources
//!
//! Sources are tried in order: an explicit file, the `SITEBROKER_CONFIG`
//! path, inline JSON in `SITEBROKER_SITES`, then a single site described by
//! `WORDPRESS_SITE_URL` / `WORDPRESS_USERNAME` / `WORDPRESS_APP_PASSWORD`.
//! String values written as `$VAR` or `${VAR}` are replaced with the
//! environment variable's value before the configuration is validated.

use crate::broker_config::BrokerConfig;
use serde_json::Value;
use sitebroker_core::{Error, Result, TenantConfig, TenantId};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub const CONFIG_PATH_ENV: &str = "SITEBROKER_CONFIG";
pub const SITES_ENV: &str = "SITEBROKER_SITES";
pub const SITE_URL_ENV: &str = "WORDPRESS_SITE_URL";
pub const USERNAME_ENV: &str = "WORDPRESS_USERNAME";
pub const APP_PASSWORD_ENV: &str = "WORDPRESS_APP_PASSWORD";

/// Id given to the site built from the single-site environment variables
pub const SINGLE_SITE_ID: &str = "default";

/// Load, resolve and validate configuration from the first available source
pub fn load(explicit_path: Option<&Path>) -> Result<BrokerConfig> {
    if let Some(path) = explicit_path {
        return load_from_file(path);
    }

    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        return load_from_file(path);
    }

    if let Some(blob) = non_empty_env(SITES_ENV) {
        info!("Loading sites from {}", SITES_ENV);
        return from_json_blob(&blob);
    }

    if let Some(config) = from_single_site_env()? {
        info!("Loading single site from {}", SITE_URL_ENV);
        return Ok(config);
    }

    Err(Error::Config(format!(
        "No configuration found: pass --config, or set {}, {} or {}",
        CONFIG_PATH_ENV, SITES_ENV, SITE_URL_ENV
    )))
}

/// Load a YAML, TOML or JSON file, chosen by extension
pub fn load_from_file(path: impl AsRef<Path>) -> Result<BrokerConfig> {
    let path = expand_tilde(path.as_ref())?;

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        error!("Failed to read config file {:?}: {}", path, e);
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let value: Value = match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => {
            let toml_value: toml::Value = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
            serde_json::to_value(toml_value)
                .map_err(|e| Error::Config(format!("TOML conversion error: {}", e)))?
        }
        Some("json") => serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))?,
        _ => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid YAML: {}", e)))?,
    };

    debug!("Read config file {:?}", path);
    from_value(value)
}

/// Inline JSON: either a whole configuration object or just the sites list
pub fn from_json_blob(blob: &str) -> Result<BrokerConfig> {
    let value: Value = serde_json::from_str(blob)
        .map_err(|e| Error::Config(format!("Invalid sites JSON: {}", e)))?;

    let value = match value {
        Value::Array(sites) => serde_json::json!({ "sites": sites }),
        other => other,
    };
    from_value(value)
}

/// A one-site configuration from the WordPress environment variables, if set
pub fn from_single_site_env() -> Result<Option<BrokerConfig>> {
    let Some(url) = non_empty_env(SITE_URL_ENV) else {
        return Ok(None);
    };

    let username = non_empty_env(USERNAME_ENV).unwrap_or_default();
    let app_password = non_empty_env(APP_PASSWORD_ENV).unwrap_or_default();
    if username.is_empty() || app_password.is_empty() {
        return Err(Error::Config(format!(
            "{} is set but {} or {} is missing",
            SITE_URL_ENV, USERNAME_ENV, APP_PASSWORD_ENV
        )));
    }

    let site = TenantConfig::new(
        TenantId::from_string(SINGLE_SITE_ID)?,
        url,
        username,
        app_password,
    );
    let config = BrokerConfig::with_sites(vec![site]);
    config.validate()?;
    Ok(Some(config))
}

fn from_value(mut value: Value) -> Result<BrokerConfig> {
    resolve_env_refs(&mut value)?;

    let config: BrokerConfig = serde_json::from_value(value)
        .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Replace every `$VAR` / `${VAR}` string in the tree, reporting all unset variables
pub fn resolve_env_refs(value: &mut Value) -> Result<()> {
    let mut missing = Vec::new();
    resolve_in_place(value, &mut missing);

    if missing.is_empty() {
        Ok(())
    } else {
        missing.sort();
        missing.dedup();
        Err(Error::Config(format!(
            "Environment variable not found: {}",
            missing.join(", ")
        )))
    }
}

fn resolve_in_place(value: &mut Value, missing: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if let Some(var_name) = env_ref(s) {
                match std::env::var(var_name) {
                    Ok(resolved) => *s = resolved,
                    Err(_) => missing.push(var_name.to_string()),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| resolve_in_place(v, missing)),
        Value::Object(map) => map.values_mut().for_each(|v| resolve_in_place(v, missing)),
        _ => {}
    }
}

/// Variable name referenced by `$VAR` or `${VAR}`; `None` for literal strings
fn env_ref(value: &str) -> Option<&str> {
    let var_name = value.trim().strip_prefix('$')?;
    let var_name = var_name
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(var_name);

    let valid = !var_name.is_empty()
        && var_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(var_name)
}

fn expand_tilde(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => Ok(dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?
            .join(rest)),
        Err(_) => Ok(path.to_path_buf()),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
