//! Configuration loading for SiteBroker deployments
//!
//! A deployment is described by one `BrokerConfig`: the site list with each
//! site's credentials, plus dispatch settings shared by every site.
//!
//! # Features
//! - YAML, TOML or JSON files (chosen by extension, `~` expanded)
//! - Inline JSON from `SITEBROKER_SITES`
//! - Single-site fallback from the `WORDPRESS_*` variables
//! - `$VAR` / `${VAR}` references resolved from the environment
//! - Validation that reports every problem at once
//!
//! # Example
//! ```no_run
//! # fn example() -> sitebroker_core::Result<()> {
//! let config = sitebroker_config_file::load_from_file("~/.sitebroker/sites.yaml")?;
//! println!("{} sites", config.sites.len());
//! # Ok(())
//! # }
//! ```

mod broker_config;
mod loader;

pub use broker_config::BrokerConfig;
pub use loader::{
    APP_PASSWORD_ENV, CONFIG_PATH_ENV, SINGLE_SITE_ID, SITE_URL_ENV, SITES_ENV, USERNAME_ENV,
    from_json_blob, from_single_site_env, load, load_from_file, resolve_env_refs,
};
