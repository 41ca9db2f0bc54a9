//! Deployment configuration

use serde::{Deserialize, Serialize};
use sitebroker_core::{Error, Result, TenantConfig};
use sitebroker_egress::RetryConfig;
use sitebroker_observability::LoggingConfig;
use std::collections::HashSet;

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    5
}

fn default_preflight() -> bool {
    true
}

/// Everything SiteBroker reads at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Site used when a call names none; the first site when unset
    #[serde(default)]
    pub default_site: Option<String>,

    /// Default per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// In-flight calls allowed per site
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Queued calls allowed per site; unbounded when unset
    #[serde(default)]
    pub max_queue: Option<usize>,

    /// Probe each site's API at registration
    #[serde(default = "default_preflight")]
    pub preflight: bool,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub sites: Vec<TenantConfig>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_site: None,
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            max_queue: None,
            preflight: default_preflight(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
            sites: Vec::new(),
        }
    }
}

impl BrokerConfig {
    pub fn with_sites(sites: Vec<TenantConfig>) -> Self {
        Self {
            sites,
            ..Default::default()
        }
    }

    /// Id of the site that starts out active
    pub fn initial_site(&self) -> Option<&str> {
        self.default_site
            .as_deref()
            .or_else(|| self.sites.first().map(|s| s.id.as_str()))
    }

    /// Check the whole configuration, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.sites.is_empty() {
            problems.push("no sites configured".to_string());
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id.as_str()) {
                problems.push(format!("duplicate site id '{}'", site.id));
            }

            let url = site.url.trim();
            if url.is_empty() {
                problems.push(format!("site '{}' has no url", site.id));
            } else if !(url.starts_with("http://") || url.starts_with("https://")) {
                problems.push(format!(
                    "site '{}' url must start with http:// or https://, got '{}'",
                    site.id, url
                ));
            }
        }

        if let Some(default_site) = &self.default_site {
            if !self.sites.iter().any(|s| s.id.as_str() == default_site) {
                problems.push(format!("default_site '{}' is not a configured site", default_site));
            }
        }

        if self.max_concurrent == 0 {
            problems.push("max_concurrent must be at least 1".to_string());
        }
        if self.timeout_secs == 0 {
            problems.push("timeout_secs must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(problems.join("; ")))
        }
    }
}
