//! Shared HTTP client utilities

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use sitebroker_core::service::AuthScheme;
use sitebroker_core::{Error, Result};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Default per-request timeout in seconds, used when a call sets none
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 8,
            user_agent: format!("SiteBroker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build the `Authorization` header value for a scheme.
///
/// The value is marked sensitive so it never shows up in reqwest debug output.
pub fn auth_header(auth: &AuthScheme) -> Result<HeaderValue> {
    let raw = match auth {
        AuthScheme::Basic { username, password } => {
            format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
        }
        AuthScheme::Bearer(token) => format!("Bearer {}", token),
    };

    let mut value = HeaderValue::from_str(&raw)
        .map_err(|_| Error::Config("Credential contains characters not allowed in a header".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Create a configured HTTP client that sends `auth` on every request
pub fn create_client(config: &HttpClientConfig, auth: &AuthScheme) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth_header(auth)?);

    ClientBuilder::new()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        // Expire idle connections before upstream servers close them
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(&config.user_agent)
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}
