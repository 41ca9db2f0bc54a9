//! Authenticated connections to tenant backends
//!
//! A `Connection` binds a base URL and a credential for one (tenant, service)
//! pair. Credentials travel as the client's default `Authorization` header,
//! so every request built from the connection is authenticated.

use crate::client::{HttpClientConfig, create_client};
use reqwest::{Client, Method, RequestBuilder};
use sitebroker_core::service::{AuthScheme, ServiceCredential, ServiceKind};
use sitebroker_core::{Error, Result, TenantConfig, TenantId};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Connection {
    tenant_id: TenantId,
    service: ServiceKind,
    base_url: String,
    default_timeout: Duration,
    client: Client,
}

impl Connection {
    pub fn new(
        tenant_id: TenantId,
        service: ServiceKind,
        base_url: impl Into<String>,
        auth: &AuthScheme,
        config: &HttpClientConfig,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "Site '{}' {} URL must start with http:// or https://, got '{}'",
                tenant_id, service, base_url
            )));
        }

        Ok(Self {
            client: create_client(config, auth)?,
            tenant_id,
            service,
            base_url,
            default_timeout: config.timeout(),
        })
    }

    /// Connection to the tenant's own REST API
    pub fn for_primary(tenant: &TenantConfig, config: &HttpClientConfig) -> Result<Self> {
        Self::new(
            tenant.id.clone(),
            ServiceKind::Primary,
            tenant.primary_base_url(),
            &tenant.credential.auth(),
            config,
        )
    }

    /// Connection to a secondary service on behalf of the tenant
    pub fn for_service(
        tenant: &TenantConfig,
        credential: &ServiceCredential,
        config: &HttpClientConfig,
    ) -> Result<Self> {
        Self::new(
            tenant.id.clone(),
            credential.kind(),
            credential.base_url(&tenant.url),
            &credential.auth(),
            config,
        )
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Absolute URL for an endpoint path relative to the base URL
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }
}
