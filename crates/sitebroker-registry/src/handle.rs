//! Registry handle
//!
//! `RegistryHandle` is the value callers hold: it owns the connection
//! registry, the dispatcher and the active-site pointer, and is cheap to
//! clone. `call` resolves a connection and executes on it; `call_tool`
//! additionally converts failures into a `ToolResult`.

use crate::preflight;
use crate::registry::ConnectionRegistry;
use sitebroker_config_file::BrokerConfig;
use sitebroker_core::{Result, ServiceCredential, ServiceKind, TenantConfig, TenantId, ToolResult};
use sitebroker_egress::{
    CallOptions, Connection, DispatchOutput, DispatcherConfig, HttpClientConfig, Method, Payload,
    RequestDispatcher,
};
use sitebroker_observability::DispatchMetrics;
use std::sync::Arc;
use tracing::info;

struct Inner {
    registry: ConnectionRegistry,
    dispatcher: RequestDispatcher,
    preflight: bool,
}

#[derive(Clone)]
pub struct RegistryHandle {
    inner: Arc<Inner>,
}

impl RegistryHandle {
    pub fn new(registry: ConnectionRegistry, dispatcher: RequestDispatcher, preflight: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                dispatcher,
                preflight,
            }),
        }
    }

    /// Build a handle and register every configured site.
    ///
    /// Any configuration problem is returned as `Error::Config`; the caller
    /// is expected to abort startup on it.
    pub async fn from_config(config: BrokerConfig, metrics: Option<DispatchMetrics>) -> Result<Self> {
        config.validate()?;

        let client_config = HttpClientConfig {
            timeout_secs: config.timeout_secs,
            ..Default::default()
        };
        let mut dispatcher = RequestDispatcher::new(DispatcherConfig {
            max_concurrent: config.max_concurrent,
            max_queue: config.max_queue,
            retry: config.retry.clone(),
        });
        if let Some(metrics) = metrics {
            dispatcher = dispatcher.with_metrics(metrics);
        }

        let handle = Self::new(
            ConnectionRegistry::new(client_config),
            dispatcher,
            config.preflight,
        );

        let initial = config.initial_site().map(str::to_string);
        for site in config.sites {
            handle.register(site).await?;
        }
        if let Some(initial) = initial {
            handle.switch_active(&initial)?;
        }

        info!(
            sites = handle.list_tenants().len(),
            active = ?handle.get_active().map(|id| id.to_string()),
            "Site registry ready"
        );
        Ok(handle)
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.inner.dispatcher
    }

    /// Register a site, probing its API first when preflight is enabled
    pub async fn register(&self, config: TenantConfig) -> Result<TenantId> {
        let tenant_id = self.inner.registry.register(config)?;
        if self.inner.preflight {
            let conn = self
                .inner
                .registry
                .resolve(Some(tenant_id.as_str()), ServiceKind::Primary)?;
            preflight::probe(&conn).await;
        }
        Ok(tenant_id)
    }

    pub fn resolve(&self, tenant_id: Option<&str>, service: ServiceKind) -> Result<Arc<Connection>> {
        self.inner.registry.resolve(tenant_id, service)
    }

    pub fn switch_active(&self, tenant_id: &str) -> Result<TenantId> {
        self.inner.registry.switch_active(tenant_id)
    }

    pub fn list_tenants(&self) -> Vec<TenantId> {
        self.inner.registry.list_tenants()
    }

    pub fn get_active(&self) -> Option<TenantId> {
        self.inner.registry.get_active()
    }

    pub fn configure_service(
        &self,
        tenant_id: &str,
        credential: ServiceCredential,
    ) -> Result<Arc<Connection>> {
        self.inner.registry.configure_service(tenant_id, credential)
    }

    pub fn is_multisite(&self, tenant_id: &str) -> Result<bool> {
        self.inner.registry.is_multisite(tenant_id)
    }

    /// Resolve the connection for `options.service` on the site and execute
    pub async fn call(
        &self,
        tenant_id: Option<&str>,
        method: Method,
        path: &str,
        payload: Option<&Payload>,
        options: &CallOptions,
    ) -> Result<DispatchOutput> {
        let conn = self.resolve(tenant_id, options.service)?;
        self.inner
            .dispatcher
            .execute(&conn, method, path, payload, options)
            .await
    }

    /// Like `call`, with every error folded into the result
    pub async fn call_tool(
        &self,
        tenant_id: Option<&str>,
        method: Method,
        path: &str,
        payload: Option<&Payload>,
        options: &CallOptions,
    ) -> ToolResult {
        match self
            .call(tenant_id, method, path, payload, options)
            .await
            .and_then(DispatchOutput::into_value)
        {
            Ok(content) => ToolResult::success(content),
            Err(err) => ToolResult::from(&err),
        }
    }
}
