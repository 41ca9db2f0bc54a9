//! Connection Registry
//!
//! Owns, per site, the primary connection and any secondary-service
//! connections, plus the active-site pointer used when a call names no site.
//! Connections are built once at registration and shared read-only by every
//! call for that (site, service) pair.

use sitebroker_core::{
    Error, Result, ServiceCredential, ServiceKind, TenantConfig, TenantId,
};
use sitebroker_egress::{Connection, HttpClientConfig};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

struct TenantEntry {
    config: TenantConfig,
    primary: Arc<Connection>,
    services: HashMap<ServiceKind, Arc<Connection>>,
    /// Credential blocks present in config but missing a required field
    incomplete: HashMap<ServiceKind, &'static str>,
}

#[derive(Default)]
struct Tenants {
    by_id: HashMap<TenantId, TenantEntry>,
    /// Registration order, for listing and error messages
    order: Vec<TenantId>,
}

impl Tenants {
    fn known(&self) -> Vec<String> {
        self.order.iter().map(|id| id.to_string()).collect()
    }

    fn get(&self, tenant_id: &str) -> Result<(&TenantId, &TenantEntry)> {
        TenantId::from_string(tenant_id)
            .ok()
            .and_then(|id| self.by_id.get_key_value(&id))
            .ok_or_else(|| Error::TenantNotFound {
                tenant_id: tenant_id.to_string(),
                known: self.known(),
            })
    }
}

pub struct ConnectionRegistry {
    client_config: HttpClientConfig,
    tenants: RwLock<Tenants>,
    active: RwLock<Option<TenantId>>,
}

impl ConnectionRegistry {
    pub fn new(client_config: HttpClientConfig) -> Self {
        Self {
            client_config,
            tenants: RwLock::new(Tenants::default()),
            active: RwLock::new(None),
        }
    }

    pub fn client_config(&self) -> &HttpClientConfig {
        &self.client_config
    }

    /// Build and store every connection for a site.
    ///
    /// The first registered site becomes active. A secondary credential
    /// block with an empty required field is not connected; `resolve`
    /// reports that field later.
    pub fn register(&self, config: TenantConfig) -> Result<TenantId> {
        if config.url.trim().is_empty() {
            return Err(Error::Config(format!("Site '{}' has no url", config.id)));
        }

        let primary = Arc::new(Connection::for_primary(&config, &self.client_config)?);

        let mut services = HashMap::new();
        let mut incomplete = HashMap::new();
        for credential in config.services.credentials() {
            let kind = credential.kind();
            match credential.missing_field() {
                Some(field) => {
                    warn!(
                        tenant_id = %config.id,
                        service = %kind,
                        field = field,
                        "Service credentials incomplete; service disabled"
                    );
                    incomplete.insert(kind, field);
                }
                None => {
                    let conn = Connection::for_service(&config, &credential, &self.client_config)?;
                    services.insert(kind, Arc::new(conn));
                }
            }
        }

        let tenant_id = config.id.clone();
        let configured: Vec<&str> = services.keys().map(|k| k.as_str()).collect();
        info!(
            tenant_id = %tenant_id,
            url = %config.url,
            services = ?configured,
            multisite = config.multisite,
            "Registered site"
        );

        {
            let mut tenants = self.tenants.write().unwrap_or_else(|p| p.into_inner());
            if tenants.by_id.contains_key(&tenant_id) {
                return Err(Error::Config(format!(
                    "Site '{}' is already registered",
                    tenant_id
                )));
            }
            tenants.by_id.insert(
                tenant_id.clone(),
                TenantEntry {
                    config,
                    primary,
                    services,
                    incomplete,
                },
            );
            tenants.order.push(tenant_id.clone());
        }

        let mut active = self.active.write().unwrap_or_else(|p| p.into_inner());
        if active.is_none() {
            *active = Some(tenant_id.clone());
        }

        Ok(tenant_id)
    }

    /// Connection for `service` on the named site, or on the active site
    pub fn resolve(&self, tenant_id: Option<&str>, service: ServiceKind) -> Result<Arc<Connection>> {
        let tenant_id = match tenant_id {
            Some(id) => id.to_string(),
            None => self
                .get_active()
                .map(|id| id.to_string())
                .ok_or_else(|| {
                    Error::InvalidRequest("No site given and no active site".to_string())
                })?,
        };

        let tenants = self.tenants.read().unwrap_or_else(|p| p.into_inner());
        let (id, entry) = tenants.get(&tenant_id)?;

        if service == ServiceKind::Primary {
            return Ok(entry.primary.clone());
        }

        if let Some(conn) = entry.services.get(&service) {
            return Ok(conn.clone());
        }

        debug!(tenant_id = %id, service = %service, "Service not configured");
        Err(Error::ServiceNotConfigured {
            tenant_id: id.to_string(),
            service,
            field: entry
                .incomplete
                .get(&service)
                .copied()
                .unwrap_or_else(|| service.required_field()),
        })
    }

    /// Make `tenant_id` the active site; an unknown id leaves it unchanged
    pub fn switch_active(&self, tenant_id: &str) -> Result<TenantId> {
        let id = {
            let tenants = self.tenants.read().unwrap_or_else(|p| p.into_inner());
            tenants.get(tenant_id)?.0.clone()
        };

        let mut active = self.active.write().unwrap_or_else(|p| p.into_inner());
        let previous = active.replace(id.clone());
        info!(
            from = ?previous.as_ref().map(TenantId::as_str),
            to = %id,
            "Switched active site"
        );
        Ok(id)
    }

    /// Registered site ids, in registration order
    pub fn list_tenants(&self) -> Vec<TenantId> {
        let tenants = self.tenants.read().unwrap_or_else(|p| p.into_inner());
        tenants.order.clone()
    }

    pub fn get_active(&self) -> Option<TenantId> {
        self.active.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Add a secondary service to a registered site
    pub fn configure_service(
        &self,
        tenant_id: &str,
        credential: ServiceCredential,
    ) -> Result<Arc<Connection>> {
        let mut tenants = self.tenants.write().unwrap_or_else(|p| p.into_inner());
        let known = tenants.known();
        let entry = TenantId::from_string(tenant_id)
            .ok()
            .and_then(|id| tenants.by_id.get_mut(&id))
            .ok_or_else(|| Error::TenantNotFound {
                tenant_id: tenant_id.to_string(),
                known,
            })?;

        let kind = credential.kind();
        if kind == ServiceKind::Primary || entry.services.contains_key(&kind) {
            return Err(Error::Config(format!(
                "Service '{}' is already configured for site '{}'",
                kind, entry.config.id
            )));
        }

        if let Some(field) = credential.missing_field() {
            return Err(Error::ServiceNotConfigured {
                tenant_id: entry.config.id.to_string(),
                service: kind,
                field,
            });
        }

        let conn = Arc::new(Connection::for_service(
            &entry.config,
            &credential,
            &self.client_config,
        )?);
        entry.services.insert(kind, conn.clone());
        entry.incomplete.remove(&kind);

        info!(tenant_id = %entry.config.id, service = %kind, "Configured service");
        Ok(conn)
    }

    /// Whether the site runs WordPress multisite
    pub fn is_multisite(&self, tenant_id: &str) -> Result<bool> {
        let tenants = self.tenants.read().unwrap_or_else(|p| p.into_inner());
        Ok(tenants.get(tenant_id)?.1.config.multisite)
    }

    /// Services with a live connection on the site, primary first
    pub fn services(&self, tenant_id: &str) -> Result<Vec<ServiceKind>> {
        let tenants = self.tenants.read().unwrap_or_else(|p| p.into_inner());
        let (_, entry) = tenants.get(tenant_id)?;
        let mut kinds: Vec<ServiceKind> = entry.services.keys().copied().collect();
        kinds.sort();
        kinds.insert(0, ServiceKind::Primary);
        Ok(kinds)
    }
}
