//! Tenant types for multi-site support

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::service::{
    AuthScheme, CommerceCredential, EmailMarketingCredential, GoogleCredential, ServiceCredential,
    SocialSchedulingCredential, TransactionalEmailCredential,
};
use crate::{Error, Result};

/// Identifier of one configured site.
///
/// Site ids are chosen by the operator (`blog`, `shop-eu`), so unlike a UUID
/// they are validated only for being non-empty and free of whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse a tenant ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::Config("Site id must not be empty".to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(Error::Config(format!(
                "Site id '{}' must not contain whitespace",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_string(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::from_string(&s)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// WordPress application password credential
#[derive(Clone, Serialize, Deserialize)]
pub struct PrimaryCredential {
    pub username: String,
    pub app_password: String,
}

impl PrimaryCredential {
    pub fn auth(&self) -> AuthScheme {
        AuthScheme::Basic {
            username: self.username.clone(),
            password: self.app_password.clone(),
        }
    }
}

impl fmt::Debug for PrimaryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryCredential")
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

/// Optional secondary-service credential blocks, as they appear in config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commerce: Option<CommerceCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_marketing: Option<EmailMarketingCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_scheduling: Option<SocialSchedulingCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactional_email: Option<TransactionalEmailCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webmaster_tools: Option<GoogleCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<GoogleCredential>,
}

impl ServicesConfig {
    /// Flatten the configured blocks into typed credentials
    pub fn credentials(&self) -> Vec<ServiceCredential> {
        let mut out = Vec::new();
        if let Some(c) = &self.commerce {
            out.push(ServiceCredential::Commerce(c.clone()));
        }
        if let Some(c) = &self.email_marketing {
            out.push(ServiceCredential::EmailMarketing(c.clone()));
        }
        if let Some(c) = &self.social_scheduling {
            out.push(ServiceCredential::SocialScheduling(c.clone()));
        }
        if let Some(c) = &self.transactional_email {
            out.push(ServiceCredential::TransactionalEmail(c.clone()));
        }
        if let Some(c) = &self.webmaster_tools {
            out.push(ServiceCredential::WebmasterTools(c.clone()));
        }
        if let Some(c) = &self.analytics {
            out.push(ServiceCredential::Analytics(c.clone()));
        }
        out
    }
}

fn default_api_base() -> String {
    "/wp-json/wp/v2".to_string()
}

/// Identity and credentials of one site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: TenantId,

    /// Site root, e.g. `https://blog.example.com`
    #[serde(default)]
    pub url: String,

    #[serde(flatten)]
    pub credential: PrimaryCredential,

    /// REST API root appended to `url` for the primary connection
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Whether the installation runs in multisite mode (read-only metadata)
    #[serde(default)]
    pub multisite: bool,

    #[serde(default)]
    pub services: ServicesConfig,
}

impl TenantConfig {
    pub fn new(
        id: TenantId,
        url: impl Into<String>,
        username: impl Into<String>,
        app_password: impl Into<String>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            credential: PrimaryCredential {
                username: username.into(),
                app_password: app_password.into(),
            },
            api_base: default_api_base(),
            multisite: false,
            services: ServicesConfig::default(),
        }
    }

    pub fn with_services(mut self, services: ServicesConfig) -> Self {
        self.services = services;
        self
    }

    /// Base URL of the primary REST API
    pub fn primary_base_url(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            self.api_base.trim_matches('/')
        )
    }
}
