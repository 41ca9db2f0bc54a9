//! Service kinds and their typed credentials
//!
//! Every tenant has exactly one primary service (the WordPress REST API) and
//! may configure any subset of the secondary services below. Each secondary
//! kind carries its own credential shape so a missing field is caught where
//! the credential is read, not when a request is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::Error;

/// The backend a connection talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// WordPress core REST API (posts, users, comments, media)
    Primary,
    /// WooCommerce REST API
    Commerce,
    /// Mailchimp marketing API
    EmailMarketing,
    /// Buffer publishing API
    SocialScheduling,
    /// SendGrid mail API
    TransactionalEmail,
    /// Google Search Console API
    WebmasterTools,
    /// Google Analytics Data API
    Analytics,
}

impl ServiceKind {
    pub const SECONDARY: [ServiceKind; 6] = [
        ServiceKind::Commerce,
        ServiceKind::EmailMarketing,
        ServiceKind::SocialScheduling,
        ServiceKind::TransactionalEmail,
        ServiceKind::WebmasterTools,
        ServiceKind::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Primary => "primary",
            ServiceKind::Commerce => "commerce",
            ServiceKind::EmailMarketing => "email_marketing",
            ServiceKind::SocialScheduling => "social_scheduling",
            ServiceKind::TransactionalEmail => "transactional_email",
            ServiceKind::WebmasterTools => "webmaster_tools",
            ServiceKind::Analytics => "analytics",
        }
    }

    /// The credential field reported when a tenant has no block at all for this service
    pub fn required_field(&self) -> &'static str {
        match self {
            ServiceKind::Primary => "app_password",
            ServiceKind::Commerce => "consumer_key",
            ServiceKind::EmailMarketing => "api_key",
            ServiceKind::SocialScheduling => "access_token",
            ServiceKind::TransactionalEmail => "api_key",
            ServiceKind::WebmasterTools => "access_token",
            ServiceKind::Analytics => "access_token",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "primary" | "wordpress" => Ok(ServiceKind::Primary),
            "commerce" | "woocommerce" => Ok(ServiceKind::Commerce),
            "email_marketing" | "mailchimp" => Ok(ServiceKind::EmailMarketing),
            "social_scheduling" | "buffer" => Ok(ServiceKind::SocialScheduling),
            "transactional_email" | "sendgrid" => Ok(ServiceKind::TransactionalEmail),
            "webmaster_tools" | "search_console" => Ok(ServiceKind::WebmasterTools),
            "analytics" => Ok(ServiceKind::Analytics),
            other => Err(Error::InvalidRequest(format!("Unknown service: {}", other))),
        }
    }
}

/// How a connection authenticates every request it sends
#[derive(Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic { username: String, password: String },
    Bearer(String),
}

impl fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthScheme::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

/// WooCommerce REST keys
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommerceCredential {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    /// Defaults to `<site url>/wp-json/wc/v3`
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Mailchimp API key; the data center is the suffix after the dash
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailMarketingCredential {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub server_prefix: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Pre-issued bearer token (Buffer)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialSchedulingCredential {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// SendGrid API key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionalEmailCredential {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Google service credential. The access token is acquired outside SiteBroker;
/// `key_file` is carried as metadata for the component that refreshes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleCredential {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// Search Console property (`sc-domain:example.com` or a URL prefix)
    #[serde(default)]
    pub site_url: Option<String>,
    /// GA4 property id
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// A credential for one secondary service
#[derive(Debug, Clone)]
pub enum ServiceCredential {
    Commerce(CommerceCredential),
    EmailMarketing(EmailMarketingCredential),
    SocialScheduling(SocialSchedulingCredential),
    TransactionalEmail(TransactionalEmailCredential),
    WebmasterTools(GoogleCredential),
    Analytics(GoogleCredential),
}

impl ServiceCredential {
    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceCredential::Commerce(_) => ServiceKind::Commerce,
            ServiceCredential::EmailMarketing(_) => ServiceKind::EmailMarketing,
            ServiceCredential::SocialScheduling(_) => ServiceKind::SocialScheduling,
            ServiceCredential::TransactionalEmail(_) => ServiceKind::TransactionalEmail,
            ServiceCredential::WebmasterTools(_) => ServiceKind::WebmasterTools,
            ServiceCredential::Analytics(_) => ServiceKind::Analytics,
        }
    }

    /// First required field that is empty, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        match self {
            ServiceCredential::Commerce(c) => {
                if c.consumer_key.trim().is_empty() {
                    Some("consumer_key")
                } else if c.consumer_secret.trim().is_empty() {
                    Some("consumer_secret")
                } else {
                    None
                }
            }
            ServiceCredential::EmailMarketing(c) => {
                if c.api_key.trim().is_empty() {
                    Some("api_key")
                } else if c.base_url.is_none() && email_marketing_dc(c).is_none() {
                    Some("server_prefix")
                } else {
                    None
                }
            }
            ServiceCredential::SocialScheduling(c) => {
                c.access_token.trim().is_empty().then_some("access_token")
            }
            ServiceCredential::TransactionalEmail(c) => {
                c.api_key.trim().is_empty().then_some("api_key")
            }
            ServiceCredential::WebmasterTools(c) | ServiceCredential::Analytics(c) => {
                c.access_token.trim().is_empty().then_some("access_token")
            }
        }
    }

    /// Base URL for this service; `site_url` is the tenant's WordPress URL
    pub fn base_url(&self, site_url: &str) -> String {
        let site_url = site_url.trim_end_matches('/');
        match self {
            ServiceCredential::Commerce(c) => c
                .base_url
                .clone()
                .unwrap_or_else(|| format!("{}/wp-json/wc/v3", site_url)),
            ServiceCredential::EmailMarketing(c) => c.base_url.clone().unwrap_or_else(|| {
                format!(
                    "https://{}.api.mailchimp.com/3.0",
                    email_marketing_dc(c).unwrap_or_default()
                )
            }),
            ServiceCredential::SocialScheduling(c) => c
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.bufferapp.com/1".to_string()),
            ServiceCredential::TransactionalEmail(c) => c
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.sendgrid.com/v3".to_string()),
            ServiceCredential::WebmasterTools(c) => c
                .base_url
                .clone()
                .unwrap_or_else(|| "https://www.googleapis.com/webmasters/v3".to_string()),
            ServiceCredential::Analytics(c) => c
                .base_url
                .clone()
                .unwrap_or_else(|| "https://analyticsdata.googleapis.com/v1beta".to_string()),
        }
    }

    pub fn auth(&self) -> AuthScheme {
        match self {
            ServiceCredential::Commerce(c) => AuthScheme::Basic {
                username: c.consumer_key.clone(),
                password: c.consumer_secret.clone(),
            },
            ServiceCredential::EmailMarketing(c) => AuthScheme::Basic {
                username: "anystring".to_string(),
                password: c.api_key.clone(),
            },
            ServiceCredential::SocialScheduling(c) => AuthScheme::Bearer(c.access_token.clone()),
            ServiceCredential::TransactionalEmail(c) => AuthScheme::Bearer(c.api_key.clone()),
            ServiceCredential::WebmasterTools(c) | ServiceCredential::Analytics(c) => {
                AuthScheme::Bearer(c.access_token.clone())
            }
        }
    }
}

fn email_marketing_dc(c: &EmailMarketingCredential) -> Option<String> {
    c.server_prefix
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            c.api_key
                .rsplit_once('-')
                .map(|(_, dc)| dc.to_string())
                .filter(|dc| !dc.is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_kind_parse_aliases() {
        assert_eq!("commerce".parse::<ServiceKind>().unwrap(), ServiceKind::Commerce);
        assert_eq!("WooCommerce".parse::<ServiceKind>().unwrap(), ServiceKind::Commerce);
        assert_eq!(
            "email-marketing".parse::<ServiceKind>().unwrap(),
            ServiceKind::EmailMarketing
        );
        assert_eq!("sendgrid".parse::<ServiceKind>().unwrap(), ServiceKind::TransactionalEmail);
        assert!("fax".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_service_kind_display_roundtrips() {
        for kind in ServiceKind::SECONDARY {
            assert_eq!(kind.to_string().parse::<ServiceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_commerce_defaults_to_site_url() {
        let cred = ServiceCredential::Commerce(CommerceCredential {
            consumer_key: "ck_1".to_string(),
            consumer_secret: "cs_1".to_string(),
            base_url: None,
        });
        assert_eq!(
            cred.base_url("https://shop.example.com/"),
            "https://shop.example.com/wp-json/wc/v3"
        );
        assert_eq!(cred.missing_field(), None);
        assert_eq!(
            cred.auth(),
            AuthScheme::Basic {
                username: "ck_1".to_string(),
                password: "cs_1".to_string()
            }
        );
    }

    #[test]
    fn test_commerce_missing_secret() {
        let cred = ServiceCredential::Commerce(CommerceCredential {
            consumer_key: "ck_1".to_string(),
            ..Default::default()
        });
        assert_eq!(cred.missing_field(), Some("consumer_secret"));
    }

    #[test]
    fn test_mailchimp_data_center_from_key() {
        let cred = ServiceCredential::EmailMarketing(EmailMarketingCredential {
            api_key: "abc123-us6".to_string(),
            ..Default::default()
        });
        assert_eq!(cred.base_url("https://x"), "https://us6.api.mailchimp.com/3.0");
        assert_eq!(cred.missing_field(), None);

        let no_dc = ServiceCredential::EmailMarketing(EmailMarketingCredential {
            api_key: "abc123".to_string(),
            ..Default::default()
        });
        assert_eq!(no_dc.missing_field(), Some("server_prefix"));
    }

    #[test]
    fn test_bearer_services() {
        let cred = ServiceCredential::Analytics(GoogleCredential {
            access_token: "ya29.token".to_string(),
            property_id: Some("1234".to_string()),
            ..Default::default()
        });
        assert_eq!(cred.kind(), ServiceKind::Analytics);
        assert_eq!(cred.auth(), AuthScheme::Bearer("ya29.token".to_string()));
        assert!(cred.base_url("https://x").starts_with("https://analyticsdata"));

        let empty = ServiceCredential::WebmasterTools(GoogleCredential::default());
        assert_eq!(empty.missing_field(), Some("access_token"));
    }

    #[test]
    fn test_auth_debug_redacts_secrets() {
        let auth = AuthScheme::Basic {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", auth);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
        assert!(!format!("{:?}", AuthScheme::Bearer("tok".to_string())).contains("tok"));
    }
}
