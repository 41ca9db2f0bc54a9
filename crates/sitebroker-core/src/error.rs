//! Error types for SiteBroker Core

use thiserror::Error;

use crate::service::ServiceKind;

#[derive(Debug, Error)]
pub enum Error {
    // Startup errors (fatal)
    #[error("Configuration error: {0}")]
    Config(String),

    // Tenant resolution errors
    #[error("Site '{tenant_id}' not found. Available sites: {}", known.join(", "))]
    TenantNotFound { tenant_id: String, known: Vec<String> },

    #[error("Service '{service}' is not configured for site '{tenant_id}': missing '{field}'")]
    ServiceNotConfigured {
        tenant_id: String,
        service: ServiceKind,
        field: &'static str,
    },

    #[error("Request queue full for site '{tenant_id}' ({capacity} waiting)")]
    QueueFull { tenant_id: String, capacity: usize },

    // Dispatch errors
    #[error("Network error: {0}")]
    TransientNetwork(String),

    #[error("{message}")]
    TransientHttp {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
        retry_after_secs: Option<u64>,
    },

    #[error("{message}")]
    PermanentHttp {
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
        retry_after_secs: Option<u64>,
    },

    #[error("Request timeout after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status carried by the error, if the remote service answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::TransientHttp { status, .. } | Error::PermanentHttp { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// `Retry-After` value in seconds, when the remote service sent one
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Error::TransientHttp {
                retry_after_secs, ..
            }
            | Error::PermanentHttp {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }

    /// Structured error payload returned by the remote service
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Error::TransientHttp { body, .. } | Error::PermanentHttp { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// True for errors that must abort startup rather than be returned to a caller
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// True for failures below HTTP (connect, reset, DNS) and timeouts
    pub fn is_network(&self) -> bool {
        matches!(self, Error::TransientNetwork(_) | Error::Timeout { .. })
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::TenantNotFound { .. } => "not_found",
            Error::ServiceNotConfigured { .. } => "service_not_configured",
            Error::QueueFull { .. } => "queue_full",
            Error::TransientNetwork(_) => "network",
            Error::TransientHttp { .. } => "transient_http",
            Error::PermanentHttp { .. } => "permanent_http",
            Error::Timeout { .. } => "timeout",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}

/// Pull a human readable message out of a remote error payload.
///
/// WordPress and WooCommerce answer `{"code", "message"}`, Mailchimp uses
/// `detail`, SendGrid nests `errors[].message`, Google APIs nest
/// `error.message`.
pub fn remote_message(body: &serde_json::Value) -> Option<String> {
    let candidates = [
        body.get("message"),
        body.get("detail"),
        body.get("error").and_then(|e| e.get("message")),
        body.get("error"),
        body.get("errors")
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("message")),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_string))
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_found_lists_known_tenants() {
        let err = Error::TenantNotFound {
            tenant_id: "ghost".to_string(),
            known: vec!["blog".to_string(), "shop".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Site 'ghost' not found. Available sites: blog, shop"
        );
    }

    #[test]
    fn test_service_not_configured_names_field() {
        let err = Error::ServiceNotConfigured {
            tenant_id: "blog".to_string(),
            service: ServiceKind::Commerce,
            field: "consumer_key",
        };
        let msg = err.to_string();
        assert!(msg.contains("commerce"));
        assert!(msg.contains("consumer_key"));
    }

    #[test]
    fn test_http_error_accessors() {
        let err = Error::TransientHttp {
            status: 429,
            message: "Too many".to_string(),
            body: Some(json!({"message": "Too many"})),
            retry_after_secs: Some(2),
        };
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after_secs(), Some(2));
        assert!(err.body().is_some());
        assert_eq!(err.to_string(), "Too many");
        assert!(!err.is_network());

        let err = Error::Timeout { after_ms: 30_000 };
        assert_eq!(err.status(), None);
        assert!(err.is_network());
        assert_eq!(err.to_string(), "Request timeout after 30000ms");
    }

    #[test]
    fn test_remote_message_shapes() {
        assert_eq!(
            remote_message(&json!({"code": "rest_forbidden", "message": "Sorry"})),
            Some("Sorry".to_string())
        );
        assert_eq!(
            remote_message(&json!({"title": "Bad", "detail": "List missing"})),
            Some("List missing".to_string())
        );
        assert_eq!(
            remote_message(&json!({"errors": [{"message": "bad from"}]})),
            Some("bad from".to_string())
        );
        assert_eq!(
            remote_message(&json!({"error": {"code": 403, "message": "denied"}})),
            Some("denied".to_string())
        );
        assert_eq!(
            remote_message(&json!({"error": "invalid_token"})),
            Some("invalid_token".to_string())
        );
        assert_eq!(remote_message(&json!({"data": 1})), None);
        assert_eq!(remote_message(&json!("plain")), None);
    }

    #[test]
    fn test_config_is_fatal_class() {
        assert!(Error::Config("x".to_string()).is_config());
        assert!(!Error::InvalidRequest("x".to_string()).is_config());
    }
}
