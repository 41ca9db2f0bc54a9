//! Request dispatcher
//!
//! Executes one logical call against a connection: takes a slot from the
//! tenant's limiter, runs the attempt loop under the retry policy, and turns
//! the final response into a body, a paginated result or a raw response.
//! The limiter slot is held across retries and backoff sleeps, and released
//! on every exit path.

use crate::connection::Connection;
use crate::limiter::{ConcurrencyLimiter, DEFAULT_MAX_CONCURRENT};
use crate::pagination::PaginatedResult;
use crate::payload::{FormBody, Payload, query_pairs};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::retry_after::parse_retry_after;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use sitebroker_core::error::remote_message;
use sitebroker_core::{Error, Result, ServiceKind, TenantId};
use sitebroker_observability::DispatchMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Longest slice of a non-JSON error body quoted in an error message
const MAX_ERROR_TEXT: usize = 500;

/// Per-call options
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Overrides the connection's default timeout for each attempt
    pub timeout: Option<Duration>,
    /// Send a JSON payload as multipart form fields
    pub form_data: bool,
    /// Return status, headers and body instead of the body alone
    pub raw_response: bool,
    /// Attach pagination metadata to GET results
    pub include_pagination: bool,
    /// Service the call targets
    pub service: ServiceKind,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            form_data: false,
            raw_response: false,
            include_pagination: false,
            service: ServiceKind::Primary,
        }
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn form_data(mut self) -> Self {
        self.form_data = true;
        self
    }

    pub fn raw_response(mut self) -> Self {
        self.raw_response = true;
        self
    }

    pub fn paginated(mut self) -> Self {
        self.include_pagination = true;
        self
    }

    pub fn service(mut self, service: ServiceKind) -> Self {
        self.service = service;
        self
    }
}

/// Status, headers and body of a successful response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// Result of a dispatched call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DispatchOutput {
    Body(Value),
    Paginated(PaginatedResult),
    Raw(RawResponse),
}

impl DispatchOutput {
    pub fn into_value(self) -> Result<Value> {
        Ok(match self {
            DispatchOutput::Body(value) => value,
            DispatchOutput::Paginated(result) => serde_json::to_value(result)?,
            DispatchOutput::Raw(raw) => serde_json::to_value(raw)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// In-flight calls allowed per tenant
    pub max_concurrent: usize,
    /// Queued calls allowed per tenant; `None` is unbounded
    pub max_queue: Option<usize>,
    pub retry: RetryConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_queue: None,
            retry: RetryConfig::default(),
        }
    }
}

pub struct RequestDispatcher {
    config: DispatcherConfig,
    policy: RetryPolicy,
    limiters: DashMap<TenantId, Arc<ConcurrencyLimiter>>,
    metrics: Option<DispatchMetrics>,
}

impl RequestDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            policy: RetryPolicy::new(config.retry.clone()),
            config,
            limiters: DashMap::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: DispatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> Option<&DispatchMetrics> {
        self.metrics.as_ref()
    }

    /// The tenant's limiter, if it has dispatched anything yet
    pub fn limiter(&self, tenant_id: &TenantId) -> Option<Arc<ConcurrencyLimiter>> {
        self.limiters.get(tenant_id).map(|l| l.value().clone())
    }

    fn limiter_for(&self, tenant_id: &TenantId) -> Arc<ConcurrencyLimiter> {
        if let Some(limiter) = self.limiters.get(tenant_id) {
            return limiter.value().clone();
        }
        self.limiters
            .entry(tenant_id.clone())
            .or_insert_with(|| {
                Arc::new(ConcurrencyLimiter::new(
                    tenant_id.clone(),
                    self.config.max_concurrent,
                    self.config.max_queue,
                ))
            })
            .value()
            .clone()
    }

    fn publish_limiter_state(&self, limiter: &ConcurrencyLimiter) {
        if let Some(metrics) = &self.metrics {
            metrics.set_limiter_state(
                limiter.tenant_id().as_str(),
                limiter.running(),
                limiter.waiting(),
            );
        }
    }

    /// Execute one logical call.
    ///
    /// Reads send `payload` as query parameters; other verbs send it as a
    /// JSON body, or as multipart when `options.form_data` is set or the
    /// payload is a form.
    #[instrument(
        skip_all,
        fields(
            tenant_id = %conn.tenant_id(),
            service = %conn.service(),
            method = %method,
            path = %path
        )
    )]
    pub async fn execute(
        &self,
        conn: &Connection,
        method: Method,
        path: &str,
        payload: Option<&Payload>,
        options: &CallOptions,
    ) -> Result<DispatchOutput> {
        let started = Instant::now();
        let limiter = self.limiter_for(conn.tenant_id());

        let result = async {
            let _permit = limiter.acquire().await?;
            self.publish_limiter_state(&limiter);
            self.run_attempts(conn, &method, path, payload, options).await
        }
        .await;

        self.publish_limiter_state(&limiter);

        if let Some(metrics) = &self.metrics {
            let tenant = conn.tenant_id().as_str();
            let service = conn.service().as_str();
            let elapsed = started.elapsed().as_secs_f64();
            match &result {
                Ok(_) => metrics.record_success(tenant, service, method.as_str(), elapsed),
                Err(e) => {
                    metrics.record_failure(tenant, service, method.as_str(), e.kind(), elapsed)
                }
            }
        }

        result
    }

    async fn run_attempts(
        &self,
        conn: &Connection,
        method: &Method,
        path: &str,
        payload: Option<&Payload>,
        options: &CallOptions,
    ) -> Result<DispatchOutput> {
        let mut attempt = 0u32;
        loop {
            let err = match self.attempt(conn, method, path, payload, options).await {
                Ok(output) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Request succeeded after retries");
                    }
                    return Ok(output);
                }
                Err(err) => err,
            };

            if attempt >= self.policy.max_retries() || !self.policy.is_retryable(&err, method) {
                error!(
                    tenant_id = %conn.tenant_id(),
                    service = %conn.service(),
                    method = %method,
                    path = path,
                    status = ?err.status(),
                    kind = err.kind(),
                    attempts = attempt + 1,
                    "Request failed: {}",
                    err
                );
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt, &err);
            warn!(
                tenant_id = %conn.tenant_id(),
                service = %conn.service(),
                method = %method,
                path = path,
                status = ?err.status(),
                kind = err.kind(),
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Retrying request: {}",
                err
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_retry(
                    conn.tenant_id().as_str(),
                    conn.service().as_str(),
                    method.as_str(),
                );
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        conn: &Connection,
        method: &Method,
        path: &str,
        payload: Option<&Payload>,
        options: &CallOptions,
    ) -> Result<DispatchOutput> {
        let timeout = options.timeout.unwrap_or_else(|| conn.default_timeout());
        let request = attach_payload(
            conn.request(method.clone(), path).timeout(timeout),
            method,
            payload,
            options.form_data,
        )?;

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        if !status.is_success() {
            return Err(http_error(status, &headers, &text, method));
        }

        let body = parse_body(&text);

        if options.include_pagination && *method == Method::GET {
            return Ok(DispatchOutput::Paginated(PaginatedResult::from_response(
                body,
                &headers,
                payload.and_then(Payload::as_json),
            )));
        }

        if options.raw_response {
            return Ok(DispatchOutput::Raw(RawResponse {
                status: status.as_u16(),
                headers: header_map(&headers),
                body,
            }));
        }

        Ok(DispatchOutput::Body(body))
    }
}

fn attach_payload(
    request: RequestBuilder,
    method: &Method,
    payload: Option<&Payload>,
    form_data: bool,
) -> Result<RequestBuilder> {
    let Some(payload) = payload else {
        return Ok(request);
    };

    if *method == Method::GET {
        return match payload {
            Payload::Json(Value::Null) => Ok(request),
            Payload::Json(value) => Ok(request.query(&query_pairs(value)?)),
            Payload::Form(_) => Err(Error::InvalidRequest(
                "Form data cannot be sent with GET".to_string(),
            )),
        };
    }

    Ok(match payload {
        Payload::Form(form) => request.multipart(form.to_multipart()?),
        Payload::Json(value) if form_data => {
            request.multipart(FormBody::from_json(value)?.to_multipart()?)
        }
        Payload::Json(value) => request.json(value),
    })
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            after_ms: timeout.as_millis() as u64,
        }
    } else if err.is_builder() {
        Error::InvalidRequest(err.to_string())
    } else {
        Error::TransientNetwork(err.to_string())
    }
}

fn http_error(status: StatusCode, headers: &HeaderMap, text: &str, method: &Method) -> Error {
    let code = status.as_u16();
    let retry_after_secs = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);

    let body: Option<Value> = serde_json::from_str(text).ok();
    let message = body.as_ref().and_then(remote_message).unwrap_or_else(|| {
        let text = text.trim();
        if text.is_empty() {
            format!(
                "HTTP {}: {}",
                code,
                status.canonical_reason().unwrap_or("Unknown error")
            )
        } else {
            format!("HTTP {}: {}", code, text.chars().take(MAX_ERROR_TEXT).collect::<String>())
        }
    });

    if RetryPolicy::is_retryable_status(code, method) {
        Error::TransientHttp {
            status: code,
            message,
            body,
            retry_after_secs,
        }
    } else {
        Error::PermanentHttp {
            status: code,
            message,
            body,
            retry_after_secs,
        }
    }
}

/// JSON when the body parses, the text itself otherwise, null when empty
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("  \n"), Value::Null);
        assert_eq!(parse_body(r#"{"id": 5}"#), json!({"id": 5}));
        assert_eq!(parse_body("plain text"), json!("plain text"));
    }

    #[test]
    fn test_http_error_uses_remote_message() {
        let err = http_error(
            StatusCode::NOT_FOUND,
            &HeaderMap::new(),
            r#"{"code": "rest_post_invalid_id", "message": "Invalid post ID."}"#,
            &Method::GET,
        );
        assert!(matches!(err, Error::PermanentHttp { status: 404, .. }));
        assert_eq!(err.to_string(), "Invalid post ID.");
        assert_eq!(err.body().unwrap()["code"], "rest_post_invalid_id");
    }

    #[test]
    fn test_http_error_falls_back_to_status_text() {
        let err = http_error(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "", &Method::GET);
        assert!(matches!(err, Error::TransientHttp { status: 502, .. }));
        assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");

        let err = http_error(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "upstream down", &Method::POST);
        assert!(matches!(err, Error::PermanentHttp { status: 502, .. }));
        assert_eq!(err.to_string(), "HTTP 502: upstream down");
    }

    #[test]
    fn test_http_error_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        let err = http_error(StatusCode::TOO_MANY_REQUESTS, &headers, "", &Method::POST);
        assert!(matches!(err, Error::TransientHttp { status: 429, .. }));
        assert_eq!(err.retry_after_secs(), Some(2));
    }

    #[test]
    fn test_call_options_builder() {
        let options = CallOptions::new()
            .timeout(Duration::from_secs(5))
            .paginated()
            .service(ServiceKind::Commerce);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert!(options.include_pagination);
        assert!(!options.raw_response);
        assert_eq!(options.service, ServiceKind::Commerce);
    }

    #[test]
    fn test_dispatch_output_into_value() {
        let raw = DispatchOutput::Raw(RawResponse {
            status: 201,
            headers: HashMap::from([("location".to_string(), "/posts/9".to_string())]),
            body: json!({"id": 9}),
        });
        assert_eq!(
            raw.into_value().unwrap(),
            json!({"status": 201, "headers": {"location": "/posts/9"}, "body": {"id": 9}})
        );
        assert_eq!(
            DispatchOutput::Body(json!([1])).into_value().unwrap(),
            json!([1])
        );
    }

    #[test]
    fn test_limiters_created_per_tenant() {
        let dispatcher = RequestDispatcher::new(DispatcherConfig {
            max_concurrent: 2,
            ..Default::default()
        });
        let a = TenantId::from_string("a").unwrap();
        let b = TenantId::from_string("b").unwrap();

        assert!(dispatcher.limiter(&a).is_none());
        let la = dispatcher.limiter_for(&a);
        let la_again = dispatcher.limiter_for(&a);
        let lb = dispatcher.limiter_for(&b);

        assert!(Arc::ptr_eq(&la, &la_again));
        assert!(!Arc::ptr_eq(&la, &lb));
        assert_eq!(la.max(), 2);
    }
}
