//! SiteBroker Egress
//!
//! This crate executes calls against tenant backends:
//! - Bound HTTP connections per (tenant, service)
//! - Per-tenant FIFO concurrency limiting
//! - Retry policy with Retry-After support and jittered backoff
//! - Pagination metadata extraction
//! - The request dispatcher tying these together

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod limiter;
pub mod pagination;
pub mod payload;
pub mod retry;
pub mod retry_after;

pub use client::HttpClientConfig;
pub use connection::Connection;
pub use dispatcher::{CallOptions, DispatchOutput, DispatcherConfig, RawResponse, RequestDispatcher};
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use pagination::{PaginatedResult, Pagination};
pub use payload::{FormBody, FormPart, Payload};
pub use retry::{RetryConfig, RetryPolicy};
pub use retry_after::parse_retry_after;
pub use reqwest::Method;
