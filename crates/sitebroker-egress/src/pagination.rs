//! Pagination metadata extraction
//!
//! List endpoints report their totals in response headers. WordPress and
//! WooCommerce use `X-WP-Total` / `X-WP-TotalPages`; the shorter
//! `X-Total` / `X-TotalPages` pair is accepted as a fallback. Missing or
//! non-numeric headers count as 0.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TOTAL_HEADERS: [&str; 2] = ["x-wp-total", "x-total"];
const TOTAL_PAGES_HEADERS: [&str; 2] = ["x-wp-totalpages", "x-totalpages"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub total_pages: u64,
    pub page: u64,
    pub per_page: u64,
}

/// A list response together with its pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResult {
    pub items: Value,
    pub pagination: Pagination,
}

impl PaginatedResult {
    /// Combine a response body and headers with the page the caller asked for
    pub fn from_response(items: Value, headers: &HeaderMap, query: Option<&Value>) -> Self {
        let (page, per_page) = requested_page(query);
        Self {
            items,
            pagination: Pagination {
                total: header_number(headers, &TOTAL_HEADERS),
                total_pages: header_number(headers, &TOTAL_PAGES_HEADERS),
                page,
                per_page,
            },
        }
    }
}

fn header_number(headers: &HeaderMap, names: &[&str]) -> u64 {
    names
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

/// `page` / `per_page` from the caller's query, as numbers or numeric strings
fn requested_page(query: Option<&Value>) -> (u64, u64) {
    let field = |name: &str| -> Option<u64> {
        let value = query?.get(name)?;
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .filter(|n| *n > 0)
    };

    (
        field("page").unwrap_or(DEFAULT_PAGE),
        field("per_page").unwrap_or(DEFAULT_PER_PAGE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};
    use serde_json::json;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_static(v),
            );
        }
        map
    }

    #[test]
    fn test_wordpress_headers() {
        let result = PaginatedResult::from_response(
            json!([{"id": 1}]),
            &headers(&[("X-WP-Total", "42"), ("X-WP-TotalPages", "9")]),
            Some(&json!({"page": 2, "per_page": 5})),
        );
        assert_eq!(
            result.pagination,
            Pagination {
                total: 42,
                total_pages: 9,
                page: 2,
                per_page: 5
            }
        );
        assert_eq!(result.items, json!([{"id": 1}]));
    }

    #[test]
    fn test_short_header_fallback() {
        let result = PaginatedResult::from_response(
            json!([]),
            &headers(&[("X-Total", "42"), ("X-TotalPages", "9")]),
            None,
        );
        assert_eq!(result.pagination.total, 42);
        assert_eq!(result.pagination.total_pages, 9);
    }

    #[test]
    fn test_defaults_when_absent_or_garbage() {
        let result = PaginatedResult::from_response(
            json!([]),
            &headers(&[("X-WP-Total", "lots")]),
            Some(&json!({"search": "x"})),
        );
        assert_eq!(
            result.pagination,
            Pagination {
                total: 0,
                total_pages: 0,
                page: 1,
                per_page: 10
            }
        );
    }

    #[test]
    fn test_string_page_params() {
        let result = PaginatedResult::from_response(
            json!([]),
            &HeaderMap::new(),
            Some(&json!({"page": "3", "per_page": "20"})),
        );
        assert_eq!(result.pagination.page, 3);
        assert_eq!(result.pagination.per_page, 20);
    }

    #[test]
    fn test_serialized_shape() {
        let result = PaginatedResult::from_response(
            json!(["a"]),
            &headers(&[("x-wp-total", "1"), ("x-wp-totalpages", "1")]),
            None,
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "items": ["a"],
                "pagination": {"total": 1, "totalPages": 1, "page": 1, "perPage": 10}
            })
        );
    }
}
